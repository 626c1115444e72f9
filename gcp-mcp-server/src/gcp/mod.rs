//! Google Cloud provider client.
//!
//! [`CloudApi`] is the seam between the MCP handlers and the provider: the
//! server uses [`RestCloudApi`], tests substitute an in-memory fake.

mod client;
pub mod iam;
pub mod logging;
pub mod monitoring;
pub mod spanner;
pub mod trace;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use client::{ApiEndpoints, CloudApi, RestCloudApi};

/// Resource descriptor attached to log entries and time series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

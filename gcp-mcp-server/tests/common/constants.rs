//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When the fake cloud data changes, update only this file.

// ============================================================================
// Projects
// ============================================================================

/// Project the test server starts with
pub const TEST_PROJECT_ID: &str = "e2e-project";

/// Project used to check explicit arguments and `project.set`
pub const OTHER_PROJECT_ID: &str = "e2e-other-project";

// ============================================================================
// Fake Cloud Data
// ============================================================================

/// Text payload of every fake log entry
pub const FAKE_LOG_MESSAGE: &str = "checkout completed";

/// Metric type returned by the fake time series
pub const FAKE_METRIC_TYPE: &str = "compute.googleapis.com/instance/cpu/utilization";

/// Spanner instance id that exists in the fake cloud
pub const FAKE_INSTANCE: &str = "main-instance";

/// Spanner database id that exists in the fake cloud
pub const FAKE_DATABASE: &str = "orders";

/// Trace id that exists in the fake cloud
pub const FAKE_TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

/// Member holding a role in the fake IAM policy
pub const FAKE_MEMBER: &str = "user:alice@example.com";

/// Only permissions with this prefix are granted by the fake cloud
pub const GRANTED_PERMISSION_PREFIX: &str = "logging.";

// ============================================================================
// Client Info
// ============================================================================

pub const CLIENT_NAME: &str = "e2e-client";
pub const CLIENT_VERSION: &str = "1.0.0";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

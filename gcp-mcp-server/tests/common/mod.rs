//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_list_tools() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::initialized(server.base_url.clone()).await;
//!
//!     let result = client.request("tools/list", None).await;
//!     assert!(result["result"]["tools"].is_array());
//! }
//! ```

mod client;
mod constants;
mod fake_cloud;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fake_cloud::FakeCloud;
#[allow(unused_imports)]
pub use server::{TestServer, TestServerOptions};

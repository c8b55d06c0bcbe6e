//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, LINK_SINGLE};
//!
//! #[tokio::test]
//! async fn test_enqueue() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone(), server.ws_url.clone());
//!
//!     let job_id = client.enqueue_job(LINK_SINGLE).await;
//!     client.wait_for_completion(&job_id).await;
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{TestClient, WsStream};
pub use constants::*;
pub use server::TestServer;

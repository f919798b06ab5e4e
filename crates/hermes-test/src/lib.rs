//! # Hermes Test
//!
//! Test utilities for Hermes assemblies, running request flights in memory
//! without a server or network access.
//!
//! ## Key Features
//!
//! - **In-Memory Flights**: [`TestClient`] creates an assembly over the HTTP contexts and runs requests through it
//! - **Request Builder**: Fluent API for building test requests
//! - **Response Assertions**: Helper methods over the final response contexts
//! - **Static Gateways**: [`StaticFetcher`] serves gateway and filter JSON from memory and counts fetches
//!
//! ## Example
//!
//! ```ignore
//! use hermes_test::{StaticFetcher, TestClient, TestRequest};
//!
//! #[tokio::test]
//! async fn test_unknown_path() {
//!     let fetcher = Arc::new(StaticFetcher::new().json("gateways", &json!({"GatewayList": []})));
//!     let client = TestClient::new(&gateway_assembly(fetcher))?;
//!
//!     let response = client.send(TestRequest::get("unknown").build()).await?;
//!     response.assert_status(404);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod fetcher;
mod request;
mod response;

pub use client::{http_sources, TestClient};
pub use error::{TestError, TestResult};
pub use fetcher::StaticFetcher;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;

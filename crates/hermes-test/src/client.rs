//! In-memory flights over an assembly.

use crate::error::TestResult;
use crate::request::TestRequest;
use crate::response::TestResponse;
use hermes_core::http::{self, names};
use hermes_pipeline::{Assembly, Contexts, Processing};
use std::sync::Arc;

/// The HTTP contexts a server provides to the processors.
pub fn http_sources() -> Contexts {
    Contexts::new()
        .with(names::REQUEST, http::request_spec())
        .with(names::REQUEST_CNT, http::request_content_spec())
        .with(names::RESPONSE, http::response_spec())
        .with(names::RESPONSE_CNT, http::response_content_spec())
}

/// Runs request flights through a processing, the way a server would.
///
/// # Example
///
/// ```ignore
/// let client = TestClient::new(&assembly)?;
/// let response = client.send(TestRequest::get("articles/1").build()).await?;
/// response.assert_status(200);
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    processing: Arc<Processing>,
}

impl TestClient {
    /// Creates the assembly over the HTTP contexts.
    pub fn new(assembly: &Assembly) -> TestResult<Self> {
        Self::with_sources(assembly, &http_sources())
    }

    /// Creates the assembly over custom source contexts.
    pub fn with_sources(assembly: &Assembly, sources: &Contexts) -> TestResult<Self> {
        Ok(Self {
            processing: Arc::new(assembly.create(sources)?),
        })
    }

    /// The created processing.
    pub fn processing(&self) -> &Processing {
        &self.processing
    }

    /// Runs one flight.
    pub async fn send(&self, request: TestRequest) -> TestResult<TestResponse> {
        let arg = request.into_arg(&self.processing)?;
        let arg = self.processing.execute(arg).await?;
        Ok(TestResponse::new(arg))
    }
}

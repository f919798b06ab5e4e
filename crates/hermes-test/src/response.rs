//! Test response wrapper.

use crate::error::TestResult;
use bytes::Bytes;
use hermes_core::codes;
use hermes_core::http::{content, names, response, Headers};
use hermes_core::ContextObject;
use hermes_pipeline::Arg;
use serde::de::DeserializeOwned;

/// The outcome of a request flight, with helper methods for assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    arg: Arg,
}

impl TestResponse {
    /// Wraps the argument bag left by a flight.
    pub fn new(arg: Arg) -> Self {
        Self { arg }
    }

    /// The argument bag.
    pub fn arg(&self) -> &Arg {
        &self.arg
    }

    /// The request context, as seen last by the flight.
    pub fn request(&self) -> Option<&ContextObject> {
        self.arg.object(names::REQUEST)
    }

    /// The response context.
    pub fn response(&self) -> Option<&ContextObject> {
        self.arg.object(names::RESPONSE)
    }

    /// Returns the status code, if any processor set one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response()?.get(response::STATUS)
    }

    /// Returns the code tag.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        self.response()?.get(response::CODE)
    }

    /// Returns the explanatory text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.response()?.get(response::TEXT)
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> Headers {
        self.response()
            .and_then(|response| response.get(response::HEADERS))
            .unwrap_or_default()
    }

    /// Returns false only when the response is flagged as failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response().map_or(true, codes::response_is_success)
    }

    /// Returns the response body.
    #[must_use]
    pub fn body(&self) -> Bytes {
        self.arg
            .object(names::RESPONSE_CNT)
            .and_then(|content| content.get(content::SOURCE))
            .unwrap_or_default()
    }

    /// Returns the body as text.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> TestResult<T> {
        Ok(serde_json::from_slice(&self.body())?)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status(),
            Some(expected),
            "Expected status {expected}, got {:?} ({:?})",
            self.status(),
            self.code()
        );
        self
    }
}

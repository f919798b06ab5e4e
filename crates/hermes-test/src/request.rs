//! Test request building.

use crate::error::{TestError, TestResult};
use bytes::Bytes;
use hermes_core::http::{content, names, request, Headers, Parameters};
use hermes_core::ContextObject;
use hermes_pipeline::{Arg, Processing};
use http::Method;
use std::any::Any;

/// A request flight input for a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI, without the leading slash
    pub uri: String,
    /// Request scheme
    pub scheme: String,
    /// Request headers
    pub headers: Headers,
    /// Request parameters
    pub parameters: Parameters,
    /// Client IP
    pub client_ip: Option<String>,
    /// Request body
    pub body: Option<Bytes>,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a new OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Creates the argument bag of a flight over the processing: the request
    /// contexts from this request, every other context fresh.
    pub fn into_arg(self, processing: &Processing) -> TestResult<Arg> {
        let class = processing
            .context(names::REQUEST)
            .ok_or_else(|| TestError::MissingContext(names::REQUEST.to_string()))?;
        let object = class.create();
        set_declared(&object, request::SCHEME, self.scheme)?;
        set_declared(&object, request::METHOD, self.method.as_str().to_string())?;
        set_declared(&object, request::URI, self.uri)?;
        set_declared(&object, request::HEADERS, self.headers)?;
        set_declared(&object, request::PARAMETERS, self.parameters)?;
        if let Some(client_ip) = self.client_ip {
            set_declared(&object, request::CLIENT_IP, client_ip)?;
        }
        let mut arg = Arg::new().with_object(names::REQUEST, object);

        if let Some(body) = self.body {
            let class = processing
                .context(names::REQUEST_CNT)
                .ok_or_else(|| TestError::MissingContext(names::REQUEST_CNT.to_string()))?;
            let object = class.create();
            set_declared(&object, content::SOURCE, body)?;
            arg = arg.with_object(names::REQUEST_CNT, object);
        }

        processing.fill_in(&mut arg);
        Ok(arg)
    }
}

fn set_declared<T: Any + Send + Sync>(object: &ContextObject, name: &str, value: T) -> TestResult<()> {
    if object.class().declares(name) {
        object
            .set(name, value)
            .map_err(|e| TestError::Processing(e.into()))?;
    }
    Ok(())
}

/// Builder for constructing test requests.
#[must_use]
pub struct TestRequestBuilder {
    request: TestRequest,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            request: TestRequest {
                method,
                uri: uri.as_ref().trim_start_matches('/').to_string(),
                scheme: "http".to_string(),
                headers: Headers::new(),
                parameters: Parameters::new(),
                client_ip: None,
                body: None,
            },
        }
    }

    /// Sets a header on the request.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = TestRequest::get("articles/1")
    ///     .header("Authorization", "t1")
    ///     .build();
    /// ```
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    /// Appends a parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.parameters.push((name.into(), value.into()));
        self
    }

    /// Sets the client IP.
    pub fn client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.request.client_ip = Some(client_ip.into());
        self
    }

    /// Sets the scheme.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.request.scheme = scheme.into();
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Builds the request.
    pub fn build(self) -> TestRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = TestRequest::get("/articles/1")
            .header("Authorization", "t1")
            .parameter("page", "2")
            .client_ip("127.0.0.1")
            .build();

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.uri, "articles/1");
        assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("t1"));
        assert_eq!(request.parameters, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.client_ip.as_deref(), Some("127.0.0.1"));
    }
}

//! Canonical request and response contexts.
//!
//! These are the contexts the surrounding HTTP server hands to a processing.
//! Every attribute is defined by the server; at runtime only `method` and
//! `uri` are guaranteed to be set.

use crate::context::ContextSpec;
use bytes::Bytes;
use indexmap::IndexMap;
use std::sync::Arc;

/// Header name to value, in arrival order.
pub type Headers = IndexMap<String, String>;

/// Query parameters, repeated names allowed.
pub type Parameters = Vec<(String, String)>;

/// Decodes a header by name, case-insensitively.
pub type HeaderDecoder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Pulls the next chunk of a request body, `None` once exhausted.
pub type ContentReader = Arc<dyn Fn() -> Option<Bytes> + Send + Sync>;

/// Context names used by the server.
pub mod names {
    /// The request context.
    pub const REQUEST: &str = "request";
    /// The request content context.
    pub const REQUEST_CNT: &str = "request_cnt";
    /// The response context.
    pub const RESPONSE: &str = "response";
    /// The response content context.
    pub const RESPONSE_CNT: &str = "response_cnt";
}

/// Request attribute names.
pub mod request {
    /// `String`, `http` or `https`.
    pub const SCHEME: &str = "scheme";
    /// `String`, upper case method.
    pub const METHOD: &str = "method";
    /// `String`, path relative to the server root.
    pub const URI: &str = "uri";
    /// [`Headers`](super::Headers).
    pub const HEADERS: &str = "headers";
    /// [`Parameters`](super::Parameters).
    pub const PARAMETERS: &str = "parameters";
    /// `String`, remote address.
    pub const CLIENT_IP: &str = "client_ip";
    /// [`HeaderDecoder`](super::HeaderDecoder).
    pub const DECODER_HEADER: &str = "decoder_header";
}

/// Content attribute names, shared by request and response contents.
pub mod content {
    /// `Bytes`, the body.
    pub const SOURCE: &str = "source";
    /// [`ContentReader`](super::ContentReader).
    pub const DO_CONTENT_READER: &str = "do_content_reader";
}

/// Response attribute names.
pub mod response {
    pub use crate::codes::attributes::{CODE, IS_SUCCESS, STATUS, TEXT};
    /// [`Headers`](super::Headers).
    pub const HEADERS: &str = "headers";
}

/// The request context as provided by the server.
pub fn request_spec() -> ContextSpec {
    ContextSpec::new("Request")
        .defines::<String>(request::SCHEME)
        .defines::<String>(request::METHOD)
        .defines::<String>(request::URI)
        .defines::<Headers>(request::HEADERS)
        .defines::<Parameters>(request::PARAMETERS)
        .defines::<String>(request::CLIENT_IP)
        .defines::<HeaderDecoder>(request::DECODER_HEADER)
}

/// The request content context as provided by the server.
pub fn request_content_spec() -> ContextSpec {
    ContextSpec::new("RequestContent")
        .defines::<Bytes>(content::SOURCE)
        .defines::<ContentReader>(content::DO_CONTENT_READER)
}

/// The response context as provided by the server.
pub fn response_spec() -> ContextSpec {
    ContextSpec::new("Response")
        .defines::<u16>(response::STATUS)
        .defines::<String>(response::CODE)
        .defines::<String>(response::TEXT)
        .defines::<bool>(response::IS_SUCCESS)
        .defines::<Headers>(response::HEADERS)
}

/// The response content context as provided by the server.
pub fn response_content_spec() -> ContextSpec {
    ContextSpec::new("ResponseContent").defines::<Bytes>(content::SOURCE)
}

/// Looks a header up ignoring ASCII case.
pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

//! Coded HTTP statuses flown through the pipeline.
//!
//! A [`Code`] pairs a short tag with the HTTP status it maps to. Processors
//! apply codes on the response context instead of raising, so the rest of the
//! chain can still render a response.

use crate::context::ContextObject;
use crate::error::AttrResult;
use serde::Serialize;
use std::fmt;

/// Attribute names a code writes on a response context.
pub mod attributes {
    /// The code tag, `String`.
    pub const CODE: &str = "code";
    /// The HTTP status, `u16`.
    pub const STATUS: &str = "status";
    /// Whether the response is successful, `bool`.
    pub const IS_SUCCESS: &str = "is_success";
    /// Free text explaining the status, `String`.
    pub const TEXT: &str = "text";
}

/// A coded HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Code {
    /// The code tag.
    pub code: &'static str,
    /// The HTTP status code.
    pub status: u16,
    /// Whether this code marks a successful response.
    pub is_success: bool,
}

impl Code {
    /// Creates a code; success is derived from the status class.
    #[must_use]
    pub const fn new(code: &'static str, status: u16) -> Self {
        Self {
            code,
            status,
            is_success: is_success(status),
        }
    }

    /// The status as an [`http::StatusCode`].
    pub fn status_code(&self) -> Option<http::StatusCode> {
        http::StatusCode::from_u16(self.status).ok()
    }

    /// Writes the code, status and success flag on a response context.
    pub fn apply(&self, response: &ContextObject) -> AttrResult<()> {
        response.set(attributes::CODE, self.code.to_string())?;
        response.set(attributes::STATUS, self.status)?;
        response.set(attributes::IS_SUCCESS, self.is_success)
    }

    /// Writes the code together with an explanatory text.
    pub fn apply_with_text(&self, response: &ContextObject, text: impl Into<String>) -> AttrResult<()> {
        self.apply(response)?;
        response.set(attributes::TEXT, text.into())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.code)
    }
}

/// Checks whether a status is in the success class.
#[must_use]
pub const fn is_success(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Reads the success flag of a response context.
///
/// An unset flag is not a failure.
pub fn response_is_success(response: &ContextObject) -> bool {
    response.get::<bool>(attributes::IS_SUCCESS) != Some(false)
}

/// Path resolved.
pub const PATH_FOUND: Code = Code::new("Path found", 200);
/// Temporary redirect.
pub const REDIRECT: Code = Code::new("Redirect", 302);
/// Unspecified bad request.
pub const BAD_REQUEST: Code = Code::new("Bad request", 400);
/// The request input could not be processed.
pub const INPUT_ERROR: Code = Code::new("Input error", 400);
/// Illegal parameter.
pub const PARAMETER_ILLEGAL: Code = Code::new("Illegal parameter", 400);
/// Invalid parameter value.
pub const PARAMETER_INVALID: Code = Code::new("Invalid parameter", 400);
/// Invalid header.
pub const HEADER_ERROR: Code = Code::new("Invalid header", 400);
/// Unknown character encoding.
pub const ENCODING_UNKNOWN: Code = Code::new("Unknown encoding", 400);
/// Invalid time zone.
pub const TIME_ZONE_ERROR: Code = Code::new("Invalid time zone", 400);
/// Invalid or expired authorization.
pub const INVALID_AUTHORIZATION: Code = Code::new("Invalid authorization", 401);
/// Access denied by a filter.
pub const FORBIDDEN_ACCESS: Code = Code::new("Forbidden access", 403);
/// No gateway or resource for the path.
pub const PATH_NOT_FOUND: Code = Code::new("Path not found", 404);
/// The path exists but not for the method.
pub const METHOD_NOT_AVAILABLE: Code = Code::new("Method not available", 405);
/// Content type not acceptable.
pub const CONTENT_TYPE_ERROR: Code = Code::new("Content type not acceptable", 406);
/// An upstream service failed.
pub const BAD_GATEWAY: Code = Code::new("Bad gateway", 502);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextClass, ContextSpec};

    #[test]
    fn test_success_class() {
        assert!(PATH_FOUND.is_success);
        assert!(!REDIRECT.is_success);
        assert!(!BAD_GATEWAY.is_success);
        assert_eq!(METHOD_NOT_AVAILABLE.status_code(), Some(http::StatusCode::METHOD_NOT_ALLOWED));
        assert_eq!(INVALID_AUTHORIZATION.to_string(), "401 Invalid authorization");
    }

    #[test]
    fn test_apply_on_response() {
        let spec = ContextSpec::new("Response")
            .defines::<String>(attributes::CODE)
            .defines::<u16>(attributes::STATUS)
            .defines::<bool>(attributes::IS_SUCCESS)
            .defines::<String>(attributes::TEXT);
        let response = ContextClass::generate("Response", spec.attributes()).unwrap().create();
        assert!(response_is_success(&response));

        BAD_GATEWAY.apply_with_text(&response, "upstream down").unwrap();
        assert_eq!(response.get::<u16>(attributes::STATUS), Some(502));
        assert_eq!(response.get::<String>(attributes::CODE).as_deref(), Some("Bad gateway"));
        assert_eq!(response.get::<String>(attributes::TEXT).as_deref(), Some("upstream down"));
        assert!(!response_is_success(&response));
    }
}

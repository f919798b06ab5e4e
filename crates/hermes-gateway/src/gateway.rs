//! Gateway descriptors and their matching rules.
//!
//! Descriptors arrive as JSON from the gateway publishing service:
//!
//! ```json
//! { "GatewayList": [ { "Pattern": "articles/(\\d+)", "Methods": ["GET"],
//!                      "Filters": ["1:filter/article/{1}"], "Navigate": "resources/*" } ] }
//! ```

use crate::error::{GatewayError, GatewayResult};
use hermes_core::http::Headers;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The gateway list document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayList {
    /// The descriptors, in matching order.
    #[serde(rename = "GatewayList", default)]
    pub gateways: Vec<GatewayObject>,
}

/// A gateway descriptor as received.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayObject {
    /// Client IP patterns.
    #[serde(default)]
    pub clients: Vec<String>,
    /// URI pattern.
    #[serde(default)]
    pub pattern: Option<String>,
    /// `name:value` header patterns.
    #[serde(default)]
    pub headers: Vec<String>,
    /// Allowed methods.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Handled error statuses.
    #[serde(default)]
    pub errors: Vec<ErrorValue>,
    /// `<group>:<uri>` filters.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Host override.
    #[serde(default)]
    pub host: Option<String>,
    /// Protocol override.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Navigate template.
    #[serde(default)]
    pub navigate: Option<String>,
    /// Headers to put on the forwarded request.
    #[serde(default)]
    pub put_headers: PutHeaders,
}

/// An error status, published either as a number or as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    /// Numeric form.
    Code(u16),
    /// Text form.
    Text(String),
}

impl ErrorValue {
    fn status(&self) -> GatewayResult<u16> {
        match self {
            Self::Code(status) => Ok(*status),
            Self::Text(text) => text.trim().parse().map_err(|_| GatewayError::ErrorValue {
                value: text.clone(),
            }),
        }
    }
}

/// Put headers, published as a map or as `name:value` items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PutHeaders {
    /// Map form.
    Map(IndexMap<String, String>),
    /// Item form.
    List(Vec<String>),
}

impl Default for PutHeaders {
    fn default() -> Self {
        Self::Map(IndexMap::new())
    }
}

impl PutHeaders {
    fn headers(self) -> GatewayResult<Headers> {
        match self {
            Self::Map(headers) => Ok(headers),
            Self::List(items) => items
                .into_iter()
                .map(|item| match item.split_once(':') {
                    Some((name, value)) => Ok((name.trim().to_string(), value.trim().to_string())),
                    None => Err(GatewayError::PutHeader { value: item }),
                })
                .collect(),
        }
    }
}

/// A filter call that must allow the navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    group: Option<usize>,
    uri: String,
}

impl Filter {
    /// Parses `<group>:<uri>`; items without a numeric prefix apply to no
    /// particular group.
    pub fn parse(item: &str) -> Self {
        match item.split_once(':') {
            Some((group, uri)) if !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()) => Self {
                group: group.parse().ok(),
                uri: uri.to_string(),
            },
            _ => Self {
                group: None,
                uri: item.to_string(),
            },
        }
    }

    /// The URI group the filter applies to.
    pub fn group(&self) -> Option<usize> {
        self.group
    }

    /// The URI template.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Formats the URI with the match groups; `{}` stands for the value of
    /// the filter group.
    pub fn format(&self, groups: &[String]) -> GatewayResult<String> {
        let uri = match self.group {
            Some(group) => {
                let value = group
                    .checked_sub(1)
                    .and_then(|index| groups.get(index))
                    .ok_or_else(|| GatewayError::template(&self.uri, groups.len()))?;
                self.uri.replace("{}", value)
            }
            None => self.uri.clone(),
        };
        format_groups(&uri, groups)
    }
}

/// Replaces `{n}` placeholders with the `n`th group, counting from one.
pub fn format_groups(template: &str, groups: &[String]) -> GatewayResult<String> {
    let mut formatted = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        formatted.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let digits = tail.find('}').map(|close| (&tail[..close], close));
        match digits {
            Some((digits, close)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                let value = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| groups.get(index))
                    .ok_or_else(|| GatewayError::template(template, groups.len()))?;
                formatted.push_str(value);
                rest = &tail[close + 1..];
            }
            _ => {
                formatted.push('{');
                rest = tail;
            }
        }
    }
    formatted.push_str(rest);
    Ok(formatted)
}

fn compile(pattern: &str) -> GatewayResult<Regex> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|source| GatewayError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// What a request offers for matching. Unset parts are not checked, except
/// where a gateway insists on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<'a> {
    /// Client IP.
    pub client_ip: Option<&'a str>,
    /// Request method.
    pub method: Option<&'a str>,
    /// Request headers.
    pub headers: Option<&'a Headers>,
    /// Request URI.
    pub uri: Option<&'a str>,
    /// Error status being resolved.
    pub error: Option<u16>,
}

impl<'a> Query<'a> {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client IP.
    pub fn client_ip(mut self, client_ip: &'a str) -> Self {
        self.client_ip = Some(client_ip);
        self
    }

    /// Sets the method.
    pub fn method(mut self, method: &'a str) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the headers.
    pub fn headers(mut self, headers: &'a Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the URI.
    pub fn uri(mut self, uri: &'a str) -> Self {
        self.uri = Some(uri);
        self
    }

    /// Sets the error status.
    pub fn error(mut self, error: u16) -> Self {
        self.error = Some(error);
        self
    }
}

/// A compiled gateway descriptor.
#[derive(Debug, Clone)]
pub struct Gateway {
    clients: Vec<Regex>,
    pattern: Option<Regex>,
    headers: Vec<Regex>,
    methods: BTreeSet<String>,
    errors: BTreeSet<u16>,
    filters: Vec<Filter>,
    host: Option<String>,
    protocol: Option<String>,
    navigate: Option<String>,
    put_headers: Headers,
}

impl Gateway {
    /// Compiles a descriptor.
    pub fn compile(object: GatewayObject) -> GatewayResult<Self> {
        Ok(Self {
            clients: object.clients.iter().map(|c| compile(c)).collect::<GatewayResult<_>>()?,
            pattern: object.pattern.as_deref().filter(|p| !p.is_empty()).map(compile).transpose()?,
            headers: object.headers.iter().map(|h| compile(h)).collect::<GatewayResult<_>>()?,
            methods: object.methods.iter().map(|m| m.to_uppercase()).collect(),
            errors: object.errors.iter().map(ErrorValue::status).collect::<GatewayResult<_>>()?,
            filters: object.filters.iter().map(|f| Filter::parse(f)).collect(),
            host: object.host.filter(|h| !h.is_empty()),
            protocol: object.protocol.filter(|p| !p.is_empty()),
            navigate: object.navigate.filter(|n| !n.is_empty()),
            put_headers: object.put_headers.headers()?,
        })
    }

    /// Parses and compiles a gateway list document.
    pub fn parse_list(json: &[u8]) -> GatewayResult<Vec<Self>> {
        let list: GatewayList = serde_json::from_slice(json)?;
        list.gateways.into_iter().map(Self::compile).collect()
    }

    /// Allowed methods, upper case; empty allows any.
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Handled error statuses.
    pub fn errors(&self) -> &BTreeSet<u16> {
        &self.errors
    }

    /// The filters to check before navigating.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Host override.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Protocol override.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Navigate template.
    pub fn navigate(&self) -> Option<&str> {
        self.navigate.as_deref()
    }

    /// Headers to put on the forwarded request.
    pub fn put_headers(&self) -> &Headers {
        &self.put_headers
    }

    /// Checks the query, returning the URI groups on a match.
    pub fn matches(&self, query: &Query<'_>) -> Option<Vec<String>> {
        if !self.clients.is_empty() {
            let client_ip = query.client_ip?;
            if !self.clients.iter().any(|client| client.is_match(client_ip)) {
                return None;
            }
        }

        if let Some(method) = query.method {
            if !self.methods.is_empty() && !self.methods.contains(&method.to_uppercase()) {
                return None;
            }
        }

        if !self.headers.is_empty() {
            let headers = query.headers?;
            let matched = headers.iter().any(|(name, value)| {
                let header = format!("{name}:{value}");
                self.headers.iter().any(|pattern| pattern.is_match(&header))
            });
            if !matched {
                return None;
            }
        }

        let mut groups = Vec::new();
        if let Some(pattern) = &self.pattern {
            let captures = pattern.captures(query.uri?)?;
            groups = captures
                .iter()
                .skip(1)
                .map(|group| group.map_or_else(String::new, |g| g.as_str().to_string()))
                .collect();
        }

        match query.error {
            Some(error) if !self.errors.contains(&error) => return None,
            None if !self.errors.is_empty() => return None,
            _ => {}
        }

        Some(groups)
    }
}

/// A found gateway with the groups captured from the URI.
#[derive(Debug, Clone)]
pub struct Match {
    /// The gateway.
    pub gateway: Arc<Gateway>,
    /// URI groups, an unmatched group being empty.
    pub groups: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(json: &str) -> Gateway {
        let object: GatewayObject = serde_json::from_str(json).unwrap();
        Gateway::compile(object).unwrap()
    }

    fn groups(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let gateway = gateway(r#"{"Pattern": "articles/(\\d+)"}"#);
        assert_eq!(gateway.matches(&Query::new().uri("articles/42/x")), Some(groups(&["42"])));
        assert_eq!(gateway.matches(&Query::new().uri("my/articles/42")), None);
        assert_eq!(gateway.matches(&Query::new()), None);
    }

    #[test]
    fn test_errors_match_symmetrically() {
        let error = gateway(r#"{"Errors": ["404", 405]}"#);
        let plain = gateway("{}");

        assert!(error.matches(&Query::new().error(404)).is_some());
        assert!(error.matches(&Query::new().error(405)).is_some());
        assert!(error.matches(&Query::new().error(403)).is_none());
        assert!(error.matches(&Query::new()).is_none());
        assert!(plain.matches(&Query::new().error(404)).is_none());
        assert!(plain.matches(&Query::new()).is_some());
    }

    #[test]
    fn test_invalid_error_value() {
        let object: GatewayObject = serde_json::from_str(r#"{"Errors": ["nope"]}"#).unwrap();
        let error = Gateway::compile(object).unwrap_err();
        assert_eq!(error.to_string(), "Invalid error value 'nope'");
    }

    #[test]
    fn test_headers_and_clients() {
        let gateway = gateway(r#"{"Clients": ["127\\.0\\.0\\.1"], "Headers": ["X-Filter:.*"]}"#);
        let mut headers = Headers::new();
        headers.insert("X-Filter".into(), "on".into());

        let query = Query::new().client_ip("127.0.0.1").headers(&headers);
        assert!(gateway.matches(&query).is_some());
        assert!(gateway.matches(&Query::new().headers(&headers)).is_none());
        assert!(gateway.matches(&Query::new().client_ip("127.0.0.1")).is_none());
        assert!(gateway
            .matches(&Query::new().client_ip("10.0.0.1").headers(&headers))
            .is_none());
    }

    #[test]
    fn test_put_headers_forms() {
        let map = gateway(r#"{"PutHeaders": {"X-A": "1"}}"#);
        let list = gateway(r#"{"PutHeaders": ["X-A: 1"]}"#);
        assert_eq!(map.put_headers(), list.put_headers());
    }

    #[test]
    fn test_format_groups() {
        let groups = groups(&["42", "x"]);
        assert_eq!(format_groups("a/{1}/b/{2}", &groups).unwrap(), "a/42/b/x");
        assert_eq!(format_groups("{json}", &groups).unwrap(), "{json}");
        assert!(format_groups("{3}", &groups).is_err());
        assert!(format_groups("{0}", &groups).is_err());
    }

    #[test]
    fn test_filter_parse_and_format() {
        let filter = Filter::parse("1:filter/{}/allowed");
        assert_eq!(filter.group(), Some(1));
        assert_eq!(filter.format(&groups(&["42"])).unwrap(), "filter/42/allowed");

        let plain = Filter::parse("http://acl/{1}");
        assert_eq!(plain.group(), None);
        assert_eq!(plain.format(&groups(&["7"])).unwrap(), "http://acl/7");
    }
}

//! Forwarding the request to the matched gateway.

use crate::attributes::{HOST, MATCH};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{format_groups, Match};
use hermes_core::http::{names, request, Headers, Parameters};
use hermes_core::{ContextObject, ContextSpec};
use hermes_pipeline::{ArgValue, BoxFuture, BranchingHandler, Chain, Contexts, ExecutionResult, Processing};
use reqwest::Url;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Where a navigate URI leads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Scheme of an absolute navigate URI.
    pub scheme: Option<String>,
    /// Host of an absolute navigate URI.
    pub host: Option<String>,
    /// Path without the leading slash.
    pub uri: String,
    /// Parameters of the navigate query.
    pub parameters: Parameters,
}

/// Resolves a navigate URI: `*` stands for the request URI and `{n}` for
/// the `n`th URI group.
pub fn navigate(navigate: &str, uri: &str, groups: &[String]) -> GatewayResult<Navigation> {
    let resolved = format_groups(&navigate.replace('*', uri), groups)?;
    let invalid = |e: &dyn std::fmt::Display| GatewayError::Navigate {
        uri: resolved.clone(),
        message: e.to_string(),
    };
    let base = Url::parse("http://localhost/").map_err(|e| invalid(&e))?;
    let url = base.join(&resolved).map_err(|e| invalid(&e))?;

    let absolute = Url::parse(&resolved).is_ok();
    Ok(Navigation {
        scheme: absolute.then(|| url.scheme().to_string()),
        host: if absolute {
            url.host_str().map(|host| match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            })
        } else {
            None
        },
        uri: url.path().trim_start_matches('/').to_string(),
        parameters: url.query_pairs().map(|(name, value)| (name.into_owned(), value.into_owned())).collect(),
    })
}

/// Puts the headers over the existing ones, replacing names regardless of
/// case.
fn put_headers(mut headers: Headers, put: &Headers) -> Headers {
    for (name, value) in put {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        headers.insert(name.clone(), value.clone());
    }
    headers
}

fn set_declared<T: Any + Send + Sync>(object: &ContextObject, name: &str, value: T) -> ExecutionResult<()> {
    if object.class().declares(name) {
        object.set(name, value)?;
    }
    Ok(())
}

fn fresh(processing: &Processing, name: &str, existing: Option<&ContextObject>) -> Option<ContextObject> {
    processing
        .context(name)
        .or_else(|| existing.map(ContextObject::class))
        .map(|class| class.create())
}

/// Rebuilds the request for the matched gateway and branches into the
/// forwarding processing with fresh response contexts.
///
/// Requests without a match continue untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct GatewayForward;

impl GatewayForward {
    /// Creates the forward.
    pub fn new() -> Self {
        Self
    }

    fn forwarded(request: &ContextObject, found: &Match, target: &ContextObject) -> ExecutionResult<()> {
        target.push_from(request);
        let gateway = &found.gateway;
        let uri = request.get::<String>(request::URI).unwrap_or_default();
        let mut parameters = request.get::<Parameters>(request::PARAMETERS).unwrap_or_default();

        let mut scheme = request.get::<String>(request::SCHEME);
        let mut host = None;
        let mut target_uri = uri.clone();
        if let Some(template) = gateway.navigate() {
            let navigation = navigate(template, &uri, &found.groups)?;
            target_uri = navigation.uri;
            parameters = navigation.parameters.into_iter().chain(parameters).collect();
            scheme = navigation.scheme.or(scheme);
            host = navigation.host;
        }
        if let Some(protocol) = gateway.protocol() {
            scheme = Some(protocol.to_string());
        }
        if let Some(gateway_host) = gateway.host() {
            host = Some(gateway_host.to_string());
        }

        debug!(uri = %uri, forward = %target_uri, host = ?host, "Forwarding request");
        set_declared(target, request::URI, target_uri)?;
        set_declared(target, request::PARAMETERS, parameters)?;
        if let Some(scheme) = scheme {
            set_declared(target, request::SCHEME, scheme)?;
        }
        if let Some(host) = host {
            set_declared(target, HOST, host)?;
        }
        if !gateway.put_headers().is_empty() {
            let headers = request.get::<Headers>(request::HEADERS).unwrap_or_default();
            set_declared(target, request::HEADERS, put_headers(headers, gateway.put_headers()))?;
        }
        Ok(())
    }
}

impl BranchingHandler for GatewayForward {
    fn name(&self) -> &str {
        "gateway_forward"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new().with(
            names::REQUEST,
            ContextSpec::new("Request")
                .optional::<Match>(MATCH)
                .optional::<String>(request::SCHEME)
                .optional::<String>(request::URI)
                .optional::<Headers>(request::HEADERS)
                .optional::<Parameters>(request::PARAMETERS)
                .defines::<String>(HOST),
        )
    }

    fn process<'a>(
        &'a self,
        chain: &'a mut Chain,
        processings: &'a [Arc<Processing>],
    ) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let Some(processing) = processings.first() else {
                return Ok(());
            };
            let request = chain.object(names::REQUEST)?;
            let Some(found) = request.get::<Match>(MATCH) else {
                return Ok(());
            };

            let Some(target) = fresh(processing, names::REQUEST, Some(&request)) else {
                return Ok(());
            };
            Self::forwarded(&request, &found, &target)?;

            let request_cnt = chain.object(names::REQUEST_CNT).ok();
            let response = chain.object(names::RESPONSE).ok();
            let response_cnt = chain.object(names::RESPONSE_CNT).ok();
            let target_cnt = fresh(processing, names::REQUEST_CNT, request_cnt.as_ref());
            if let (Some(target_cnt), Some(request_cnt)) = (&target_cnt, &request_cnt) {
                target_cnt.push_from(request_cnt);
            }

            let arg = chain.arg_mut();
            arg.insert(names::REQUEST, ArgValue::Object(target));
            if let Some(target_cnt) = target_cnt {
                arg.insert(names::REQUEST_CNT, ArgValue::Object(target_cnt));
            }
            if let Some(response) = fresh(processing, names::RESPONSE, response.as_ref()) {
                arg.insert(names::RESPONSE, ArgValue::Object(response));
            }
            if let Some(response_cnt) = fresh(processing, names::RESPONSE_CNT, response_cnt.as_ref()) {
                arg.insert(names::RESPONSE_CNT, ArgValue::Object(response_cnt));
            }
            chain.branch(processing);
            Ok(())
        })
    }
}

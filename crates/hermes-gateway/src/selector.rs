//! Selecting the gateway for a request.

use crate::attributes::{ALLOWS, MATCH, REPOSITORY};
use crate::coded_response;
use crate::gateway::{Match, Query};
use crate::repository::{Repository, SharedRepository};
use hermes_core::codes::{self, METHOD_NOT_AVAILABLE, PATH_NOT_FOUND};
use hermes_core::http::{names, request, Headers};
use hermes_core::{ContextObject, ContextSpec};
use hermes_pipeline::{BoxFuture, Chain, Contexts, ExecutionResult, Handler};
use std::collections::BTreeSet;
use tracing::debug;

/// Finds the gateway for the request attributes, optionally for an error
/// status.
pub(crate) fn find_match(request: &ContextObject, repository: &dyn Repository, error: Option<u16>) -> Option<Match> {
    let method = request.get::<String>(request::METHOD);
    let uri = request.get::<String>(request::URI);
    let headers = request.get_arc::<Headers>(request::HEADERS);
    let client_ip = request.get::<String>(request::CLIENT_IP);

    let query = Query {
        client_ip: client_ip.as_deref(),
        method: method.as_deref(),
        headers: headers.as_deref(),
        uri: uri.as_deref(),
        error,
    };
    repository.find(&query)
}

/// Stores the match on the request, or removes a previous one.
pub(crate) fn place_match(request: &ContextObject, found: Option<Match>) -> ExecutionResult<()> {
    match found {
        Some(found) => request.set(MATCH, found)?,
        None => {
            request.unset(MATCH);
        }
    }
    Ok(())
}

/// Picks the gateway of the request from its repository.
///
/// A request no gateway accepts gets `405` when some gateway allows the URI
/// for other methods and `404` otherwise; the error gateway for that status
/// becomes the match.
#[derive(Debug, Default, Clone, Copy)]
pub struct GatewaySelector;

impl GatewaySelector {
    /// Creates the selector.
    pub fn new() -> Self {
        Self
    }
}

impl Handler for GatewaySelector {
    fn name(&self) -> &str {
        "gateway_selector"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new()
            .with(
                names::REQUEST,
                ContextSpec::new("Request")
                    .requires::<String>(request::METHOD)
                    .requires::<String>(request::URI)
                    .requires::<SharedRepository>(REPOSITORY)
                    .optional::<Headers>(request::HEADERS)
                    .optional::<String>(request::CLIENT_IP)
                    .defines::<Match>(MATCH),
            )
            .with(
                names::RESPONSE,
                coded_response().defines::<BTreeSet<String>>(ALLOWS),
            )
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object(names::REQUEST)?;
            let response = chain.object(names::RESPONSE)?;
            if !codes::response_is_success(&response) {
                return Ok(());
            }
            let Some(repository) = request.get::<SharedRepository>(REPOSITORY) else {
                return Ok(());
            };

            let found = match find_match(&request, repository.as_ref(), None) {
                Some(found) => {
                    metrics::counter!("hermes_gateway_matches_total", "outcome" => "found").increment(1);
                    Some(found)
                }
                None => {
                    let headers = request.get_arc::<Headers>(request::HEADERS);
                    let uri = request.get::<String>(request::URI);
                    let allows = repository.allows_for(headers.as_deref(), uri.as_deref());
                    let code = if allows.is_empty() {
                        PATH_NOT_FOUND
                    } else {
                        METHOD_NOT_AVAILABLE
                    };
                    debug!(uri = ?uri, status = code.status, allows = ?allows, "No gateway for the request");
                    metrics::counter!("hermes_gateway_matches_total", "outcome" => "unmatched").increment(1);

                    code.apply(&response)?;
                    if !allows.is_empty() {
                        response.update::<BTreeSet<String>, _>(ALLOWS, |existing| existing.extend(allows))?;
                    }
                    find_match(&request, repository.as_ref(), Some(code.status))
                }
            };
            place_match(&request, found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;
    use crate::repository::GatewayRepository;
    use hermes_core::ContextClass;

    fn request_object() -> ContextObject {
        let spec = ContextSpec::new("Request")
            .defines::<String>(request::METHOD)
            .defines::<String>(request::URI)
            .defines::<Headers>(request::HEADERS)
            .defines::<String>(request::CLIENT_IP);
        ContextClass::generate("Request", spec.attributes()).unwrap().create()
    }

    #[test]
    fn test_find_match_reads_the_request() {
        let repository = GatewayRepository::new(
            Gateway::parse_list(
                br#"{"GatewayList": [
                    {"Clients": ["10\\..*"], "Pattern": "x", "Navigate": "internal"},
                    {"Pattern": "x", "Methods": ["GET"], "Navigate": "public"}
                ]}"#,
            )
            .unwrap(),
        );
        let request = request_object();
        request.set(request::METHOD, "GET".to_string()).unwrap();
        request.set(request::URI, "x".to_string()).unwrap();

        let found = find_match(&request, &repository, None).unwrap();
        assert_eq!(found.gateway.navigate(), Some("public"));

        request.set(request::CLIENT_IP, "10.0.0.1".to_string()).unwrap();
        let found = find_match(&request, &repository, None).unwrap();
        assert_eq!(found.gateway.navigate(), Some("internal"));

        assert!(find_match(&request, &repository, Some(404)).is_none());
    }
}

//! Checking the filters of the matched gateway.

use crate::attributes::{MATCH, REPOSITORY};
use crate::coded_response;
use crate::error::GatewayResult;
use crate::fetcher::{Fetched, Fetcher};
use crate::gateway::Match;
use crate::repository::SharedRepository;
use crate::selector::{find_match, place_match};
use futures_util::future::join_all;
use hermes_core::codes::{BAD_GATEWAY, FORBIDDEN_ACCESS};
use hermes_core::http::{names, request, Headers};
use hermes_core::ContextSpec;
use hermes_pipeline::{BoxFuture, Chain, Contexts, ExecutionResult, Handler};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache identifier of the filter answers.
const FILTERS_CACHE: &str = "filters";

#[derive(Debug, Deserialize)]
struct Access {
    #[serde(rename = "HasAccess")]
    has_access: serde_json::Value,
}

/// Reads a filter answer; a failed call denies access.
fn allowed(fetched: &Fetched) -> GatewayResult<bool> {
    if !fetched.is_success() {
        return Ok(false);
    }
    let access: Access = fetched.json()?;
    Ok(match access.has_access {
        serde_json::Value::Bool(allowed) => allowed,
        serde_json::Value::String(allowed) => allowed == "True",
        _ => false,
    })
}

/// Calls the filters of the matched gateway and forbids the navigation when
/// any of them denies it.
///
/// Successful answers are cached in the repository for the configured time.
pub struct GatewayFilter {
    fetcher: Arc<dyn Fetcher>,
    cache_for: Duration,
}

impl GatewayFilter {
    /// Creates the filter processor.
    pub fn new(fetcher: Arc<dyn Fetcher>, cache_for: Duration) -> Self {
        Self { fetcher, cache_for }
    }
}

impl Handler for GatewayFilter {
    fn name(&self) -> &str {
        "gateway_filter"
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
            .with(names::RESPONSE, coded_response())
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object(names::REQUEST)?;
            let response = chain.object(names::RESPONSE)?;
            let Some(found) = request.get::<Match>(MATCH) else {
                return Ok(());
            };
            if found.gateway.filters().is_empty() {
                return Ok(());
            }
            let Some(repository) = request.get::<SharedRepository>(REPOSITORY) else {
                return Ok(());
            };

            let cache = repository.obtain_cache(FILTERS_CACHE);
            let mut denied = false;
            let mut unchecked = Vec::new();
            for filter in found.gateway.filters() {
                let uri = filter.format(&found.groups)?;
                match cache.get(&uri, self.cache_for) {
                    Some(allowed) => denied |= !allowed,
                    None => unchecked.push(uri),
                }
            }

            if !denied && !unchecked.is_empty() {
                let answers = join_all(unchecked.iter().map(|uri| self.fetcher.fetch(uri))).await;
                for (uri, answer) in unchecked.iter().zip(answers) {
                    let checked = answer.and_then(|fetched| {
                        let allowed = allowed(&fetched)?;
                        if fetched.is_success() {
                            cache.insert(uri.clone(), allowed);
                        }
                        Ok(allowed)
                    });
                    match checked {
                        Ok(allowed) => {
                            debug!(uri = %uri, allowed, "Filter checked");
                            denied |= !allowed;
                        }
                        Err(error) => {
                            warn!(uri = %uri, error = %error, "Cannot check the filter");
                            BAD_GATEWAY.apply_with_text(&response, error.to_string())?;
                            return Ok(());
                        }
                    }
                }
            }

            if denied {
                metrics::counter!("hermes_gateway_filter_denials_total").increment(1);
                FORBIDDEN_ACCESS.apply(&response)?;
                let found = find_match(&request, repository.as_ref(), Some(FORBIDDEN_ACCESS.status));
                place_match(&request, found)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_answers() {
        assert!(allowed(&Fetched::new(200, r#"{"HasAccess": true}"#)).unwrap());
        assert!(allowed(&Fetched::new(200, r#"{"HasAccess": "True"}"#)).unwrap());
        assert!(!allowed(&Fetched::new(200, r#"{"HasAccess": "true"}"#)).unwrap());
        assert!(!allowed(&Fetched::new(200, r#"{"HasAccess": false}"#)).unwrap());
        assert!(!allowed(&Fetched::new(404, "missing")).unwrap());
        assert!(allowed(&Fetched::new(200, "not json")).is_err());
    }
}

//! Processors providing the gateway repository to the request.
//!
//! [`GatewayRepositoryHandler`] serves the anonymous gateways, fetched once
//! and kept until the next cleanup. [`AuthorizedRepositoryHandler`] adds the
//! gateways of the request authorization in front of them.

use crate::attributes::{MATCH, REPOSITORY};
use crate::fetcher::Fetcher;
use crate::gateway::{Gateway, Match};
use crate::repository::{GatewayRepository, RepositoryJoined, SharedRepository};
use crate::scheduler::Cleanup;
use crate::selector::{find_match, place_match};
use crate::coded_response;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hermes_core::codes::{BAD_GATEWAY, INVALID_AUTHORIZATION};
use hermes_core::http::{self, names, request, Headers};
use hermes_core::{codes, ContextSpec};
use hermes_pipeline::{BoxFuture, Chain, Contexts, ExecutionResult, Handler};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why gateways could not be obtained.
#[derive(Debug, Clone)]
pub(crate) struct Unobtained {
    pub(crate) status: Option<u16>,
    pub(crate) text: String,
}

pub(crate) async fn obtain_gateways(fetcher: &dyn Fetcher, uri: &str) -> Result<GatewayRepository, Unobtained> {
    let fetched = fetcher.fetch(uri).await.map_err(|e| Unobtained {
        status: None,
        text: e.to_string(),
    })?;
    if !fetched.is_success() {
        return Err(Unobtained {
            status: Some(fetched.status),
            text: fetched.text(),
        });
    }
    let gateways = Gateway::parse_list(&fetched.body).map_err(|e| Unobtained {
        status: Some(fetched.status),
        text: e.to_string(),
    })?;
    debug!(uri, gateways = gateways.len(), "Gateways obtained");
    Ok(GatewayRepository::new(gateways))
}

/// Provides the anonymous gateway repository.
pub struct GatewayRepositoryHandler {
    uri: String,
    fetcher: Arc<dyn Fetcher>,
    repository: RwLock<Option<Arc<GatewayRepository>>>,
}

impl GatewayRepositoryHandler {
    /// Creates the handler fetching gateways from `uri`.
    pub fn new(uri: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            uri: uri.into(),
            fetcher,
            repository: RwLock::new(None),
        }
    }

    /// The gateway list URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether gateways are currently cached.
    pub fn is_cached(&self) -> bool {
        self.repository.read().is_some()
    }

    async fn repository(&self) -> Result<Arc<GatewayRepository>, Unobtained> {
        let cached = self.repository.read().clone();
        if let Some(repository) = cached {
            return Ok(repository);
        }
        let repository = Arc::new(obtain_gateways(self.fetcher.as_ref(), &self.uri).await?);
        *self.repository.write() = Some(Arc::clone(&repository));
        Ok(repository)
    }
}

impl Handler for GatewayRepositoryHandler {
    fn name(&self) -> &str {
        "gateway_repository"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new()
            .with(
                names::REQUEST,
                ContextSpec::new("Request").defines::<SharedRepository>(REPOSITORY),
            )
            .with(names::RESPONSE, coded_response())
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object(names::REQUEST)?;
            let response = chain.object(names::RESPONSE)?;
            match self.repository().await {
                Ok(repository) => {
                    let repository: SharedRepository = repository;
                    request.set(REPOSITORY, repository)?;
                }
                Err(unobtained) => {
                    warn!(uri = %self.uri, status = ?unobtained.status, "Cannot fetch the gateways");
                    BAD_GATEWAY.apply_with_text(&response, unobtained.text)?;
                }
            }
            Ok(())
        })
    }
}

impl Cleanup for GatewayRepositoryHandler {
    fn name(&self) -> &str {
        "gateways"
    }

    fn cleanup(&self) {
        *self.repository.write() = None;
    }
}

/// Provides the gateways of the request authorization, joined in front of
/// any repository already on the request.
pub struct AuthorizedRepositoryHandler {
    uri: String,
    header: String,
    fetcher: Arc<dyn Fetcher>,
    time_out: chrono::Duration,
    repositories: DashMap<String, Arc<GatewayRepository>>,
    last_access: DashMap<String, DateTime<Utc>>,
}

impl AuthorizedRepositoryHandler {
    /// Creates the handler; `%s` in `uri` is replaced by the authorization.
    /// Entries idle for longer than `time_out` are dropped on cleanup.
    pub fn new(uri: impl Into<String>, fetcher: Arc<dyn Fetcher>, time_out: Duration) -> Self {
        Self {
            uri: uri.into(),
            header: "Authorization".to_string(),
            fetcher,
            time_out: chrono::Duration::from_std(time_out).unwrap_or_else(|_| chrono::Duration::weeks(5200)),
            repositories: DashMap::new(),
            last_access: DashMap::new(),
        }
    }

    /// Sets the header carrying the authorization.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Number of cached authorizations.
    pub fn cached(&self) -> usize {
        self.repositories.len()
    }

    /// Whether the authorization is cached.
    pub fn is_cached(&self, authorization: &str) -> bool {
        self.repositories.contains_key(authorization)
    }

    /// Drops the authorizations not accessed since `now - time_out`.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.time_out) else {
            return 0;
        };
        let mut expired = Vec::new();
        self.last_access.retain(|authorization, last_access| {
            let keep = *last_access >= cutoff;
            if !keep {
                expired.push(authorization.clone());
            }
            keep
        });
        for authorization in &expired {
            self.repositories.remove(authorization);
        }
        if !expired.is_empty() {
            info!(expired = expired.len(), "Authorized gateways expired");
        }
        expired.len()
    }
}

impl Handler for AuthorizedRepositoryHandler {
    fn name(&self) -> &str {
        "gateway_authorized_repository"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new()
            .with(
                names::REQUEST,
                ContextSpec::new("Request")
                    .requires::<String>(request::METHOD)
                    .requires::<String>(request::URI)
                    .optional::<Headers>(request::HEADERS)
                    .optional::<String>(request::CLIENT_IP)
                    .defines::<SharedRepository>(REPOSITORY)
                    .defines::<Match>(MATCH),
            )
            .with(names::RESPONSE, coded_response())
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object(names::REQUEST)?;
            let response = chain.object(names::RESPONSE)?;
            if !codes::response_is_success(&response) {
                return Ok(());
            }
            let authorization = request
                .get::<Headers>(request::HEADERS)
                .and_then(|headers| http::header(&headers, &self.header).map(ToString::to_string));
            let Some(authorization) = authorization.filter(|a| !a.is_empty()) else {
                return Ok(());
            };

            let cached = self.repositories.get(&authorization).map(|entry| Arc::clone(entry.value()));
            let repository = match cached {
                Some(repository) => repository,
                None => {
                    let uri = self.uri.replace("%s", &authorization);
                    match obtain_gateways(self.fetcher.as_ref(), &uri).await {
                        Ok(repository) => {
                            let repository = Arc::new(repository);
                            self.repositories.insert(authorization.clone(), Arc::clone(&repository));
                            repository
                        }
                        Err(Unobtained {
                            status: Some(status),
                            ..
                        }) if (400..500).contains(&status) => {
                            debug!(status, "Authorization rejected");
                            INVALID_AUTHORIZATION.apply(&response)?;
                            if let Some(existing) = request.get::<SharedRepository>(REPOSITORY) {
                                let found = find_match(&request, existing.as_ref(), Some(INVALID_AUTHORIZATION.status));
                                place_match(&request, found)?;
                            }
                            return Ok(());
                        }
                        Err(unobtained) => {
                            info!(uri = %self.uri, status = ?unobtained.status, text = %unobtained.text, "Cannot fetch the authorized gateways");
                            BAD_GATEWAY.apply_with_text(&response, unobtained.text)?;
                            return Ok(());
                        }
                    }
                }
            };
            self.last_access.insert(authorization, Utc::now());

            let repository: SharedRepository = match request.get::<SharedRepository>(REPOSITORY) {
                Some(existing) => Arc::new(RepositoryJoined::new(vec![repository, existing])),
                None => repository,
            };
            request.set(REPOSITORY, repository)?;
            Ok(())
        })
    }
}

impl Cleanup for AuthorizedRepositoryHandler {
    fn name(&self) -> &str {
        "authorized gateways"
    }

    fn cleanup(&self) {
        self.cleanup_expired(Utc::now());
    }
}

//! The gateway assembly of a configured Hermes service.

use hermes_config::GatewayConfig;
use hermes_gateway::{
    AuthorizedRepositoryHandler, CleanupScheduler, ErrorPlacement, Fetcher, GatewayFilter, GatewayForward,
    GatewayRepositoryHandler, GatewayResult, GatewaySelector, HttpFetcher,
};
use hermes_pipeline::{Assembly, Brancher, Contextual, Routing};
use std::sync::Arc;
use tracing::info;

/// Gateway repositories, their cleanup schedulers and the assembly routing
/// requests through them.
///
/// ```ignore
/// let config = ConfigLoader::new().with_env_prefix("HERMES").load()?;
/// let service = GatewayService::from_config(&config.gateway)?;
/// service.start()?;
/// let processing = service.assembly(backend).create(&sources)?;
/// ```
pub struct GatewayService {
    config: GatewayConfig,
    fetcher: Arc<dyn Fetcher>,
    repository: Arc<GatewayRepositoryHandler>,
    authorized: Arc<AuthorizedRepositoryHandler>,
    schedulers: Vec<CleanupScheduler>,
}

impl GatewayService {
    /// Creates the service fetching gateways over HTTP from the configured
    /// base URL.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let fetcher = HttpFetcher::new(Some(&config.base_url), config.fetch_timeout())?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Creates the service over the given fetcher.
    pub fn new(config: &GatewayConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let repository = Arc::new(GatewayRepositoryHandler::new(config.uri.clone(), Arc::clone(&fetcher)));
        let authorized = Arc::new(
            AuthorizedRepositoryHandler::new(
                config.authorized_uri.clone(),
                Arc::clone(&fetcher),
                config.cleanup_authorized_interval(),
            )
            .with_header(config.authorization_header.clone()),
        );
        let schedulers = vec![
            CleanupScheduler::new(repository.clone(), config.cleanup_interval()),
            CleanupScheduler::new(authorized.clone(), config.cleanup_authorized_interval()),
        ];
        Self {
            config: config.clone(),
            fetcher,
            repository,
            authorized,
            schedulers,
        }
    }

    /// The anonymous gateways provider.
    pub fn repository(&self) -> &Arc<GatewayRepositoryHandler> {
        &self.repository
    }

    /// The authorized gateways provider.
    pub fn authorized(&self) -> &Arc<AuthorizedRepositoryHandler> {
        &self.authorized
    }

    /// Starts the cleanup schedulers on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AlreadyScheduled` if the service was started
    /// before.
    pub fn start(&self) -> GatewayResult<()> {
        for scheduler in &self.schedulers {
            scheduler.start()?;
        }
        info!(
            uri = %self.config.uri,
            cleanup_secs = self.config.cleanup_interval_secs,
            "Gateway service started"
        );
        Ok(())
    }

    /// Stops the cleanup schedulers.
    pub async fn stop(&self) {
        for scheduler in &self.schedulers {
            scheduler.stop().await;
        }
        info!("Gateway service stopped");
    }

    /// Whether the cleanup schedulers run.
    pub fn is_running(&self) -> bool {
        self.schedulers.iter().all(CleanupScheduler::is_running)
    }

    /// The gateway assembly; matched requests are forwarded into `backend`.
    ///
    /// Providers, selection, filters and error placement run in that order,
    /// so the error gateway of a failed check sees its status parameters.
    pub fn assembly(&self, backend: Assembly) -> Assembly {
        Assembly::new("gateway")
            .with(Contextual::shared(Arc::clone(&self.repository)))
            .with(Contextual::shared(Arc::clone(&self.authorized)))
            .with(Contextual::new(GatewaySelector::new()))
            .with(Contextual::new(GatewayFilter::new(
                Arc::clone(&self.fetcher),
                self.config.filter_cache(),
            )))
            .with(Contextual::new(ErrorPlacement::new()))
            .with(Brancher::new(GatewayForward::new()).branch(Routing::new(backend)))
    }
}

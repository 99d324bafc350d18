use crate::config::Config;
use crate::coordinator::RefreshCoordinator;
use crate::countries::COUNTRY_CODES;
use crate::geonames::GeoNamesClient;
use crate::lookup::CountryEnricher;
use crate::store::{CountryStore, LanguageStore, NeighbourStore};
use crate::timezone::TimezoneCache;
use crate::utils::fmt_duration;
use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application struct wiring the country stores, their refresh
/// coordinator and the lookup enricher.
pub struct App {
    config: Config,
    neighbours: Option<Arc<NeighbourStore>>,
    languages: Option<Arc<LanguageStore>>,
    enricher: Arc<CountryEnricher>,
    cancel: CancellationToken,
}

impl App {
    /// Build all components. Must be called inside a tokio runtime.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let (neighbours, languages) = match config.geonames_username() {
            Some(username) => {
                let client = GeoNamesClient::new(
                    &config.geonames_base_url,
                    username,
                    config.request_timeout,
                )
                .context("Failed to create GeoNames client")?;

                info!(
                    base_url = %client.base_url(),
                    countries = COUNTRY_CODES.len(),
                    request_delay = fmt_duration(config.request_delay),
                    request_timeout = fmt_duration(config.request_timeout),
                    "GeoNames client configured"
                );

                let neighbours: Arc<NeighbourStore> = Arc::new(CountryStore::new(
                    Some(client.clone()),
                    COUNTRY_CODES,
                    config.request_delay,
                ));
                let languages: Arc<LanguageStore> = Arc::new(CountryStore::new(
                    Some(client),
                    COUNTRY_CODES,
                    config.request_delay,
                ));
                (Some(neighbours), Some(languages))
            }
            None => {
                info!("GEONAMES_USERNAME not set; neighbours and languages are disabled");
                (None, None)
            }
        };

        let enricher = Arc::new(CountryEnricher::new(
            neighbours.clone(),
            languages.clone(),
            Arc::new(TimezoneCache::new()),
            config.cache_ttl,
        ));

        Ok(App {
            config,
            neighbours,
            languages,
            enricher,
            cancel: CancellationToken::new(),
        })
    }

    /// Shared enricher for the lookup path.
    pub fn enricher(&self) -> Arc<CountryEnricher> {
        self.enricher.clone()
    }

    /// Neighbours are refreshed before languages when both are due.
    fn coordinator(&self) -> RefreshCoordinator {
        let mut coordinator = RefreshCoordinator::new();
        if let Some(store) = &self.neighbours {
            coordinator = coordinator.with_job(store.clone(), self.config.neighbours_update_interval);
        }
        if let Some(store) = &self.languages {
            coordinator = coordinator.with_job(store.clone(), self.config.languages_update_interval);
        }
        coordinator
    }

    /// Run until a shutdown signal arrives, then stop the coordinator.
    pub async fn run(self) -> ExitCode {
        let handle = self.coordinator().start(self.cancel.clone());

        shutdown_signal().await;
        info!("Shutdown signal received");
        self.cancel.cancel();

        let Some(handle) = handle else {
            return ExitCode::SUCCESS;
        };
        match tokio::time::timeout(self.config.shutdown_timeout, handle).await {
            Ok(Ok(())) => {
                info!("Refresh coordinator shut down gracefully");
                ExitCode::SUCCESS
            }
            Ok(Err(e)) => {
                error!(error = ?e, "Refresh coordinator task failed");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(self.config.shutdown_timeout),
                    "Refresh coordinator did not stop in time, abandoning"
                );
                ExitCode::SUCCESS
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

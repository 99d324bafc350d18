//! Country-indexed store for one GeoNames dataset.
//!
//! Reads go straight to a [`DashMap`] and never wait on I/O. A refresh walks
//! the store's country list one request at a time, pausing between requests
//! to stay under the upstream's rate limit, and commits each country on its
//! own. A failed or empty response leaves that country's previous records in
//! place, so a bad cycle can only make data stale, never remove it.

use crate::coordinator::{RefreshSummary, Refreshable};
use crate::geonames::{Dataset, FetchError, GeoNamesClient, Languages, Neighbours};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause between upstream requests when none is configured.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1100);

pub type NeighbourStore = CountryStore<Neighbours>;
pub type LanguageStore = CountryStore<Languages>;

pub struct CountryStore<D: Dataset> {
    /// `None` when no GeoNames credential is configured; refreshes are then no-ops.
    upstream: Option<GeoNamesClient>,
    /// Deduplicated and sorted.
    countries: Vec<String>,
    delay: Duration,
    data: DashMap<String, Vec<D::Item>>,
}

impl<D: Dataset> CountryStore<D> {
    pub fn new<I, S>(upstream: Option<GeoNamesClient>, countries: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let countries: BTreeSet<String> = countries
            .into_iter()
            .map(|c| c.as_ref().trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            upstream,
            countries: countries.into_iter().collect(),
            delay,
            data: DashMap::new(),
        }
    }

    /// Records for `country`, or an empty list if none have been fetched.
    pub fn get(&self, country: &str) -> Vec<D::Item> {
        self.data
            .get(country)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.upstream.is_some()
    }

    /// Country codes refreshed by each cycle, in request order.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Number of countries with records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the records of one country in a single map write.
    pub(crate) fn commit(&self, country: &str, items: Vec<D::Item>) {
        self.data.insert(country.to_owned(), items);
    }

    /// Run one full pass over the country list.
    ///
    /// Per-country failures are logged and counted, never returned. The pass
    /// stops early once `cancel` fires.
    pub async fn refresh_all_once(&self, cancel: &CancellationToken) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let Some(upstream) = &self.upstream else {
            debug!(dataset = D::NAME, "No GeoNames credential, skipping refresh");
            return summary;
        };

        let start = Instant::now();
        for country in &self.countries {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            match upstream.fetch::<D>(country, cancel).await {
                Ok(items) => {
                    debug!(dataset = D::NAME, country = %country, records = items.len(), "Country refreshed");
                    self.commit(country, items);
                    summary.updated += 1;
                }
                Err(FetchError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(FetchError::Empty) => {
                    warn!(dataset = D::NAME, country = %country, "No records returned, keeping previous data");
                    summary.empty += 1;
                }
                Err(e) => {
                    warn!(dataset = D::NAME, country = %country, error = ?e, "Failed to refresh country");
                    summary.failed += 1;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                _ = time::sleep(self.delay) => {}
            }
        }
        summary.elapsed = start.elapsed();

        if summary.cancelled {
            info!(dataset = D::NAME, updated = summary.updated, "Refresh cancelled");
        }
        summary
    }
}

#[async_trait]
impl<D: Dataset> Refreshable for CountryStore<D> {
    fn name(&self) -> &str {
        D::NAME
    }

    fn is_enabled(&self) -> bool {
        CountryStore::is_enabled(self)
    }

    async fn refresh_all_once(&self, cancel: &CancellationToken) -> RefreshSummary {
        CountryStore::refresh_all_once(self, cancel).await
    }
}

//! Country enrichment attached to IP lookup responses.
//!
//! This is the only path request handlers use to reach the country stores.
//! It reads whatever the stores hold right now and never triggers a refresh.

use crate::cache::ExpiringCache;
use crate::countries::is_country_code;
use crate::geonames::Neighbour;
use crate::store::{LanguageStore, NeighbourStore};
use crate::timezone::TimezoneCache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Country-level fields added to a lookup response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbours: Vec<Neighbour>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// UTC offset of the record's time zone, in seconds.
    pub offset: i32,
}

/// Assembles [`Enrichment`]s and memoizes them for a short TTL, so fresh
/// store data becomes visible to callers within one TTL.
pub struct CountryEnricher {
    neighbours: Option<Arc<NeighbourStore>>,
    languages: Option<Arc<LanguageStore>>,
    timezones: Arc<TimezoneCache>,
    responses: ExpiringCache<Arc<Enrichment>>,
}

impl CountryEnricher {
    pub fn new(
        neighbours: Option<Arc<NeighbourStore>>,
        languages: Option<Arc<LanguageStore>>,
        timezones: Arc<TimezoneCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            neighbours,
            languages,
            timezones,
            responses: ExpiringCache::new(ttl),
        }
    }

    /// Enrichment for a record located in `country_code` and `timezone`.
    /// Either may be empty.
    pub fn enrich(&self, country_code: &str, timezone: &str) -> Arc<Enrichment> {
        let country = country_code.trim().to_ascii_uppercase();
        let key = format!("{country}|{timezone}");
        if let Some(cached) = self.responses.get(&key) {
            return cached;
        }

        let mut enrichment = Enrichment {
            offset: self.timezones.offset_seconds(timezone),
            ..Default::default()
        };
        if is_country_code(&country) {
            if let Some(store) = &self.neighbours {
                enrichment.neighbours = store.get(&country);
            }
            if let Some(store) = &self.languages {
                enrichment.languages = store.get(&country);
            }
        }

        let enrichment = Arc::new(enrichment);
        self.responses.set(key, enrichment.clone());
        enrichment
    }
}

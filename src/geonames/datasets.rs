//! Per-country datasets served by GeoNames and how their responses are parsed.

use crate::geonames::errors::FetchError;
use crate::geonames::json::parse_json_with_context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A country-indexed dataset: which endpoint serves it and how a response
/// body becomes a list of records.
pub trait Dataset: Send + Sync + 'static {
    type Item: Clone + fmt::Debug + Send + Sync + 'static;

    /// Short name used in logs.
    const NAME: &'static str;
    /// Path of the GeoNames endpoint, relative to the base URL.
    const ENDPOINT: &'static str;

    /// Parse a successful response body. Returns [`FetchError::Empty`] when
    /// the body is well-formed but holds no usable records.
    fn parse(body: &str) -> Result<Vec<Self::Item>, FetchError>;
}

/// Common GeoNames envelope: a `geonames` list, or a `status` object on error.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    geonames: Vec<T>,
    status: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: i64,
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<Vec<T>, FetchError> {
    let envelope: Envelope<T> = parse_json_with_context(body).map_err(FetchError::Parse)?;
    if let Some(status) = envelope.status {
        return Err(FetchError::Upstream {
            code: status.value,
            message: status.message,
        });
    }
    Ok(envelope.geonames)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A bordering country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbour {
    pub country_code: String,
    pub country_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNeighbour {
    country_code: Option<String>,
    country_name: Option<String>,
}

/// Bordering countries, from `neighboursJSON`.
#[derive(Debug)]
pub struct Neighbours;

impl Dataset for Neighbours {
    type Item = Neighbour;

    const NAME: &'static str = "neighbours";
    const ENDPOINT: &'static str = "neighboursJSON";

    fn parse(body: &str) -> Result<Vec<Neighbour>, FetchError> {
        let items: Vec<Neighbour> = decode::<RawNeighbour>(body)?
            .into_iter()
            .filter_map(|raw| {
                Some(Neighbour {
                    country_code: non_empty(raw.country_code)?,
                    country_name: non_empty(raw.country_name)?,
                })
            })
            .collect();

        if items.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct RawCountryInfo {
    languages: Option<String>,
}

/// Spoken language tags, from the `languages` field of `countryInfoJSON`.
#[derive(Debug)]
pub struct Languages;

impl Dataset for Languages {
    type Item = String;

    const NAME: &'static str = "languages";
    const ENDPOINT: &'static str = "countryInfoJSON";

    fn parse(body: &str) -> Result<Vec<String>, FetchError> {
        let info = decode::<RawCountryInfo>(body)?
            .into_iter()
            .next()
            .ok_or(FetchError::Empty)?;

        let languages = split_language_tags(info.languages.as_deref().unwrap_or(""));
        if languages.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(languages)
    }
}

/// Split a comma-separated tag list, trimming segments, dropping empty ones
/// and removing exact duplicates while keeping first-seen order.
///
/// Tags are not normalized: `pt` and `pt-BR` stay distinct.
pub fn split_language_tags(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(*tag))
        .map(str::to_owned)
        .collect()
}

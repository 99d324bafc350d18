//! UTC offset lookup for IANA time zone names.

use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;

/// Parsed zones, kept for the life of the cache since zone rules never
/// change at runtime. Unknown names are not cached.
#[derive(Debug, Default)]
pub struct TimezoneCache {
    zones: DashMap<String, Tz>,
}

impl TimezoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset from UTC in seconds for `name` right now. Empty or unknown
    /// zones yield 0.
    pub fn offset_seconds(&self, name: &str) -> i32 {
        self.offset_seconds_at(name, Utc::now())
    }

    pub fn offset_seconds_at(&self, name: &str, at: DateTime<Utc>) -> i32 {
        self.resolve(name)
            .map(|tz| at.with_timezone(&tz).offset().fix().local_minus_utc())
            .unwrap_or(0)
    }

    fn resolve(&self, name: &str) -> Option<Tz> {
        if name.is_empty() {
            return None;
        }
        if let Some(tz) = self.zones.get(name) {
            return Some(*tz);
        }
        let tz: Tz = name.parse().ok()?;
        self.zones.insert(name.to_owned(), tz);
        Some(tz)
    }

    /// Number of zones parsed so far.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

use bytes::Bytes;
use time::OffsetDateTime;

use super::control::{CacheControl, Freshness};

/// Last successfully filtered calendar for one feed plus its expiration metadata.
///
/// The buffer and the expiration are only ever replaced together.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    expiration: Option<CacheControl>,
    buffer: Bytes,
}

/// A cached body with freshness evaluated at serve time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCalendar {
    pub body: Bytes,
    pub max_age: i64,
    pub age: i64,
}

impl CacheEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_populated(&self) -> bool {
        self.expiration.is_some()
    }

    pub fn freshness_at(&self, now: OffsetDateTime) -> Freshness {
        self.expiration
            .as_ref()
            .map_or(Freshness::ABSENT, |control| control.evaluate_at(now))
    }

    pub fn needs_refresh_at(&self, now: OffsetDateTime) -> bool {
        self.freshness_at(now).needs_refresh()
    }

    pub fn replace(&mut self, buffer: Bytes, expiration: CacheControl) {
        self.buffer = buffer;
        self.expiration = Some(expiration);
    }

    /// Cached body and live freshness, or `None` when nothing was ever cached.
    pub fn snapshot_at(&self, now: OffsetDateTime) -> Option<CachedCalendar> {
        let control = self.expiration.as_ref()?;
        let freshness = control.evaluate_at(now);

        Some(CachedCalendar {
            body: self.buffer.clone(),
            max_age: freshness.max_age,
            age: freshness.age,
        })
    }
}

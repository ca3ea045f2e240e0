//! Per-feed pipeline: fetch, filter, cache and serve one configured calendar.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cache::{CacheControl, CacheEntry, CacheHeaderError, CachedCalendar},
    domain::rules::RuleSet,
};

use super::{
    error::error_chain,
    filter::{FilterError, filter_calendar},
    origin::{FetchError, OriginClient},
};

pub const METRIC_ORIGIN_FETCH_TOTAL: &str = "ical_proxy_origin_fetch_total";
pub const METRIC_REFRESH_SKIPPED_TOTAL: &str = "ical_proxy_refresh_skipped_total";
pub const METRIC_LINES_DROPPED_TOTAL: &str = "ical_proxy_lines_dropped_total";
pub const METRIC_SERVE_MISS_TOTAL: &str = "ical_proxy_serve_miss_total";

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("origin body could not be filtered")]
    Filter(#[from] FilterError),
    #[error("origin cache headers are malformed")]
    CacheHeaders(#[from] CacheHeaderError),
}

/// One configured calendar and its exclusively owned cache entry.
///
/// Every request holds the feed lock for the whole refresh and serve sequence, so at most one
/// origin fetch per feed is in flight and readers never see a half-updated entry.
pub struct CalendarFeed {
    path: String,
    origin: Url,
    rules: RuleSet,
    client: Arc<dyn OriginClient>,
    cache: Mutex<CacheEntry>,
}

impl CalendarFeed {
    pub fn new(
        path: impl Into<String>,
        origin: Url,
        rules: RuleSet,
        client: Arc<dyn OriginClient>,
    ) -> Self {
        Self {
            path: path.into(),
            origin,
            rules,
            client,
            cache: Mutex::new(CacheEntry::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Refresh if due and return the cached calendar, or `None` when nothing was ever cached.
    pub async fn serve(&self) -> Option<CachedCalendar> {
        self.serve_with(OffsetDateTime::now_utc).await
    }

    /// [`serve`](Self::serve) against an explicit clock.
    ///
    /// The clock is read when deciding whether to refresh, again once the origin has answered
    /// (the default `Date` of the response), and again when the snapshot is taken, so the
    /// served age includes the time spent waiting for the lock and the origin.
    pub async fn serve_with<C>(&self, clock: C) -> Option<CachedCalendar>
    where
        C: Fn() -> OffsetDateTime + Send + Sync,
    {
        let mut entry = self.cache.lock().await;

        if entry.needs_refresh_at(clock()) {
            match self.refresh(&clock).await {
                Ok((body, control)) => {
                    info!(
                        target = "ical_proxy::calendar",
                        path = %self.path,
                        origin = %self.origin,
                        max_age = control.max_age(),
                        age = control.age(),
                        "calendar refreshed"
                    );
                    entry.replace(body, control);
                }
                Err(error) => {
                    warn!(
                        target = "ical_proxy::calendar",
                        path = %self.path,
                        origin = %self.origin,
                        error = %error_chain(&error),
                        stale = entry.is_populated(),
                        "calendar refresh failed"
                    );
                }
            }
        } else {
            counter!(METRIC_REFRESH_SKIPPED_TOTAL, "path" => self.path.clone()).increment(1);
            debug!(
                target = "ical_proxy::calendar",
                path = %self.path,
                "cached calendar still fresh"
            );
        }

        let snapshot = entry.snapshot_at(clock());
        if snapshot.is_none() {
            counter!(METRIC_SERVE_MISS_TOTAL, "path" => self.path.clone()).increment(1);
        }
        snapshot
    }

    async fn refresh<C>(&self, clock: &C) -> Result<(Bytes, CacheControl), RefreshError>
    where
        C: Fn() -> OffsetDateTime + Sync,
    {
        debug!(
            target = "ical_proxy::calendar",
            path = %self.path,
            origin = %self.origin,
            "fetching origin calendar"
        );

        let response = match self.client.fetch(&self.origin).await {
            Ok(response) => {
                counter!(METRIC_ORIGIN_FETCH_TOTAL, "outcome" => "success").increment(1);
                response
            }
            Err(error) => {
                counter!(METRIC_ORIGIN_FETCH_TOTAL, "outcome" => error.outcome()).increment(1);
                return Err(error.into());
            }
        };
        let control = CacheControl::from_headers(&response.headers, clock())?;

        let mut body = Vec::with_capacity(response.body.len());
        let stats = filter_calendar(response.body.as_ref(), &mut body, &self.rules)?;
        counter!(METRIC_LINES_DROPPED_TOTAL, "path" => self.path.clone())
            .increment(stats.dropped as u64);
        debug!(
            target = "ical_proxy::calendar",
            path = %self.path,
            kept = stats.kept,
            dropped = stats.dropped,
            "calendar filtered"
        );

        Ok((Bytes::from(body), control))
    }
}

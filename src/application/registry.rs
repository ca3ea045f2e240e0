use std::sync::Arc;

use tracing::info;

use crate::config::CalendarSettings;

use super::{calendar::CalendarFeed, origin::OriginClient};

/// Every configured feed, ordered by request path.
#[derive(Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<Arc<CalendarFeed>>,
}

impl FeedRegistry {
    pub fn new(feeds: Vec<Arc<CalendarFeed>>) -> Self {
        Self { feeds }
    }

    /// Build one feed per validated calendar, all sharing the same origin client.
    pub fn from_settings(calendars: &[CalendarSettings], client: Arc<dyn OriginClient>) -> Self {
        let feeds = calendars
            .iter()
            .map(|calendar| {
                info!(
                    target = "ical_proxy::registry",
                    path = %calendar.path,
                    origin = %calendar.origin,
                    rules = calendar.rules.len(),
                    "calendar registered"
                );
                Arc::new(CalendarFeed::new(
                    calendar.path.clone(),
                    calendar.origin.clone(),
                    calendar.rules.clone(),
                    Arc::clone(&client),
                ))
            })
            .collect();

        Self::new(feeds)
    }

    pub fn feeds(&self) -> &[Arc<CalendarFeed>] {
        &self.feeds
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

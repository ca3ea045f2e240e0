//! Expiration metadata derived from origin response headers.

use axum::http::{
    HeaderMap,
    header::{AGE, CACHE_CONTROL, DATE},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
use tracing::warn;

/// Lifetime assumed when the origin sends no `max-age` directive.
pub const DEFAULT_MAX_AGE: i64 = 3600;

const MAX_AGE_DIRECTIVE: &str = "max-age";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheHeaderError {
    #[error("invalid `max-age` directive value `{value}`: expected integer seconds")]
    InvalidMaxAge { value: String },
    #[error("invalid `Age` header `{value}`: expected integer seconds")]
    InvalidAge { value: String },
}

/// Freshness of a cached response at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub max_age: i64,
    pub age: i64,
    pub valid: bool,
}

impl Freshness {
    /// Freshness reported when nothing has been cached yet.
    pub const ABSENT: Freshness = Freshness {
        max_age: 0,
        age: 0,
        valid: false,
    };

    /// Refresh once half of the declared lifetime has elapsed, or when already stale.
    pub fn needs_refresh(&self) -> bool {
        !self.valid || self.age >= self.max_age / 2
    }
}

/// `Date`, `max-age` and `Age` as received with the most recent origin response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    date: OffsetDateTime,
    max_age: i64,
    age: i64,
}

impl CacheControl {
    pub fn new(date: OffsetDateTime, max_age: i64, age: i64) -> Self {
        Self { date, max_age, age }
    }

    /// Derive expiration metadata from response headers received at `now`.
    ///
    /// A missing or unparsable `Date` falls back to `now`. A malformed `max-age` or `Age`
    /// fails the whole computation.
    pub fn from_headers(headers: &HeaderMap, now: OffsetDateTime) -> Result<Self, CacheHeaderError> {
        let date = parse_date(headers).unwrap_or(now);
        let max_age = parse_max_age(headers)?.unwrap_or(DEFAULT_MAX_AGE);
        let age = parse_age(headers)?.unwrap_or(0);

        Ok(Self { date, max_age, age })
    }

    pub fn date(&self) -> OffsetDateTime {
        self.date
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn age(&self) -> i64 {
        self.age
    }

    /// Evaluate against the current wall clock.
    pub fn evaluate(&self) -> Freshness {
        self.evaluate_at(OffsetDateTime::now_utc())
    }

    pub fn evaluate_at(&self, now: OffsetDateTime) -> Freshness {
        let elapsed = (now - self.date).whole_seconds();
        let age = elapsed.saturating_add(self.age);

        Freshness {
            max_age: self.max_age,
            age,
            valid: age < self.max_age,
        }
    }
}

fn parse_date(headers: &HeaderMap) -> Option<OffsetDateTime> {
    let raw = headers.get(DATE)?;
    let parsed = raw
        .to_str()
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| OffsetDateTime::parse(value, &Rfc2822));

    match parsed {
        Some(Ok(date)) => Some(date),
        None if raw.is_empty() => None,
        Some(Err(err)) => {
            warn!(
                target = "ical_proxy::cache",
                date = ?raw,
                error = %err,
                "ignoring malformed Date header"
            );
            None
        }
        None => {
            warn!(
                target = "ical_proxy::cache",
                date = ?raw,
                "ignoring non-ASCII Date header"
            );
            None
        }
    }
}

/// The last well-formed `max-age=N` directive across all `Cache-Control` fields.
fn parse_max_age(headers: &HeaderMap) -> Result<Option<i64>, CacheHeaderError> {
    let mut max_age = None;

    for field in headers.get_all(CACHE_CONTROL) {
        let Ok(field) = field.to_str() else {
            continue;
        };

        for directive in field.split(',') {
            let Some((name, value)) = directive.trim().split_once('=') else {
                continue;
            };
            if !name.eq_ignore_ascii_case(MAX_AGE_DIRECTIVE) {
                continue;
            }

            let seconds = value
                .parse::<i64>()
                .map_err(|_| CacheHeaderError::InvalidMaxAge {
                    value: value.to_string(),
                })?;
            max_age = Some(seconds);
        }
    }

    Ok(max_age)
}

fn parse_age(headers: &HeaderMap) -> Result<Option<i64>, CacheHeaderError> {
    let Some(raw) = headers.get(AGE) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }

    raw.to_str()
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| CacheHeaderError::InvalidAge {
            value: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
        })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use time::{Duration, macros::datetime};

    use super::*;

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00:00 UTC);

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn defaults_apply_without_headers() {
        let control = CacheControl::from_headers(&HeaderMap::new(), NOW).unwrap();
        assert_eq!(control, CacheControl::new(NOW, DEFAULT_MAX_AGE, 0));
    }

    #[test]
    fn reads_date_max_age_and_age() {
        let control = CacheControl::from_headers(
            &headers(&[
                ("date", "Fri, 01 Mar 2024 11:59:00 GMT"),
                ("cache-control", "public, max-age=600"),
                ("age", "30"),
            ]),
            NOW,
        )
        .unwrap();

        assert_eq!(control.date(), datetime!(2024-03-01 11:59:00 UTC));
        assert_eq!(control.max_age(), 600);
        assert_eq!(control.age(), 30);
    }

    #[test]
    fn last_max_age_wins_across_fields() {
        let control = CacheControl::from_headers(
            &headers(&[
                ("cache-control", "max-age=10, no-transform, max-age=20"),
                ("cache-control", "max-age=30"),
            ]),
            NOW,
        )
        .unwrap();
        assert_eq!(control.max_age(), 30);

        let bare = CacheControl::from_headers(&headers(&[("cache-control", "max-age")]), NOW);
        assert_eq!(bare.unwrap().max_age(), DEFAULT_MAX_AGE);
    }

    #[test]
    fn malformed_max_age_or_age_fails() {
        assert_eq!(
            CacheControl::from_headers(&headers(&[("cache-control", "max-age=soon")]), NOW),
            Err(CacheHeaderError::InvalidMaxAge {
                value: "soon".to_string()
            })
        );
        assert_eq!(
            CacheControl::from_headers(&headers(&[("age", "old")]), NOW),
            Err(CacheHeaderError::InvalidAge {
                value: "old".to_string()
            })
        );
    }

    #[test]
    fn malformed_date_falls_back_to_now() {
        let control =
            CacheControl::from_headers(&headers(&[("date", "yesterday-ish")]), NOW).unwrap();
        assert_eq!(control.date(), NOW);
    }

    #[test]
    fn freshness_grows_with_elapsed_time() {
        let control = CacheControl::new(NOW, 3600, 0);
        assert_eq!(
            control.evaluate_at(NOW),
            Freshness {
                max_age: 3600,
                age: 0,
                valid: true
            }
        );

        let later = control.evaluate_at(NOW + Duration::seconds(3599));
        assert!(later.valid);
        assert_eq!(later.age, 3599);

        let expired = control.evaluate_at(NOW + Duration::seconds(3600));
        assert!(!expired.valid);
    }

    #[test]
    fn origin_age_is_added_to_elapsed_time() {
        let control = CacheControl::new(NOW, 100, 40);
        assert_eq!(control.evaluate_at(NOW + Duration::seconds(10)).age, 50);
    }

    #[test]
    fn refresh_starts_at_half_life() {
        let control = CacheControl::new(NOW, 3600, 0);
        assert!(!control.evaluate_at(NOW + Duration::seconds(1799)).needs_refresh());
        assert!(control.evaluate_at(NOW + Duration::seconds(1800)).needs_refresh());
        assert!(Freshness::ABSENT.needs_refresh());
    }

    #[test]
    fn live_evaluation_uses_the_wall_clock() {
        let control = CacheControl::new(OffsetDateTime::now_utc() - Duration::seconds(5), 60, 0);
        let freshness = control.evaluate();
        assert!(freshness.age >= 5);
        assert!(freshness.valid);
    }
}

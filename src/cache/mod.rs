//! Freshness cache for filtered calendars.
//!
//! Each feed owns one [`CacheEntry`] holding the last filtered body and the
//! [`CacheControl`] metadata of the origin response it came from. Freshness is
//! recomputed on every evaluation:
//!
//! - `age` is the time elapsed since the origin `Date` plus the origin `Age`
//! - the entry is valid while `age < max_age`
//! - a refresh is due once `age >= max_age / 2`, or when nothing is cached yet
//!
//! A stale entry keeps being served until a refresh succeeds.

mod control;
mod entry;

pub use control::{CacheControl, CacheHeaderError, DEFAULT_MAX_AGE, Freshness};
pub use entry::{CacheEntry, CachedCalendar};

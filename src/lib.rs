//! Filtering proxy for iCalendar feeds.
//!
//! Each configured calendar is fetched from its origin, stripped of the content lines its
//! rules match, cached according to the origin's freshness headers and re-served over HTTP.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

//! Application services: the per-feed calendar pipeline and its seams.

pub mod calendar;
pub mod error;
pub mod filter;
pub mod origin;
pub mod registry;

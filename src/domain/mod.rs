//! Domain layer types and invariants.

pub mod ical;
pub mod rules;

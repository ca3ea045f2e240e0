//! Line-removal rules: scopes select parts of a content line, patterns test them.
//!
//! A [`MatchRule`] holds when its pattern matches every byte sequence its scope resolves to,
//! which includes the case where the scope resolves to nothing. A [`Rule`] is the conjunction
//! of its match rules and a [`RuleSet`] drops a line when any of its rules holds.

mod matcher;
mod scope;
mod spec;

pub use matcher::{MatchRule, Rule, RuleSet};
pub use scope::Scope;
pub use spec::{MatchSpec, RuleSpec};

use thiserror::Error;

/// Rule configuration problems, reported once when feeds are built.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown scope `{0}`: expected `name`, `value` or `param:<NAME>`")]
    UnknownScope(String),
    #[error("scope `param:` requires a parameter name")]
    EmptyParamName,
    #[error("invalid pattern `{pattern}` for scope `{scope}`: {source}")]
    InvalidPattern {
        scope: Scope,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

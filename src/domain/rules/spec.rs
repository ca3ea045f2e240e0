use serde::Deserialize;

/// One `{ scope, pattern }` pair as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchSpec {
    pub scope: String,
    pub pattern: String,
}

/// A list of match specifications that must all hold for a line to be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(rename = "match", default)]
    pub matchers: Vec<MatchSpec>,
}

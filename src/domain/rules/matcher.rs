use regex::bytes::Regex;

use crate::domain::ical::ContentLine;

use super::{MatchSpec, RuleError, RuleSpec, Scope};

/// A scope paired with the pattern its resolved values must satisfy.
#[derive(Debug, Clone)]
pub struct MatchRule {
    scope: Scope,
    pattern: Regex,
}

impl MatchRule {
    pub fn new(scope: Scope, pattern: Regex) -> Self {
        Self { scope, pattern }
    }

    pub fn compile(spec: &MatchSpec) -> Result<Self, RuleError> {
        let scope: Scope = spec.scope.parse()?;
        let pattern = Regex::new(&spec.pattern).map_err(|source| RuleError::InvalidPattern {
            scope: scope.clone(),
            pattern: spec.pattern.clone(),
            source,
        })?;
        Ok(Self::new(scope, pattern))
    }

    /// True when the pattern matches every resolved value, and vacuously when there are none.
    pub fn matches(&self, line: &ContentLine<'_>) -> bool {
        self.scope
            .resolve(line)
            .into_iter()
            .all(|value| self.pattern.is_match(value))
    }
}

/// Conjunction of match rules. An empty rule matches every line.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    matchers: Vec<MatchRule>,
}

impl Rule {
    pub fn new(matchers: Vec<MatchRule>) -> Self {
        Self { matchers }
    }

    pub fn compile(spec: &RuleSpec) -> Result<Self, RuleError> {
        spec.matchers
            .iter()
            .map(MatchRule::compile)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn matches(&self, line: &ContentLine<'_>) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(line))
    }
}

/// The rules configured for one feed; a line is dropped when any of them matches.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn compile(specs: &[RuleSpec]) -> Result<Self, RuleError> {
        specs
            .iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn should_drop(&self, line: &ContentLine<'_>) -> bool {
        self.rules.iter().any(|rule| rule.matches(line))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

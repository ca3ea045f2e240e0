use std::{fmt, str::FromStr};

use crate::domain::ical::ContentLine;

use super::RuleError;

const NAME: &str = "name";
const VALUE: &str = "value";
const PARAM_PREFIX: &str = "param:";

/// The part of a content line a rule inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Name,
    Value,
    /// Values of every parameter with exactly this (case-sensitive) name.
    Param(Vec<u8>),
}

impl Scope {
    /// Borrow the byte sequences this scope addresses in `line`.
    ///
    /// Repeated parameters contribute each of their values; an absent parameter yields nothing.
    pub fn resolve<'a>(&self, line: &ContentLine<'a>) -> Vec<&'a [u8]> {
        match self {
            Scope::Name => vec![line.name],
            Scope::Value => vec![line.value],
            Scope::Param(name) => line
                .params
                .iter()
                .filter(|param| param.name == name.as_slice())
                .flat_map(|param| param.values.iter().copied())
                .collect(),
        }
    }
}

impl FromStr for Scope {
    type Err = RuleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            NAME => Ok(Scope::Name),
            VALUE => Ok(Scope::Value),
            _ => match raw.strip_prefix(PARAM_PREFIX) {
                Some("") => Err(RuleError::EmptyParamName),
                Some(name) => Ok(Scope::Param(name.as_bytes().to_vec())),
                None => Err(RuleError::UnknownScope(raw.to_string())),
            },
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Name => f.write_str(NAME),
            Scope::Value => f.write_str(VALUE),
            Scope::Param(name) => write!(f, "{PARAM_PREFIX}{}", String::from_utf8_lossy(name)),
        }
    }
}

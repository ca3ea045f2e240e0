//! Decode, filter and re-encode one calendar body.

use std::io::{BufRead, Write};

use thiserror::Error;

use crate::domain::{
    ical::{ContentLineReader, ContentLineWriter, DecodeError, EncodeError},
    rules::RuleSet,
};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Line counts of one filtering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Copy every content line of `input` to `output` unless a rule in `rules` drops it.
///
/// Kept lines are re-serialized and re-folded; dropped lines are removed whole. Nothing is
/// written past the first malformed line.
pub fn filter_calendar<R, W>(input: R, output: W, rules: &RuleSet) -> Result<FilterStats, FilterError>
where
    R: BufRead,
    W: Write,
{
    let mut reader = ContentLineReader::new(input);
    let mut writer = ContentLineWriter::new(output);
    let mut stats = FilterStats::default();

    while let Some(line) = reader.read()? {
        if rules.should_drop(&line) {
            stats.dropped += 1;
            continue;
        }
        writer.write(&line)?;
        stats.kept += 1;
    }

    writer.into_inner().flush().map_err(EncodeError::from)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use crate::domain::rules::{MatchSpec, RuleSpec};

    use super::*;

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\n\
        VERSION:2.0\r\n\
        BEGIN:VEVENT\r\n\
        SUMMARY:Team sync\r\n\
        DESCRIPTION;LANGUAGE=en:Weekly\r\n\
        X-SECRET;X-VIS=private:hidden\r\n\
        END:VEVENT\r\n\
        END:VCALENDAR\r\n";

    fn rules(specs: &[&[(&str, &str)]]) -> RuleSet {
        let specs: Vec<RuleSpec> = specs
            .iter()
            .map(|matchers| RuleSpec {
                matchers: matchers
                    .iter()
                    .map(|(scope, pattern)| MatchSpec {
                        scope: scope.to_string(),
                        pattern: pattern.to_string(),
                    })
                    .collect(),
            })
            .collect();
        RuleSet::compile(&specs).expect("valid rules")
    }

    fn run(input: &str, rules: &RuleSet) -> (String, FilterStats) {
        let mut out = Vec::new();
        let stats = filter_calendar(input.as_bytes(), &mut out, rules).expect("filterable");
        (String::from_utf8(out).expect("utf8"), stats)
    }

    #[test]
    fn without_rules_the_calendar_is_unchanged() {
        let (out, stats) = run(CALENDAR, &RuleSet::default());
        assert_eq!(out, CALENDAR);
        assert_eq!(stats, FilterStats { kept: 8, dropped: 0 });
    }

    #[test]
    fn drops_lines_matched_by_any_rule() {
        let rules = rules(&[
            &[("name", "^DESCRIPTION$")],
            &[("param:X-VIS", "^private$"), ("name", "^X-")],
        ]);
        let (out, stats) = run(CALENDAR, &rules);

        assert!(!out.contains("DESCRIPTION"));
        assert!(!out.contains("X-SECRET"));
        assert!(out.contains("SUMMARY:Team sync\r\n"));
        assert_eq!(stats, FilterStats { kept: 6, dropped: 2 });
    }

    #[test]
    fn absent_parameter_makes_the_match_vacuous() {
        // Every line lacks LANGUAGE except DESCRIPTION, whose value is not "fr".
        let rules = rules(&[&[("param:LANGUAGE", "^fr$")]]);
        let (out, stats) = run(CALENDAR, &rules);

        assert_eq!(out, "DESCRIPTION;LANGUAGE=en:Weekly\r\n");
        assert_eq!(stats, FilterStats { kept: 1, dropped: 7 });
    }

    #[test]
    fn kept_lines_are_refolded() {
        let summary = format!("SUMMARY:{}", "y".repeat(80));
        let input = format!("{}\r\n {}\r\n", &summary[..40], &summary[40..]);
        let (out, _) = run(&input, &RuleSet::default());

        assert_eq!(out, format!("{}\r\n {}\r\n", &summary[..75], &summary[75..]));
    }

    #[test]
    fn malformed_line_aborts_filtering() {
        let mut out = Vec::new();
        let err = filter_calendar(&b"BEGIN:VCALENDAR\r\nNOPE\r\n"[..], &mut out, &RuleSet::default())
            .expect_err("grammar error");
        assert!(matches!(
            err,
            FilterError::Decode(DecodeError::Grammar { line: 2, .. })
        ));
    }
}

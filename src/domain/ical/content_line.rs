//! Structured view of one unfolded content line.
//!
//! A line has the shape `NAME *(";" PARAM-NAME "=" PARAM-VALUE *("," PARAM-VALUE)) ":" VALUE`
//! and is parsed by a byte-level state machine. Parsed lines borrow from the input buffer;
//! parameter values keep their surrounding quotes so that serialization reproduces the
//! original bytes exactly.
//!
//! The value itself may not contain `;`, `:` or `,`. Real-world value types such as URIs
//! are therefore rejected; this is a known limitation of the accepted grammar. The name, on
//! the other hand, may be empty: `:value` is a valid line.

use super::chars::{COLON, COMMA, CharClass, DQUOTE, EQUALS, SEMICOLON};
use super::error::GrammarError;

/// A named parameter with its comma-separated values in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Param<'a> {
    pub name: &'a [u8],
    pub values: Vec<&'a [u8]>,
}

/// One logical content line. Parameters keep insertion order and are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentLine<'a> {
    pub name: &'a [u8],
    pub params: Vec<Param<'a>>,
    pub value: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Name,
    ParamName,
    ParamValueAny,
    ParamValueQuoted,
    ParamValueUnquoted,
    Value,
}

/// Effect of feeding one byte to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Stay,
    Reject(CharClass),
    CloseName(State),
    OpenParam,
    EnterQuote,
    LeaveQuote,
    CloseParamValue(State),
}

impl State {
    /// Transition table. `at_span_start` is true when `b` is the first byte of the current span.
    fn on(self, b: u8, at_span_start: bool) -> Transition {
        match self {
            State::Name => match b {
                SEMICOLON => Transition::CloseName(State::ParamName),
                COLON => Transition::CloseName(State::Value),
                _ => expect(CharClass::NameChar, b),
            },
            State::ParamName => match b {
                EQUALS => Transition::OpenParam,
                _ => Transition::Stay,
            },
            State::ParamValueAny => match b {
                DQUOTE if at_span_start => Transition::EnterQuote,
                _ => match after_delimiter(b) {
                    Some(next) => Transition::CloseParamValue(next),
                    None => expect(CharClass::SafeChar, b),
                },
            },
            State::ParamValueQuoted => match b {
                DQUOTE => Transition::LeaveQuote,
                _ => expect(CharClass::QuoteSafeChar, b),
            },
            State::ParamValueUnquoted => match after_delimiter(b) {
                Some(next) => Transition::CloseParamValue(next),
                None => Transition::Reject(CharClass::Delimiter),
            },
            State::Value => expect(CharClass::ValueChar, b),
        }
    }
}

fn expect(class: CharClass, b: u8) -> Transition {
    if class.accepts(b) {
        Transition::Stay
    } else {
        Transition::Reject(class)
    }
}

fn after_delimiter(b: u8) -> Option<State> {
    match b {
        SEMICOLON => Some(State::ParamName),
        COLON => Some(State::Value),
        COMMA => Some(State::ParamValueAny),
        _ => None,
    }
}

impl<'a> ContentLine<'a> {
    /// Parse one unfolded line (without its line break).
    pub fn parse(line: &'a [u8]) -> Result<Self, GrammarError> {
        let mut parsed = ContentLine::default();
        let mut state = State::Name;
        let mut offset = 0;

        for (i, &b) in line.iter().enumerate() {
            match state.on(b, i == offset) {
                Transition::Stay => {}
                Transition::Reject(expected) => {
                    return Err(GrammarError::UnexpectedCharacter {
                        byte: b,
                        offset: i,
                        expected,
                    });
                }
                Transition::CloseName(next) => {
                    parsed.name = &line[offset..i];
                    offset = i + 1;
                    state = next;
                }
                Transition::OpenParam => {
                    parsed.params.push(Param {
                        name: &line[offset..i],
                        values: Vec::new(),
                    });
                    offset = i + 1;
                    state = State::ParamValueAny;
                }
                Transition::EnterQuote => state = State::ParamValueQuoted,
                Transition::LeaveQuote => state = State::ParamValueUnquoted,
                Transition::CloseParamValue(next) => {
                    if let Some(param) = parsed.params.last_mut() {
                        param.values.push(&line[offset..i]);
                    }
                    offset = i + 1;
                    state = next;
                }
            }
        }

        if state != State::Value {
            return Err(GrammarError::UnexpectedEndOfLine);
        }

        parsed.value = &line[offset..];
        Ok(parsed)
    }

    /// Append the canonical single-line form. Values are written exactly as captured.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.name);

        for param in &self.params {
            out.push(SEMICOLON);
            out.extend_from_slice(param.name);
            out.push(EQUALS);

            for (i, value) in param.values.iter().enumerate() {
                if i > 0 {
                    out.push(COMMA);
                }
                out.extend_from_slice(value);
            }
        }

        out.push(COLON);
        out.extend_from_slice(self.value);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

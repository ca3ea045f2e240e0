//! Character classes of the content-line grammar.

use std::fmt;

pub(crate) const SPACE: u8 = b' ';
pub(crate) const HTAB: u8 = b'\t';
pub(crate) const DQUOTE: u8 = b'"';
pub(crate) const SEMICOLON: u8 = b';';
pub(crate) const COLON: u8 = b':';
pub(crate) const COMMA: u8 = b',';
pub(crate) const EQUALS: u8 = b'=';

/// The class of byte a parser state was willing to accept, reported verbatim in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Letters, digits and `-`.
    NameChar,
    /// Any non-control byte except `"`, `;`, `:` and `,`.
    SafeChar,
    /// Any non-control byte except `"`.
    QuoteSafeChar,
    /// Any non-control byte except `;`, `:` and `,`.
    ValueChar,
    /// One of `;`, `:` or `,` directly after a closing quote.
    Delimiter,
}

impl CharClass {
    pub fn as_str(self) -> &'static str {
        match self {
            CharClass::NameChar => "NAME-CHAR",
            CharClass::SafeChar => "SAFE-CHAR",
            CharClass::QuoteSafeChar => "QSAFE-CHAR",
            CharClass::ValueChar => "VALUE-CHAR",
            CharClass::Delimiter => r#"";", ":" or ",""#,
        }
    }

    pub fn accepts(self, b: u8) -> bool {
        match self {
            CharClass::NameChar => is_name_char(b),
            CharClass::SafeChar => is_safe_char(b),
            CharClass::QuoteSafeChar => is_quote_safe_char(b),
            CharClass::ValueChar => is_value_char(b),
            CharClass::Delimiter => is_delimiter(b),
        }
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation marker at the start of a folded physical line.
pub(crate) fn is_whitespace(b: u8) -> bool {
    b == SPACE || b == HTAB
}

/// Control characters other than horizontal tab.
pub(crate) fn is_control(b: u8) -> bool {
    b <= 0x08 || (0x0a..=0x1f).contains(&b) || b == 0x7f
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    b == SEMICOLON || b == COLON || b == COMMA
}

pub(crate) fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

pub(crate) fn is_quote_safe_char(b: u8) -> bool {
    !is_control(b) && b != DQUOTE
}

pub(crate) fn is_safe_char(b: u8) -> bool {
    is_quote_safe_char(b) && !is_delimiter(b)
}

pub(crate) fn is_value_char(b: u8) -> bool {
    !is_control(b) && !is_delimiter(b)
}

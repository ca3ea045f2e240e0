use std::io;

use thiserror::Error;

use super::chars::CharClass;

/// Violations of the content-line grammar.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("unexpected character 0x{byte:02x} at offset {offset}: expected {expected}")]
    UnexpectedCharacter {
        byte: u8,
        offset: usize,
        expected: CharClass,
    },
    #[error("unexpected end of line: value delimiter `:` never seen")]
    UnexpectedEndOfLine,
}

/// Failures while turning a folded byte stream into content lines.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("content line exceeds {limit} bytes after unfolding")]
    LineTooLong { limit: usize },
    #[error("malformed content line {line}")]
    Grammar {
        /// One-based index of the logical line within the stream.
        line: usize,
        #[source]
        source: GrammarError,
    },
    #[error("failed to read calendar stream: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to write calendar stream: {0}")]
    Io(#[from] io::Error),
}

use std::io::{BufRead, Write};

use super::content_line::ContentLine;
use super::error::{DecodeError, EncodeError};
use super::folding::{Unfolder, fold_line};

/// Reads structured content lines from a folded byte stream.
#[derive(Debug)]
pub struct ContentLineReader<R> {
    unfolder: Unfolder<R>,
    line_number: usize,
}

impl<R: BufRead> ContentLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            unfolder: Unfolder::new(reader),
            line_number: 0,
        }
    }

    /// Next content line, borrowing the reader's buffer until the following call.
    pub fn read(&mut self) -> Result<Option<ContentLine<'_>>, DecodeError> {
        let Some(raw) = self.unfolder.next_line()? else {
            return Ok(None);
        };
        self.line_number += 1;
        let line = self.line_number;

        ContentLine::parse(raw)
            .map(Some)
            .map_err(|source| DecodeError::Grammar { line, source })
    }

    /// Number of logical lines read so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Serializes content lines and folds them onto the output.
#[derive(Debug)]
pub struct ContentLineWriter<W> {
    writer: W,
    scratch: Vec<u8>,
}

impl<W: Write> ContentLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: Vec::new(),
        }
    }

    pub fn write(&mut self, line: &ContentLine<'_>) -> Result<(), EncodeError> {
        self.scratch.clear();
        line.write_to(&mut self.scratch);
        fold_line(&mut self.writer, &self.scratch)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

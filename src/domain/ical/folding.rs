//! Line folding for the calendar wire format.
//!
//! Physical lines end with CRLF (a bare LF is tolerated). A physical line starting with a
//! single space or horizontal tab continues the previous logical line: the whitespace byte is
//! dropped and the rest is appended without a separator. On output, logical lines are split
//! into segments of at most [`FOLD_WIDTH`] octets; continuation segments are prefixed with one
//! space. Folding is byte-oriented, so a multi-byte UTF-8 sequence may straddle two segments.

use std::io::{self, BufRead, Write};

use super::chars::{SPACE, is_whitespace};
use super::error::DecodeError;

/// Maximum segment length of a folded physical line, excluding the line break.
pub const FOLD_WIDTH: usize = 75;
/// Maximum length of an unfolded logical line.
pub const MAX_LINE_LENGTH: usize = 4096;

const CRLF: &[u8] = b"\r\n";

/// Joins folded physical lines back into logical lines.
///
/// A logical line is only known to be complete once the next physical line has been read, so
/// the unfolder keeps that line around as a one-line lookahead.
#[derive(Debug)]
pub struct Unfolder<R> {
    reader: R,
    logical: Vec<u8>,
    physical: Vec<u8>,
    peeked: bool,
}

impl<R: BufRead> Unfolder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            logical: Vec::with_capacity(MAX_LINE_LENGTH),
            physical: Vec::new(),
            peeked: false,
        }
    }

    /// Return the next logical line, or `None` once the stream is exhausted.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>, DecodeError> {
        self.logical.clear();

        if !self.peeked && !self.read_physical()? {
            return Ok(None);
        }
        self.peeked = false;
        push(&mut self.logical, &self.physical)?;

        while self.read_physical()? {
            match self.physical.first() {
                Some(&b) if is_whitespace(b) => push(&mut self.logical, &self.physical[1..])?,
                _ => {
                    self.peeked = true;
                    break;
                }
            }
        }

        Ok(Some(&self.logical))
    }

    /// Read one physical line into the lookahead buffer, stripping its line break.
    fn read_physical(&mut self) -> Result<bool, DecodeError> {
        self.physical.clear();
        if self.reader.read_until(b'\n', &mut self.physical)? == 0 {
            return Ok(false);
        }

        if self.physical.last() == Some(&b'\n') {
            self.physical.pop();
        }
        if self.physical.last() == Some(&b'\r') {
            self.physical.pop();
        }

        Ok(true)
    }
}

fn push(logical: &mut Vec<u8>, bytes: &[u8]) -> Result<(), DecodeError> {
    if logical.len() + bytes.len() > MAX_LINE_LENGTH {
        return Err(DecodeError::LineTooLong {
            limit: MAX_LINE_LENGTH,
        });
    }
    logical.extend_from_slice(bytes);
    Ok(())
}

/// Write one logical line as CRLF-terminated physical lines of at most [`FOLD_WIDTH`] octets.
pub fn fold_line<W: Write>(out: &mut W, line: &[u8]) -> io::Result<()> {
    for (i, segment) in line.chunks(FOLD_WIDTH).enumerate() {
        if i > 0 {
            out.write_all(&[SPACE])?;
        }
        out.write_all(segment)?;
        out.write_all(CRLF)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unfold_all(raw: &[u8]) -> Result<Vec<String>, DecodeError> {
        let mut unfolder = Unfolder::new(raw);
        let mut lines = Vec::new();
        while let Some(line) = unfolder.next_line()? {
            lines.push(String::from_utf8_lossy(line).into_owned());
        }
        Ok(lines)
    }

    #[test]
    fn unfolds_continuation_lines() {
        let raw = "normal line\r\n\
                   folded\r\n  with\r\n and without extra space\r\n\
                   final line\r\n";

        let mut unfolder = Unfolder::new(raw.as_bytes());
        for expected in [
            "normal line",
            "folded withand without extra space",
            "final line",
        ] {
            let line = unfolder.next_line().expect("readable").expect("line");
            assert_eq!(line, expected.as_bytes());
        }
        assert!(unfolder.next_line().expect("clean end").is_none());
        assert!(unfolder.next_line().expect("still clean").is_none());
    }

    #[test]
    fn tab_continuation_and_missing_final_break() {
        let lines = unfold_all(b"A:1\r\n\tB\nC:2").expect("unfold");
        assert_eq!(lines, vec!["A:1B", "C:2"]);
    }

    #[test]
    fn empty_input_is_clean_end() {
        assert!(unfold_all(b"").expect("unfold").is_empty());
    }

    #[test]
    fn overlong_logical_line_is_rejected() {
        let mut raw = vec![b'X'; MAX_LINE_LENGTH];
        raw.extend_from_slice(b"\r\n Y\r\n");
        assert!(matches!(
            unfold_all(&raw),
            Err(DecodeError::LineTooLong {
                limit: MAX_LINE_LENGTH
            })
        ));

        let mut exact = vec![b'X'; MAX_LINE_LENGTH - 1];
        exact.extend_from_slice(b"\r\n Y\r\n");
        let lines = unfold_all(&exact).expect("exactly at limit");
        assert_eq!(lines[0].len(), MAX_LINE_LENGTH);
    }

    #[test]
    fn folds_long_lines_into_segments() {
        let mut out = Vec::new();
        fold_line(&mut out, b"short line").expect("write");
        fold_line(
            &mut out,
            b"this is a very long ............................................................... line",
        )
        .expect("write");

        let expected = "short line\r\n\
            this is a very long .......................................................\r\n \
            ........ line\r\n";
        assert_eq!(String::from_utf8(out).expect("utf8"), expected);
    }

    #[test]
    fn folding_splits_on_byte_offsets() {
        let line = vec![b'a'; FOLD_WIDTH * 2 + 3];
        let mut out = Vec::new();
        fold_line(&mut out, &line).expect("write");

        let physical: Vec<&[u8]> = out
            .split(|&b| b == b'\n')
            .filter(|segment| !segment.is_empty())
            .collect();
        assert_eq!(physical.len(), 3);
        assert_eq!(physical[0].len(), FOLD_WIDTH + 1);
        assert_eq!(physical[1].len(), FOLD_WIDTH + 2);
        assert_eq!(physical[1][0], b' ');
        assert_eq!(physical[2], b" aaa\r");

        let unfolded = unfold_all(&out).expect("unfold");
        assert_eq!(unfolded, vec![String::from_utf8(line).expect("utf8")]);
    }
}

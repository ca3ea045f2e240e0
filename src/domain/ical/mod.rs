//! Text codec for the iCalendar wire format: line folding plus the content-line grammar.

mod chars;
mod codec;
mod content_line;
mod error;
mod folding;

pub use chars::CharClass;
pub use codec::{ContentLineReader, ContentLineWriter};
pub use content_line::{ContentLine, Param};
pub use error::{DecodeError, EncodeError, GrammarError};
pub use folding::{FOLD_WIDTH, MAX_LINE_LENGTH, Unfolder, fold_line};

use crate::util::Code;
use std::fmt::{Display, Formatter, Write};

/// The category of a [TqlError], mirroring the fault taxonomy of the language: every
/// compile-time and run-time failure surfaces through this single error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TqlErrorKind {
    /// The lexer rejected a byte that starts no token.
    IllegalCharacter,
    /// The parser failed to reduce the token stream to a valid expression.
    InvalidSyntax,
    /// A breadth operator was used in depth mode, or vice versa.
    ModeMismatch,
    /// A tag name appeared on the right of a conjunction, or two ids were conjoined.
    TagShape,
    /// An extractor's type was not `node`, `txt`, or `.attr`.
    InvalidExtractor,
    /// A `$name` filter function was not supplied at match time.
    UnknownFunc,
    /// An operand of `~~`/`!~` did not evaluate to a string.
    RegexType,
    /// Matching was invoked against a root that is not a document node.
    NotADocument,
}

/// The single error type returned by every fallible operation in this crate, from
/// lexing through matching.
#[derive(Debug, Clone)]
pub struct TqlError {
    kind: TqlErrorKind,
    message: String,
}

pub type TqlResult<T> = Result<T, TqlError>;

impl TqlError {
    pub(crate) fn new(kind: TqlErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    /// Build an error whose message is anchored to a byte offset in `code`, appending
    /// the resolved line/column the way compile diagnostics are reported throughout
    /// this crate.
    pub(crate) fn at(kind: TqlErrorKind, code: &Code, pointer: usize, message: String) -> Self {
        let mut message = message;
        let position = code.obtain_position(pointer);
        write!(message, " (at {}).", position).ok();
        Self { kind, message }
    }

    pub fn kind(&self) -> TqlErrorKind {
        self.kind
    }
}

impl Display for TqlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TqlError {}

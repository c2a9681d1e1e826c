//! Error types for query parsing, compilation, and document decoding.
//!
//! "Not translatable" is deliberately not an error: the compiler reports it
//! through [`Translation::FullScan`](crate::query::compiler::Translation),
//! which callers treat as "scan everything and evaluate in memory".

use std::fmt;

/// Errors raised by the query grammar, the compiler, and the binary codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The query string does not conform to the grammar.
    Parse {
        /// What went wrong.
        message: String,
        /// Byte position in the input where the error was detected.
        position: usize,
    },

    /// A QName prefix had no binding in scope at the point of use.
    UnboundPrefix(String),

    /// A range or sort referenced a field whose registered storage type
    /// disagrees with the type the expression requires.
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A MUST_NOT clause was requested inside a span context. Spans cannot
    /// express exclusion; producing one silently would yield a wrong query.
    SpanMustNot,

    /// A clause kind that has no span equivalent appeared inside a marked
    /// proximity group. This is a contract violation, not a user input error.
    SpanConversion(String),

    /// A stored binary tree buffer failed to decode. There is no partial
    /// decode; the document is unreadable.
    Corrupt(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { message, position } => {
                write!(f, "query parse error at offset {position}: {message}")
            }
            Self::UnboundPrefix(prefix) => {
                write!(f, "no namespace binding for prefix '{prefix}'")
            }
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field '{field}' is registered as {expected} but the expression requires {actual}"
            ),
            Self::SpanMustNot => f.write_str("MUST_NOT is not representable inside a span query"),
            Self::SpanConversion(what) => {
                write!(f, "cannot convert {what} into a span clause")
            }
            Self::Corrupt(detail) => write!(f, "corrupt document buffer: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Shorthand for a grammar error at a known position.
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// Shorthand for a codec corruption error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse() {
        let err = Error::parse("unexpected ')'", 7);
        assert_eq!(err.to_string(), "query parse error at offset 7: unexpected ')'");
    }

    #[test]
    fn test_display_unbound_prefix() {
        let err = Error::UnboundPrefix("svg".to_string());
        assert_eq!(err.to_string(), "no namespace binding for prefix 'svg'");
    }

    #[test]
    fn test_display_corrupt() {
        let err = Error::corrupt("truncated node array");
        assert_eq!(err.to_string(), "corrupt document buffer: truncated node array");
    }
}

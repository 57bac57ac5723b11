// This module defines the error type of the blang compiler using the thiserror crate.
// CompileError covers the four families of failures the single-pass compiler can hit:
// lexical errors raised while scanning characters (unclosed comments, literals and
// strings, unknown escapes, bad octal digits), syntax errors raised when the parser
// expects a particular character, semantic errors raised by the symbol tables and the
// statement compiler (undefined names, assignments to non-lvalues, misplaced case labels,
// label and case bookkeeping), and I/O errors from reading sources or writing the IR.
// Errors found inside a source file are wrapped in Located so the message carries the
// file name and line. Compilation is fail-fast: the first error aborts the whole run.

//! Error types for the blang compiler.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for B compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unclosed comment")]
    UnclosedComment,

    #[error("unclosed char literal")]
    UnclosedCharLiteral,

    #[error("unterminated string")]
    UnterminatedString,

    #[error("undefined escape character '*{0}'")]
    UndefinedEscapeCharacter(char),

    #[error("invalid digit '{0}' in octal constant")]
    InvalidOctalDigit(char),

    #[error("expect {expected}, got {found}")]
    Syntax { expected: String, found: Found },

    #[error("undefined identifier '{0}'")]
    UndefinedIdentifier(String),

    #[error("left operand of '{operator}' must be an lvalue")]
    NotAnLvalue { operator: &'static str },

    #[error("case label outside of switch")]
    CaseOutsideSwitch,

    #[error("unsupported initializer '{0}', only constants are allowed")]
    UnsupportedInitializer(String),

    #[error("label '{0}' used but never defined")]
    UndefinedLabel(String),

    #[error("label '{0}' defined more than once")]
    DuplicateLabel(String),

    #[error("duplicate case value {0}")]
    DuplicateCase(i64),

    #[error("'{0}' is already declared in this function")]
    Redeclared(String),

    #[error("'{0}' is already defined as a {1}")]
    SymbolConflict(String, &'static str),

    #[error("internal code generation error: {reason}")]
    Internal { reason: String },

    #[error("{path}:{line}: {error}")]
    Located {
        path: String,
        line: usize,
        #[source]
        error: Box<CompileError>,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the parser actually saw where it expected something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    Char(char),
    EndOfFile,
}

impl std::fmt::Display for Found {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Found::Char(c) => write!(f, "'{}'", c.escape_default()),
            Found::EndOfFile => write!(f, "end of file"),
        }
    }
}

impl From<Option<char>> for Found {
    fn from(c: Option<char>) -> Self {
        c.map_or(Found::EndOfFile, Found::Char)
    }
}

impl CompileError {
    /// Syntax error for an expectation that was not met.
    pub fn expected(expected: impl Into<String>, found: impl Into<Found>) -> Self {
        CompileError::Syntax {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Attach a file name and line, unless the error already carries one.
    pub fn located(self, path: &str, line: usize) -> Self {
        match self {
            located @ (CompileError::Located { .. } | CompileError::Io { .. }) => located,
            error => CompileError::Located {
                path: path.to_string(),
                line,
                error: Box::new(error),
            },
        }
    }

    /// The error without its location wrapper.
    pub fn kind(&self) -> &CompileError {
        match self {
            CompileError::Located { error, .. } => error.kind(),
            error => error,
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

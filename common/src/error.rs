use thiserror::Error;

/// Failure to read a single `k=` or probe line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected at least {expected} tokens, found {found}")]
    MissingTokens { expected: usize, found: usize },
    #[error("invalid integer '{0}'")]
    InvalidInteger(String),
    #[error("invalid number '{0}'")]
    InvalidFloat(String),
    #[error("non-finite number '{0}'")]
    NonFinite(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// `line` is 1-based.
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
    #[error("no usable samples in input")]
    EmptyInput,
}

impl AggregateError {
    pub fn malformed(line: usize, reason: impl ToString) -> Self {
        AggregateError::MalformedInput {
            line,
            reason: reason.to_string(),
        }
    }
}

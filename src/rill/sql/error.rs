/*!
# SQL Error Handling

Error type shared by the scanner, parser, validator, sorter and function runtime.

## Error Categories

- **Parse Errors**: lexical and syntax errors, reported at the first offending token
- **Validation Errors**: semantic checks done once at parse time (aggregate misuse,
  function arity, window arguments, stream options)
- **Execution Errors**: evaluation failures surfaced to callers that asked for a `Result`
- **Type Errors**: incompatible dynamic types detected while sorting
- **Not Found**: unresolvable functions or references, kept apart from hard failures so
  the caller can decide whether to treat them as NULL

Expression evaluation itself never returns `Err`. It produces
[`FieldValue::Error`](crate::rill::sql::execution::types::FieldValue::Error) values that
propagate through the tree; [`SqlError::from_error_value`] bridges the two worlds.

## Examples

```rust
use rillstream::rill::sql::error::SqlError;

let error = SqlError::parse_error("found \"FORM\", expected FROM.", Some(9));
assert_eq!(
    error.to_string(),
    "SQL parse error at position 9: found \"FORM\", expected FROM."
);

let missing = SqlError::not_found("function", "nosuch");
assert!(missing.is_not_found());
```
*/

use std::fmt;

/// Errors produced while compiling or running a streaming SQL query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlError {
    /// Lexical or syntax error. Parsing stops at the first one.
    ParseError {
        /// Human-readable message naming the offending lexeme and the expected alternative
        message: String,
        /// Character offset in the SQL text, when known
        position: Option<usize>,
    },

    /// Semantic error detected after the structure of a statement is known.
    ValidationError { message: String },

    /// Runtime failure while evaluating a query.
    ExecutionError {
        message: String,
        /// SQL text that caused the error, if available
        query: Option<String>,
    },

    /// Two values of incompatible dynamic types met where one type was required.
    TypeError {
        expected: String,
        actual: String,
        value: Option<String>,
    },

    /// A function or reference could not be resolved.
    NotFound {
        /// What was looked up (`function`, `field`, `meta`)
        kind: String,
        name: String,
    },
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::ParseError { message, position } => {
                if let Some(pos) = position {
                    write!(f, "SQL parse error at position {}: {}", pos, message)
                } else {
                    write!(f, "SQL parse error: {}", message)
                }
            }
            SqlError::ValidationError { message } => write!(f, "{}", message),
            SqlError::ExecutionError { message, query } => {
                if let Some(q) = query {
                    write!(f, "Query execution error in '{}': {}", q, message)
                } else {
                    write!(f, "Query execution error: {}", message)
                }
            }
            SqlError::TypeError {
                expected,
                actual,
                value,
            } => {
                if let Some(val) = value {
                    write!(
                        f,
                        "incompatible types for comparison: {} and {} for value '{}'",
                        expected, actual, val
                    )
                } else {
                    write!(
                        f,
                        "incompatible types for comparison: {} and {}",
                        expected, actual
                    )
                }
            }
            SqlError::NotFound { kind, name } => write!(f, "{} {} not found", kind, name),
        }
    }
}

impl std::error::Error for SqlError {}

impl SqlError {
    /// Create a parse error with position
    pub fn parse_error(message: impl Into<String>, position: Option<usize>) -> Self {
        SqlError::ParseError {
            message: message.into(),
            position,
        }
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        SqlError::ValidationError {
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution_error(message: impl Into<String>, query: Option<String>) -> Self {
        SqlError::ExecutionError {
            message: message.into(),
            query,
        }
    }

    /// Create a type error
    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        SqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
            value,
        }
    }

    /// Create a resolution error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        SqlError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True for resolution failures, which callers may choose to treat as NULL.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SqlError::NotFound { .. })
    }

    /// Wrap the message carried by an error value.
    pub fn from_error_value(message: &str) -> Self {
        SqlError::ExecutionError {
            message: message.to_string(),
            query: None,
        }
    }

    /// Bare message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            SqlError::ParseError { message, .. }
            | SqlError::ValidationError { message }
            | SqlError::ExecutionError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for SQL operations
pub type SqlResult<T> = Result<T, SqlError>;

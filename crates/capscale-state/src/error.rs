//! Error types for the capscale state store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// State store failures, tagged with the table involved where there is one.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("table {table}: {reason}")]
    Table { table: &'static str, reason: String },

    #[error("reading {table}: {reason}")]
    Read { table: &'static str, reason: String },

    #[error("writing {table}: {reason}")]
    Write { table: &'static str, reason: String },

    #[error("encoding record for {table}: {reason}")]
    Encode { table: &'static str, reason: String },

    #[error("corrupt record in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_table() {
        let err = StateError::Corrupt {
            table: "collections",
            reason: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "corrupt record in collections: expected value");
    }
}

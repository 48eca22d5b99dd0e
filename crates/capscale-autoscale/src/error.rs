//! Errors that abort a scaling cycle.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("collection {collection}: {operation} failed: {source}")]
    Collection {
        collection: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("coordination store: {operation} for {key} failed: {source}")]
    Coordination {
        key: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("coordination store did not record the attempt for {key}")]
    GateNotRecorded { key: String },

    #[error("collection {collection}: cycle exceeded {after:?}")]
    TimedOut { collection: String, after: Duration },

    #[error("collection {collection}: cycle aborted: {reason}")]
    Aborted { collection: String, reason: String },
}

impl ScaleError {
    pub(crate) fn collection<'a>(
        collection: &'a str,
        operation: &'static str,
    ) -> impl FnOnce(anyhow::Error) -> Self + 'a {
        move |source| ScaleError::Collection {
            collection: collection.to_string(),
            operation,
            source,
        }
    }

    pub(crate) fn coordination<'a>(key: &'a str, operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self + 'a {
        move |source| ScaleError::Coordination {
            key: key.to_string(),
            operation,
            source,
        }
    }
}

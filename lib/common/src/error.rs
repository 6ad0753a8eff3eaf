use rdf_bedrock_model::TermModelError;
use std::error::Error;
use tokio_postgres::error::SqlState;

/// An error related to storage operations (reads, writes, bulk ingest).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Invalid input rejected before any I/O (space id shape, identifier
    /// length, malformed term).
    #[error("{0}")]
    Validation(String),
    /// The operation targets a space whose tables are absent.
    #[error("Invalid space '{0}' does not exist")]
    SpaceNotFound(String),
    /// A stored row could not be decoded back into an RDF term.
    #[error(transparent)]
    Term(#[from] TermModelError),
    /// N-Triples syntax error, with the offending line.
    #[error("N-Triples syntax error at line {line}: {message}")]
    Parse { line: u64, message: String },
    /// Commit/rollback after the owning connection was already released.
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Any other failure from the database layer.
    #[error(transparent)]
    Backend(#[from] tokio_postgres::Error),
    /// Failure acquiring a pooled connection.
    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),
    /// Error from the OS I/O layer (bulk ingest scratch files).
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl StorageError {
    /// Builds a validation error from a printable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Builds an error from an arbitrary boxed cause.
    pub fn other(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }

    /// Maps a backend error raised while operating on `space_id`'s tables.
    ///
    /// An "undefined table" error on a known space-table shape means the space
    /// was never created (or already deleted); the verbose backend message is
    /// replaced with the clean space-not-found form.
    pub fn for_space(space_id: &str, error: tokio_postgres::Error) -> Self {
        if error.code() == Some(&SqlState::UNDEFINED_TABLE) {
            Self::SpaceNotFound(space_id.to_owned())
        } else {
            Self::Backend(error)
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_not_found_message_is_clean() {
        let error = StorageError::SpaceNotFound("sales".to_owned());
        assert_eq!(error.to_string(), "Invalid space 'sales' does not exist");
    }

    #[test]
    fn parse_error_carries_line() {
        let error = StorageError::Parse {
            line: 42,
            message: "unexpected token".to_owned(),
        };
        assert!(error.to_string().contains("line 42"));
    }
}

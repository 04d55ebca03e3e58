//! # Error Module
//!
//! Error type for Halaqa core operations.
//!
//! Store-level failures (I/O, transactions, corrupt records) all collapse into
//! [`Error::DataUnavailable`]; callers never receive partial results.
//! Malformed filter input is not an error: it yields an empty listing.

use crate::EntityId;
use thiserror::Error;

/// Errors from Halaqa core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity store could not serve the request.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// No entity with this id.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// An insert named an id that is already stored.
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),

    /// Every id up to `u64::MAX` has been handed out.
    #[error("entity id space exhausted")]
    IdsExhausted,

    /// A field exists but holds a value of the wrong type.
    #[error("field '{field}' on entity {id} is not a {expected}")]
    FieldType {
        id: EntityId,
        field: String,
        expected: &'static str,
    },

    /// A list request asked for a metric the profile does not define.
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    /// No resource profile registered for this entity kind.
    #[error("unknown resource profile '{0}'")]
    UnknownProfile(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

macro_rules! unavailable_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Error {
                fn from(err: $source) -> Self {
                    Self::DataUnavailable(err.to_string())
                }
            }
        )*
    };
}

unavailable_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    postcard::Error,
);

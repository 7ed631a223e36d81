//! Error taxonomy for the social domain

use common::error::DatabaseError;
use thiserror::Error;

/// Why a domain operation did not happen
#[derive(Error, Debug)]
pub enum SocialError {
    /// Referenced document is absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A pending request already exists for the pair
    #[error("A connection request between these users is already pending")]
    AlreadyPending,

    /// The pair is already connected
    #[error("Users are already connected")]
    AlreadyConnected,

    /// The document being created already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Username reservation exists
    #[error("Username is already taken: {0}")]
    UsernameTaken(String),

    /// Acting session may not touch the target
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input failed validation
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Store or transport failure
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    /// Object store failure
    #[error("Media error: {0}")]
    Media(String),
}

impl SocialError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SocialError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for SocialError {
    fn from(err: sqlx::Error) -> Self {
        SocialError::Store(DatabaseError::query(err))
    }
}

pub type SocialResult<T> = Result<T, SocialError>;

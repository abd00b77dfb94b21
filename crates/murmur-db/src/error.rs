use thiserror::Error;

/// Storage-layer failures. The two conflict variants exist because the
/// UNIQUE constraints are the authoritative uniqueness check; callers
/// translate them, everything else is an infrastructure fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username is already taken")]
    UsernameTaken,

    #[error("email is already registered")]
    EmailTaken,

    #[error("corrupt row: {0}")]
    Corrupt(&'static str),

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Map a UNIQUE-constraint failure on the users table to the conflict it
/// represents; anything else passes through untouched.
pub(crate) fn classify_constraint(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return StoreError::UsernameTaken;
            }
            if msg.contains("users.email") {
                return StoreError::EmailTaken;
            }
        }
    }
    StoreError::Sqlite(err)
}

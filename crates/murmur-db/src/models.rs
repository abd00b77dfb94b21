/// Database row types — these map directly to SQLite rows.
/// Distinct from the murmur-types wire models to keep the DB layer
/// independent.
use crate::StoreError;

/// Verification lifecycle of an account, decoded at row-mapping time.
/// A row is either pending (code and expiry present) or verified (both
/// cleared); the schema CHECK rejects anything in between, so a mixed
/// row is corruption, not a state to default away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Pending { code: String, expires_at: String },
    Verified,
}

impl VerificationState {
    pub(crate) fn from_columns(
        is_verified: bool,
        code: Option<String>,
        expires_at: Option<String>,
    ) -> Result<Self, StoreError> {
        match (is_verified, code, expires_at) {
            (true, None, None) => Ok(Self::Verified),
            (false, Some(code), Some(expires_at)) => Ok(Self::Pending { code, expires_at }),
            _ => Err(StoreError::Corrupt(
                "user row mixes verified and pending columns",
            )),
        }
    }
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub verification: VerificationState,
    pub is_accepting_messages: bool,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub content: String,
    pub created_at: String,
}

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::classify_constraint;
use crate::models::{MessageRow, UserRow, VerificationState};
use crate::{Database, StoreError};

/// Column values for a freshly registered, still-unverified account.
pub struct NewPendingUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub verify_code: &'a str,
    pub verify_code_expiry: &'a str,
}

/// Result of attempting to consume a verification code.
#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    NotFound,
    InvalidCode,
    CodeExpired,
}

/// Result of the guarded message append.
#[derive(Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    RecipientNotFound,
    NotAccepting,
}

impl Database {
    // -- Users --

    pub fn create_pending_user(&self, user: &NewPendingUser<'_>) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, verify_code, verify_code_expiry, is_verified, is_accepting_messages)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.verify_code,
                    user.verify_code_expiry
                ],
            )
            .map_err(classify_constraint)?;
            Ok(())
        })
    }

    /// Re-arm a still-pending registration with a fresh password hash,
    /// code and expiry. Keyed on `is_verified = 0`: if the account was
    /// verified concurrently no row matches, and the caller must treat
    /// the email as taken.
    pub fn refresh_pending_user(
        &self,
        email: &str,
        password_hash: &str,
        verify_code: &str,
        verify_code_expiry: &str,
    ) -> Result<bool, StoreError> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1, verify_code = ?2, verify_code_expiry = ?3
                 WHERE email = ?4 AND is_verified = 0",
                params![password_hash, verify_code, verify_code_expiry, email],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn find_verified_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "username = ?1 AND is_verified = 1", username))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Sign-in lookup: the identifier may be a username or an email.
    pub fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?1", identifier))
    }

    /// Consume a verification code, flipping the account to verified.
    ///
    /// The UPDATE is keyed on the still-pending state and the exact code,
    /// so two racing verifies cannot both pass and a consumed code cannot
    /// be replayed. A raced-away update re-reads the row to classify.
    pub fn consume_verify_code(
        &self,
        username: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome, StoreError> {
        self.with_conn_mut(|conn| {
            let Some(user) = query_user(conn, "username = ?1", username)? else {
                return Ok(VerifyOutcome::NotFound);
            };

            let (stored_code, expires_at) = match &user.verification {
                VerificationState::Verified => return Ok(VerifyOutcome::AlreadyVerified),
                VerificationState::Pending { code, expires_at } => {
                    (code.as_str(), expires_at.as_str())
                }
            };

            if stored_code != code {
                return Ok(VerifyOutcome::InvalidCode);
            }

            let expiry = DateTime::parse_from_rfc3339(expires_at)
                .map_err(|_| StoreError::Corrupt("unparseable verify_code_expiry"))?
                .with_timezone(&Utc);
            if now > expiry {
                return Ok(VerifyOutcome::CodeExpired);
            }

            let changed = conn.execute(
                "UPDATE users SET is_verified = 1, verify_code = NULL, verify_code_expiry = NULL
                 WHERE id = ?1 AND is_verified = 0 AND verify_code = ?2",
                params![user.id, code],
            )?;
            if changed > 0 {
                return Ok(VerifyOutcome::Verified);
            }

            // Lost the race: the code was consumed or re-armed in between.
            match query_user(conn, "username = ?1", username)? {
                Some(u) if u.verification == VerificationState::Verified => {
                    Ok(VerifyOutcome::AlreadyVerified)
                }
                _ => Ok(VerifyOutcome::InvalidCode),
            }
        })
    }

    /// Set the acceptance flag, returning `(previous, new)`, or `None` if
    /// the user no longer exists. The connection lock serializes the
    /// previous-value read with the single-column set.
    pub fn set_accepting_messages(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<Option<(bool, bool)>, StoreError> {
        self.with_conn_mut(|conn| {
            let previous: Option<bool> = conn
                .query_row(
                    "SELECT is_accepting_messages FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Ok(None);
            };

            conn.execute(
                "UPDATE users SET is_accepting_messages = ?1 WHERE id = ?2",
                params![enabled, user_id],
            )?;
            Ok(Some((previous, enabled)))
        })
    }

    // -- Messages --

    /// Atomic check-and-append: the acceptance-flag check and the insert
    /// are one statement, so the flag cannot flip between them.
    pub fn append_message(
        &self,
        recipient_username: &str,
        id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<AppendOutcome, StoreError> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO messages (id, user_id, content, created_at)
                 SELECT ?1, id, ?2, ?3 FROM users
                 WHERE username = ?4 AND is_accepting_messages = 1",
                params![id, content, created_at, recipient_username],
            )?;
            if inserted > 0 {
                return Ok(AppendOutcome::Appended);
            }

            // Nothing appended; this follow-up read only classifies the
            // refusal, the gate itself already decided.
            let flag: Option<bool> = conn
                .query_row(
                    "SELECT is_accepting_messages FROM users WHERE username = ?1",
                    [recipient_username],
                    |row| row.get(0),
                )
                .optional()?;
            match flag {
                None => Ok(AppendOutcome::RecipientNotFound),
                Some(_) => Ok(AppendOutcome::NotAccepting),
            }
        })
    }

    /// All messages for a user, most recent first. The sort happens here,
    /// not in process memory: the mailbox is unbounded. `rowid` keeps
    /// equal timestamps in insertion order.
    pub fn messages_for_user(&self, user_id: &str) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, created_at FROM messages
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

struct RawUser {
    id: String,
    username: String,
    email: String,
    password: String,
    verify_code: Option<String>,
    verify_code_expiry: Option<String>,
    is_verified: bool,
    is_accepting_messages: bool,
    created_at: String,
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    binding: &str,
) -> Result<Option<UserRow>, StoreError> {
    let sql = format!(
        "SELECT id, username, email, password, verify_code, verify_code_expiry,
                is_verified, is_accepting_messages, created_at
         FROM users WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let raw = stmt
        .query_row([binding], |row| {
            Ok(RawUser {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                verify_code: row.get(4)?,
                verify_code_expiry: row.get(5)?,
                is_verified: row.get(6)?,
                is_accepting_messages: row.get(7)?,
                created_at: row.get(8)?,
            })
        })
        .optional()?;

    raw.map(|raw| {
        let verification = VerificationState::from_columns(
            raw.is_verified,
            raw.verify_code,
            raw.verify_code_expiry,
        )?;
        Ok(UserRow {
            id: raw.id,
            username: raw.username,
            email: raw.email,
            password: raw.password,
            verification,
            is_accepting_messages: raw.is_accepting_messages,
            created_at: raw.created_at,
        })
    })
    .transpose()
}

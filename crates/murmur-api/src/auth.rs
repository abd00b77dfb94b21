use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, SecondsFormat, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use murmur_db::models::VerificationState;
use murmur_db::queries::{NewPendingUser, VerifyOutcome};
use murmur_types::api::{
    Claims, Envelope, SignInData, SignInRequest, SignUpRequest, VerifyCodeRequest,
};

use crate::{AppState, error::ApiError, validation};

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    validation::validate_username(&username).map_err(ApiError::Validation)?;
    validation::validate_email(&req.email).map_err(ApiError::Validation)?;
    validation::validate_password(&req.password).map_err(ApiError::Validation)?;

    // Friendly pre-check; the UNIQUE constraints below stay authoritative
    // when registrations race.
    if state
        .db
        .find_verified_user_by_username(&username)?
        .is_some()
    {
        return Err(ApiError::UsernameTaken);
    }

    let verify_code = generate_verify_code();
    let expiry = (Utc::now() + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let password_hash = hash_password(&req.password)?;

    match state.db.find_user_by_email(&req.email)? {
        Some(user) if user.verification == VerificationState::Verified => {
            return Err(ApiError::EmailTaken);
        }
        Some(_) => {
            // Pending re-registration: re-arm the code in place.
            let refreshed =
                state
                    .db
                    .refresh_pending_user(&req.email, &password_hash, &verify_code, &expiry)?;
            if !refreshed {
                // verified between the read and the update
                return Err(ApiError::EmailTaken);
            }
        }
        None => {
            let id = Uuid::new_v4().to_string();
            state.db.create_pending_user(&NewPendingUser {
                id: &id,
                username: &username,
                email: &req.email,
                password_hash: &password_hash,
                verify_code: &verify_code,
                verify_code_expiry: &expiry,
            })?;
        }
    }

    // The pending row survives a failed dispatch: signing up again with
    // the same email regenerates the code and retries the email.
    state
        .mailer
        .send_verification(&req.email, &username, &verify_code)
        .await
        .map_err(ApiError::Delivery)?;

    info!("Registered pending account for {}", username);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            "User registered successfully. Please verify your account.",
        )),
    ))
}

pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();

    match state
        .db
        .consume_verify_code(username, &req.code, Utc::now())?
    {
        VerifyOutcome::Verified => {
            info!("Account verified for {}", username);
            Ok(Json(Envelope::ok("Account verified successfully")))
        }
        VerifyOutcome::AlreadyVerified => Ok(Json(Envelope::ok("Account is already verified"))),
        VerifyOutcome::NotFound => Err(ApiError::NotFound),
        VerifyOutcome::InvalidCode => Err(ApiError::InvalidCode),
        VerifyOutcome::CodeExpired => Err(ApiError::CodeExpired),
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_identifier(req.identifier.trim())?
        .ok_or(ApiError::InvalidCredentials)?;

    if user.verification != VerificationState::Verified {
        return Err(ApiError::NotVerified);
    }

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored password hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {e}", user.id)))?;

    let token =
        create_token(&state.jwt_secret, user_id, &user.username).map_err(ApiError::Internal)?;

    Ok(Json(Envelope::with_data(
        "Signed in successfully",
        SignInData {
            user_id,
            username: user.username,
            token,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

/// Advisory availability probe for the sign-up form; the UNIQUE
/// constraint remains authoritative at insert time.
pub async fn check_username_unique(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = query.username.trim().to_string();
    validation::validate_username(&username).map_err(ApiError::Validation)?;

    if state
        .db
        .find_verified_user_by_username(&username)?
        .is_some()
    {
        return Err(ApiError::UsernameTaken);
    }

    Ok(Json(Envelope::ok("Username is available")))
}

fn generate_verify_code() -> String {
    // 100000..=999999 keeps the code at exactly six digits
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_codes_are_six_digits() {
        for _ in 0..64 {
            let code = generate_verify_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use murmur_db::queries::AppendOutcome;
use murmur_types::api::{
    AcceptMessagesData, AcceptMessagesRequest, Claims, Envelope, MessagesData, SendMessageRequest,
};
use murmur_types::models::Message;

use crate::{AppState, error::ApiError, validation};

/// Anonymous intake: no authentication, the recipient's acceptance flag
/// is the only gate.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_content(&req.content, state.content_limits).map_err(ApiError::Validation)?;

    let message_id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let recipient = req.username.trim().to_string();

    // Run the blocking guarded insert off the async runtime
    let db_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        db_state
            .db
            .append_message(&recipient, &message_id, &req.content, &created_at)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    match outcome {
        AppendOutcome::Appended => Ok(Json(Envelope::ok("Message sent successfully"))),
        AppendOutcome::RecipientNotFound => Err(ApiError::RecipientNotFound),
        AppendOutcome::NotAccepting => Err(ApiError::MessagesDisabled),
    }
}

pub async fn get_accept_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(Envelope::with_data(
        "Message acceptance status fetched",
        AcceptMessagesData {
            is_accepting_messages: user.is_accepting_messages,
            previous: None,
        },
    )))
}

pub async fn set_accept_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AcceptMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (previous, current) = state
        .db
        .set_accepting_messages(&claims.sub.to_string(), req.accept_messages)?
        .ok_or(ApiError::NotFound)?;

    let message = if current {
        "You are now accepting messages"
    } else {
        "You are no longer accepting messages"
    };
    Ok(Json(Envelope::with_data(
        message,
        AcceptMessagesData {
            is_accepting_messages: current,
            previous: Some(previous),
        },
    )))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db_state = state.clone();
    let user_id = claims.sub.to_string();

    // Run the blocking read off the async runtime; the ordering comes
    // from the storage query, not from an in-process sort.
    let rows = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        if db_state.db.find_user_by_id(&user_id)?.is_none() {
            return Err(ApiError::NotFound);
        }
        Ok(db_state.db.messages_for_user(&user_id)?)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!(e))
    })??;

    let messages: Vec<Message> = rows
        .into_iter()
        .map(|row| {
            let id = row.id.parse().unwrap_or_else(|e| {
                warn!("Corrupt message id '{}': {}", row.id, e);
                Uuid::default()
            });
            let created_at = row
                .created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|e| {
                    warn!(
                        "Corrupt created_at '{}' on message '{}': {}",
                        row.created_at, row.id, e
                    );
                    DateTime::default()
                });
            Message {
                id,
                content: row.content,
                created_at,
            }
        })
        .collect();

    Ok(Json(Envelope::with_data(
        "Messages fetched",
        MessagesData { messages },
    )))
}

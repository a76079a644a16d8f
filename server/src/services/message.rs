//! Message service — create and find.
//!
//! DESIGN
//! ======
//! Creation runs the validation hook before any database work, then resolves
//! the sender so every message payload carries the display name and color it
//! should render with. Messages are immutable once created; `find` returns
//! the newest rows first and callers reverse for display order.

use sqlx::PgPool;
use uuid::Uuid;

use frames::{Data, ErrorCode};

use super::now_ms;
use crate::hooks::{self, HookError};

/// Upper bound (and default) for `messages:find`.
pub const FIND_LIMIT_MAX: i64 = 200;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Invalid(#[from] HookError),
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for MessageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(err) => err.error_code(),
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::Invalid(err) => err.details(),
            _ => None,
        }
    }
}

/// A message row, flattened with the sender's display fields.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub text: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_color: String,
    pub created_at: i64,
}

// =============================================================================
// CREATE
// =============================================================================

/// Create a message from incoming frame data.
///
/// The validation hook runs first; nothing reaches the database unless the
/// payload passes.
///
/// # Errors
///
/// Returns `Invalid` on hook rejection, `UserNotFound` if the sender does
/// not exist.
pub async fn create_message(
    pool: &PgPool,
    data: &Data,
    user_id: Uuid,
) -> Result<MessageRecord, MessageError> {
    hooks::process_message(data)?;

    // The hook guarantees `text` is a string within bounds.
    let text = data
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let sender = sqlx::query_as::<_, (String, String)>("SELECT name, color FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(MessageError::UserNotFound(user_id))?;

    let message = MessageRecord {
        id: Uuid::new_v4(),
        text,
        user_id,
        user_name: sender.0,
        user_color: sender.1,
        created_at: now_ms(),
    };

    sqlx::query("INSERT INTO messages (id, text, user_id, created_at) VALUES ($1, $2, $3, $4)")
        .bind(message.id)
        .bind(&message.text)
        .bind(message.user_id)
        .bind(message.created_at)
        .execute(pool)
        .await?;

    Ok(message)
}

// =============================================================================
// FIND
// =============================================================================

/// Fetch the newest messages, newest first. `limit` is clamped to
/// [1, `FIND_LIMIT_MAX`]; `None` means the maximum.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_messages(pool: &PgPool, limit: Option<i64>) -> Result<Vec<MessageRecord>, MessageError> {
    let limit = limit.unwrap_or(FIND_LIMIT_MAX).clamp(1, FIND_LIMIT_MAX);

    let rows = sqlx::query_as::<_, (Uuid, String, Uuid, i64, String, String)>(
        "SELECT m.id, m.text, m.user_id, m.created_at, u.name, u.color
         FROM messages m
         JOIN users u ON u.id = m.user_id
         ORDER BY m.created_at DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, text, user_id, created_at, user_name, user_color)| MessageRecord {
            id,
            text,
            user_id,
            user_name,
            user_color,
            created_at,
        })
        .collect())
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

//! User service — create, get, patch, find.
//!
//! DESIGN
//! ======
//! Users are created anonymously: the server assigns a generated guest name
//! and a presence color from a fixed palette. Renames and recolors arrive as
//! partial patches and are validated before touching the database, with the
//! same unprocessable/details error shape as the message hook so clients can
//! surface them inline.

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use frames::ErrorCode;

use super::now_ms;

/// Maximum display name length, in characters.
pub const NAME_MAX_CHARS: usize = 32;

/// Presence palette. Stored without the leading '#'.
const PRESENCE_COLORS: &[&str] = &[
    "e6194b", "3cb44b", "ffe119", "4363d8", "f58231", "911eb4", "46f0f0", "f032e6", "008080",
    "9a6324",
];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("invalid user data")]
    Unprocessable { details: Vec<String> },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_USER_NOT_FOUND",
            Self::Unprocessable { .. } => "E_UNPROCESSABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::Unprocessable { details } => Some(details.clone()),
            _ => None,
        }
    }
}

/// A user row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub online: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update applied by `users:patch`.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub online: Option<bool>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate and normalize a patch. Colors are stored lowercase without the
/// leading '#'.
///
/// # Errors
///
/// Returns `UserError::Unprocessable` with one detail per violated rule.
pub fn validate_patch(patch: &UserPatch) -> Result<UserPatch, UserError> {
    let mut details = Vec::new();
    let mut normalized = patch.clone();

    if let Some(name) = &patch.name {
        let len = name.chars().count();
        if len < 1 {
            details.push("name must be at least 1 character long".to_string());
        } else if len > NAME_MAX_CHARS {
            details.push(format!("name must be at most {NAME_MAX_CHARS} characters long"));
        }
    }

    if let Some(color) = &patch.color {
        let hex = color.strip_prefix('#').unwrap_or(color).to_ascii_lowercase();
        if (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            normalized.color = Some(hex);
        } else {
            details.push("color must be a 3 or 6 digit hex value".to_string());
        }
    }

    if details.is_empty() {
        Ok(normalized)
    } else {
        Err(UserError::Unprocessable { details })
    }
}

// =============================================================================
// IDENTITY GENERATION
// =============================================================================

/// Generate a guest display name, e.g. `guest-3f2a`.
#[must_use]
pub fn generate_guest_name() -> String {
    let suffix: u16 = rand::rng().random();
    format!("guest-{suffix:04x}")
}

/// Pick a presence color from the palette.
#[must_use]
pub fn pick_color() -> String {
    let idx = rand::rng().random_range(0..PRESENCE_COLORS.len());
    PRESENCE_COLORS[idx].to_string()
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a new user with a generated name and color.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_user(pool: &PgPool, online: bool) -> Result<UserRecord, UserError> {
    let user = UserRecord {
        id: Uuid::new_v4(),
        name: generate_guest_name(),
        color: pick_color(),
        online,
        created_at: now_ms(),
        updated_at: now_ms(),
    };

    sqlx::query(
        "INSERT INTO users (id, name, color, online, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.color)
    .bind(user.online)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(user)
}

/// Fetch a user by ID.
///
/// # Errors
///
/// Returns `NotFound` if no such user exists.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<UserRecord, UserError> {
    let row = sqlx::query_as::<_, (Uuid, String, String, bool, i64, i64)>(
        "SELECT id, name, color, online, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_record).ok_or(UserError::NotFound(id))
}

/// Apply a partial update to a user.
///
/// # Errors
///
/// Returns `Unprocessable` on validation failure, `NotFound` if no such
/// user exists.
pub async fn patch_user(pool: &PgPool, id: Uuid, patch: &UserPatch) -> Result<UserRecord, UserError> {
    let patch = validate_patch(patch)?;

    let row = sqlx::query_as::<_, (Uuid, String, String, bool, i64, i64)>(
        "UPDATE users
         SET name = COALESCE($2, name),
             color = COALESCE($3, color),
             online = COALESCE($4, online),
             updated_at = $5
         WHERE id = $1
         RETURNING id, name, color, online, created_at, updated_at",
    )
    .bind(id)
    .bind(patch.name)
    .bind(patch.color)
    .bind(patch.online)
    .bind(now_ms())
    .fetch_optional(pool)
    .await?;

    row.map(row_to_record).ok_or(UserError::NotFound(id))
}

/// List users, optionally filtered by the online flag.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_users(
    pool: &PgPool,
    online: Option<bool>,
    limit: i64,
) -> Result<Vec<UserRecord>, UserError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, bool, i64, i64)>(
        "SELECT id, name, color, online, created_at, updated_at
         FROM users
         WHERE ($1::boolean IS NULL OR online = $1)
         ORDER BY created_at ASC
         LIMIT $2",
    )
    .bind(online)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_record).collect())
}

fn row_to_record(row: (Uuid, String, String, bool, i64, i64)) -> UserRecord {
    let (id, name, color, online, created_at, updated_at) = row;
    UserRecord { id, name, color, online, created_at, updated_at }
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;

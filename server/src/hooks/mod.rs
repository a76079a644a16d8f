//! Validation hooks run before persistence.
//!
//! DESIGN
//! ======
//! A hook is a synchronous, side-effect-free check the dispatch layer runs
//! on incoming data immediately before a create operation. All-or-nothing:
//! a failing hook rejects the whole operation with an unprocessable error
//! carrying per-field details, and nothing reaches the database.

use frames::{Data, ErrorCode};

/// Minimum message text length, in characters.
pub const TEXT_MIN_CHARS: usize = 1;

/// Maximum message text length, in characters.
pub const TEXT_MAX_CHARS: usize = 400;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    #[error("invalid message data")]
    Unprocessable { details: Vec<String> },
}

impl ErrorCode for HookError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unprocessable { .. } => "E_UNPROCESSABLE",
        }
    }

    fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::Unprocessable { details } => Some(details.clone()),
        }
    }
}

// =============================================================================
// MESSAGE HOOK
// =============================================================================

/// Validate incoming message data before creation.
///
/// `text` must be present, a string, and within the character length bounds.
///
/// # Errors
///
/// Returns `HookError::Unprocessable` with one detail per violated rule.
pub fn process_message(data: &Data) -> Result<(), HookError> {
    let mut details = Vec::new();

    match data.get("text") {
        None => details.push("text is required".to_string()),
        Some(value) => match value.as_str() {
            None => details.push("text must be a string".to_string()),
            Some(text) => {
                let len = text.chars().count();
                if len < TEXT_MIN_CHARS {
                    details.push(format!("text must be at least {TEXT_MIN_CHARS} character long"));
                } else if len > TEXT_MAX_CHARS {
                    details.push(format!("text must be at most {TEXT_MAX_CHARS} characters long"));
                }
            }
        },
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(HookError::Unprocessable { details })
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

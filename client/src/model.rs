//! Client-side record types and payload parsing.
//!
//! Payloads arrive as flat frame data; parsing is tolerant field-by-field
//! extraction, never serde derive, so a malformed record is skipped rather
//! than failing the whole stream.

use serde_json::Value;
use uuid::Uuid;

use frames::Data;

/// A chat user as rendered in the presence list.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub online: bool,
}

/// A chat message, flattened with the sender's display fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_color: String,
    pub created_at: i64,
}

/// Partial update sent by `users:patch`.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub online: Option<bool>,
}

/// Two records denote the same user iff their identifiers are equal,
/// regardless of any other field.
#[must_use]
pub fn users_equal(a: &User, b: &User) -> bool {
    a.id == b.id
}

// =============================================================================
// PARSING
// =============================================================================

fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn get_uuid(value: &Value, key: &str) -> Option<Uuid> {
    get_str(value, key).and_then(|s| s.parse().ok())
}

impl User {
    /// Parse a user payload from a JSON object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: get_uuid(value, "id")?,
            name: get_str(value, "name")?.to_string(),
            color: get_str(value, "color")?.to_string(),
            online: value.get("online").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Parse a user payload from flat frame data.
    #[must_use]
    pub fn from_data(data: &Data) -> Option<Self> {
        Self::from_value(&data_to_value(data))
    }
}

impl ChatMessage {
    /// Parse a message payload from a JSON object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: get_uuid(value, "id")?,
            text: get_str(value, "text")?.to_string(),
            user_id: get_uuid(value, "user_id")?,
            user_name: get_str(value, "user_name")?.to_string(),
            user_color: get_str(value, "user_color").unwrap_or_default().to_string(),
            created_at: value.get("created_at").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Parse a message payload from flat frame data.
    #[must_use]
    pub fn from_data(data: &Data) -> Option<Self> {
        Self::from_value(&data_to_value(data))
    }
}

fn data_to_value(data: &Data) -> Value {
    Value::Object(data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_equal_compares_ids_only() {
        let a = User { id: Uuid::new_v4(), name: "ada".into(), color: "f00".into(), online: true };
        let b = User { id: a.id, name: "renamed".into(), color: "0f0".into(), online: false };
        let c = User { id: Uuid::new_v4(), ..a.clone() };

        assert!(users_equal(&a, &b));
        assert!(!users_equal(&a, &c));
    }

    #[test]
    fn user_parses_from_value_and_rejects_missing_fields() {
        let id = Uuid::new_v4();
        let value = serde_json::json!({"id": id.to_string(), "name": "ada", "color": "f00", "online": true});
        let user = User::from_value(&value).expect("valid user should parse");
        assert_eq!(user.id, id);
        assert!(user.online);

        let value = serde_json::json!({"id": id.to_string(), "name": "ada"});
        assert!(User::from_value(&value).is_none(), "missing color should not parse");
    }

    #[test]
    fn message_parses_from_value() {
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let value = serde_json::json!({
            "id": id.to_string(),
            "text": "hello",
            "user_id": user_id.to_string(),
            "user_name": "ada",
            "user_color": "f00",
            "created_at": 1000,
        });
        let msg = ChatMessage::from_value(&value).expect("valid message should parse");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.user_id, user_id);
        assert_eq!(msg.created_at, 1000);
    }
}

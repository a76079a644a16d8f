//! Server event parsing.
//!
//! Events are request-status frames the server fans out to every connected
//! client; they carry no `parent_id` because no subscriber originated them.
//! Parsing is tolerant: a frame that doesn't match a known event shape is
//! simply not an event.

use frames::{Frame, Status};

use crate::model::{ChatMessage, User};

/// A subscription event delivered by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Sent once on connect.
    Connected { client_id: String },
    MessageCreated(ChatMessage),
    UserCreated(User),
    UserPatched(User),
}

/// Interpret a frame as a server event, if it is one.
#[must_use]
pub fn parse_event(frame: &Frame) -> Option<ServerEvent> {
    if frame.status != Status::Request || frame.parent_id.is_some() {
        return None;
    }

    match frame.method.as_str() {
        "session:connected" => {
            let client_id = frame.data.get("client_id")?.as_str()?.to_string();
            Some(ServerEvent::Connected { client_id })
        }
        "messages:created" => ChatMessage::from_data(&frame.data).map(ServerEvent::MessageCreated),
        "users:created" => User::from_data(&frame.data).map(ServerEvent::UserCreated),
        "users:patched" => User::from_data(&frame.data).map(ServerEvent::UserPatched),
        _ => None,
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;

//! Renderable chat view state.
//!
//! DESIGN
//! ======
//! The view is a plain data structure the UI layer draws from: an ordered
//! feed of message and system entries, an ordered presence list, and a
//! title line. Every operation is idempotent with respect to the event
//! stream — replaying a user patch replaces the entry in place, and an
//! offline record for an unknown user is a no-op.
//!
//! System entries are client-local announcements; they are never sent to
//! the server and can be cleared wholesale.

use uuid::Uuid;

use crate::model::{ChatMessage, User};

// =============================================================================
// TYPES
// =============================================================================

/// One line in the chat feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEntry {
    Message(MessageEntry),
    System(String),
}

/// A rendered chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_color: String,
    pub text: String,
    pub created_at: i64,
    /// Whether the sender is the current user.
    pub own: bool,
}

/// One row in the presence list.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEntry {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub own: bool,
}

/// The full renderable state.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    pub title: String,
    pub feed: Vec<FeedEntry>,
    pub users: Vec<UserEntry>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

impl ChatView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the feed. A message already present (an event
    /// replaying something the history load rendered) is skipped.
    pub fn add_message(&mut self, msg: &ChatMessage, own: bool) {
        let seen = self.feed.iter().any(|entry| match entry {
            FeedEntry::Message(m) => m.id == msg.id,
            FeedEntry::System(_) => false,
        });
        if seen {
            return;
        }
        self.feed.push(FeedEntry::Message(MessageEntry {
            id: msg.id,
            user_id: msg.user_id,
            user_name: msg.user_name.clone(),
            user_color: msg.user_color.clone(),
            text: msg.text.clone(),
            created_at: msg.created_at,
            own,
        }));
    }

    /// Fold a user record into the presence list.
    ///
    /// Offline records remove the entry (announcing the departure if one was
    /// present); updates for a known id replace the entry in place; anything
    /// else appends, announcing the join when asked to.
    pub fn handle_user(&mut self, user: &User, own: bool, announce_join: bool) {
        if !user.online {
            self.remove_user(user);
            return;
        }

        let entry = UserEntry { id: user.id, name: user.name.clone(), color: user.color.clone(), own };
        if let Some(existing) = self.users.iter_mut().find(|u| u.id == user.id) {
            *existing = entry;
        } else {
            self.users.push(entry);
            if announce_join {
                self.add_system_message(format!("{} has joined the chat.", user.name));
            }
        }
    }

    /// Append a client-local announcement.
    pub fn add_system_message(&mut self, text: impl Into<String>) {
        self.feed.push(FeedEntry::System(text.into()));
    }

    /// Drop every system announcement, keeping chat messages.
    pub fn clear_system_messages(&mut self) {
        self.feed.retain(|entry| !matches!(entry, FeedEntry::System(_)));
    }

    fn remove_user(&mut self, user: &User) {
        let before = self.users.len();
        self.users.retain(|u| u.id != user.id);
        if self.users.len() < before {
            self.add_system_message(format!("{} has left the chat.", user.name));
        }
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Wall-clock `HH:mm` (UTC) for a milliseconds-since-epoch timestamp.
#[must_use]
pub fn clock_hhmm(ts_ms: i64) -> String {
    let secs = ts_ms.div_euclid(1000);
    let hours = secs.div_euclid(3600).rem_euclid(24);
    let minutes = secs.div_euclid(60).rem_euclid(60);
    format!("{hours:02}:{minutes:02}")
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;

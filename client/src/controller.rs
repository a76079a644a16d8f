//! The chat UI controller.
//!
//! ARCHITECTURE
//! ============
//! Bridges three things: input lines from the host UI, the remote service
//! behind [`ChatApi`], and the renderable [`ChatView`]. The current user is
//! owned here and passed explicitly — there is no ambient global — and the
//! session store (the cookie analog) is written on every successful
//! identity resolution.
//!
//! ERROR HANDLING
//! ==============
//! Remote failures inside command handling and submission are rendered as
//! local system messages using the user-facing message the net layer
//! computed; no retry is attempted. The leave notification is
//! fire-and-forget. Identity restore distinguishes "user no longer exists"
//! (fall back to a fresh guest) from transport errors (propagate — a flaky
//! network must not silently discard the account).

use uuid::Uuid;

use crate::error::ClientError;
use crate::model::{User, UserPatch, users_equal};
use crate::net::ChatApi;
use crate::net::events::ServerEvent;
use crate::session::SessionStore;
use crate::view::ChatView;

/// How much history to load on start.
const HISTORY_LIMIT: i64 = 200;

/// How many online users to load on start.
const USERS_LIMIT: i64 = 200;

pub struct ChatController<A: ChatApi, S: SessionStore> {
    api: A,
    store: S,
    pub view: ChatView,
    user: Option<User>,
}

impl<A: ChatApi, S: SessionStore> ChatController<A, S> {
    pub fn new(api: A, store: S) -> Self {
        Self { api, store, view: ChatView::new(), user: None }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    // =========================================================================
    // STARTUP
    // =========================================================================

    /// Resolve the user, load history and presence, greet.
    ///
    /// History arrives newest-first and is displayed oldest-first. Presence
    /// loading never announces joins — only live events do.
    ///
    /// # Errors
    ///
    /// Returns the first remote failure; a session without an identity or
    /// history is not worth starting.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        self.resolve_user().await?;

        let mut history = self.api.find_messages(HISTORY_LIMIT).await?;
        history.reverse();
        for msg in &history {
            let own = self.is_own_sender(msg.user_id);
            self.view.add_message(msg, own);
        }

        let online = self.api.find_users(Some(true), USERS_LIMIT).await?;
        for user in &online {
            let own = self.user.as_ref().is_some_and(|u| users_equal(u, user));
            self.view.handle_user(user, own, false);
        }

        let name = self.user.as_ref().map(|u| u.name.clone()).unwrap_or_default();
        self.view.add_system_message(format!("Welcome to the chat! You are {name}."));
        Ok(())
    }

    /// Restore the stored identity or mint a fresh guest.
    ///
    /// # Errors
    ///
    /// Propagates transport and unexpected server errors; only an explicit
    /// "user not found" falls back to creating a new user.
    pub async fn resolve_user(&mut self) -> Result<(), ClientError> {
        let stored = self.store.load().and_then(|id| id.parse::<Uuid>().ok());

        let Some(stored_id) = stored else {
            let user = self.api.create_user(true).await?;
            self.set_user(user);
            return Ok(());
        };

        match self.api.get_user(stored_id).await {
            Ok(user) => {
                let patch = UserPatch { online: Some(true), ..UserPatch::default() };
                let user = self.api.patch_user(user.id, &patch).await?;
                self.set_user(user);
                Ok(())
            }
            Err(ClientError::Remote(e)) if e.is_user_not_found() => {
                let user = self.api.create_user(true).await?;
                self.set_user(user);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    fn set_user(&mut self, user: User) {
        self.view.title = format!("You are {}", user.name);
        self.store.store(&user.id.to_string());
        self.user = Some(user);
    }

    fn is_own_sender(&self, sender_id: Uuid) -> bool {
        self.user.as_ref().is_some_and(|u| u.id == sender_id)
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Handle one submitted input line: a slash-command, or a chat message.
    ///
    /// The text is sent as-is — the server's validation hook owns the length
    /// rules, and its verdict comes back as a user-facing system message.
    pub async fn submit(&mut self, input: &str) {
        if self.handle_commands(input).await {
            return;
        }

        let Some(user_id) = self.user.as_ref().map(|u| u.id) else {
            self.view
                .add_system_message(format!("Error sending message: {}", ClientError::NoUser.user_message()));
            return;
        };

        if let Err(e) = self.api.create_message(input, user_id).await {
            self.view
                .add_system_message(format!("Error sending message: {}", e.user_message()));
        }
    }

    /// Dispatch a leading-slash command. Returns whether the input was
    /// consumed (suppressing the send-as-chat-message path).
    async fn handle_commands(&mut self, text: &str) -> bool {
        let Some(rest) = text.strip_prefix('/') else {
            return false;
        };

        let (command, arg) = match rest.split_once(' ') {
            Some((command, arg)) => (command, arg),
            None => (rest, ""),
        };

        match command {
            "nick" => match self.patch_self(UserPatch { name: Some(arg.to_string()), ..UserPatch::default() }).await {
                Ok(user) => {
                    self.view
                        .add_system_message(format!("Username successfully changed to: {arg}."));
                    self.set_user(user);
                }
                Err(e) => {
                    self.view
                        .add_system_message(format!("Error changing username: {}", e.user_message()));
                }
            },
            "nickcolor" => match self.patch_self(UserPatch { color: Some(arg.to_string()), ..UserPatch::default() }).await {
                Ok(_) => self.view.add_system_message("User color successfully changed."),
                Err(e) => {
                    self.view
                        .add_system_message(format!("Error changing user color: {}", e.user_message()));
                }
            },
            "clear-system" => self.view.clear_system_messages(),
            _ => {
                self.view
                    .add_system_message(format!("Unknown command: \"{command}\"."));
            }
        }

        true
    }

    async fn patch_self(&mut self, patch: UserPatch) -> Result<User, ClientError> {
        let Some(user_id) = self.user.as_ref().map(|u| u.id) else {
            return Err(ClientError::NoUser);
        };
        self.api.patch_user(user_id, &patch).await
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Fold one server event into the view. Idempotent per event.
    pub fn apply_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { .. } => {}
            ServerEvent::MessageCreated(msg) => {
                let own = self.is_own_sender(msg.user_id);
                self.view.add_message(&msg, own);
            }
            ServerEvent::UserCreated(user) | ServerEvent::UserPatched(user) => {
                let own = self.user.as_ref().is_some_and(|u| users_equal(u, &user));
                if own && user.online {
                    self.view.title = format!("You are {}", user.name);
                    self.user = Some(user.clone());
                }
                self.view.handle_user(&user, own, true);
            }
        }
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Best-effort offline notification on the way out. Failures are
    /// intentionally ignored — nothing can be escalated at this point.
    pub async fn leave(&self) {
        let Some(user_id) = self.user.as_ref().map(|u| u.id) else {
            return;
        };
        let patch = UserPatch { online: Some(false), ..UserPatch::default() };
        let _ = self.api.patch_user(user_id, &patch).await;
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

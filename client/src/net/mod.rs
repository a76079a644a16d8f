//! Remote-call layer.
//!
//! ARCHITECTURE
//! ============
//! [`ChatApi`] is the seam between the controller and the wire: the
//! controller is generic over it, tests drive it with a mock, and
//! [`socket::SocketClient`] is the production implementation speaking the
//! frame protocol over WebSocket.

pub mod events;
pub mod socket;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ClientError;
use crate::model::{ChatMessage, User, UserPatch};

/// The remote chat service: two collections, six operations.
#[async_trait]
pub trait ChatApi {
    /// Create a message owned by `user_id`. The server validates the text.
    async fn create_message(&self, text: &str, user_id: Uuid) -> Result<ChatMessage, ClientError>;

    /// Fetch the newest messages, newest first.
    async fn find_messages(&self, limit: i64) -> Result<Vec<ChatMessage>, ClientError>;

    /// Create a fresh user with a server-assigned name and color.
    async fn create_user(&self, online: bool) -> Result<User, ClientError>;

    /// Fetch a user by identifier.
    async fn get_user(&self, id: Uuid) -> Result<User, ClientError>;

    /// Apply a partial update to a user.
    async fn patch_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, ClientError>;

    /// List users, optionally filtered by the online flag.
    async fn find_users(&self, online: Option<bool>, limit: i64) -> Result<Vec<User>, ClientError>;
}

//! Chat client controller.
//!
//! ARCHITECTURE
//! ============
//! This crate is the application half of the chat client: it resolves a
//! persistent user identity, issues requests through the [`net::ChatApi`]
//! trait, folds server events into a renderable [`view::ChatView`], and
//! dispatches slash-commands. It owns no rendering — a UI layer (the
//! terminal client in `cli/`, or anything else) draws the view and feeds
//! input lines to the controller.

pub mod controller;
pub mod error;
pub mod model;
pub mod net;
pub mod session;
pub mod view;

pub use controller::ChatController;
pub use error::{ClientError, RemoteError};
pub use model::{ChatMessage, User, UserPatch, users_equal};
pub use net::ChatApi;
pub use net::events::ServerEvent;
pub use session::{MemorySession, SessionStore};
pub use view::{ChatView, FeedEntry};

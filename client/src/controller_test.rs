use super::*;
use crate::error::RemoteError;
use crate::model::ChatMessage;
use crate::view::FeedEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// =============================================================================
// MOCK API
// =============================================================================

/// In-process stand-in for the remote service. Mirrors the server's
/// validation rules closely enough to exercise the error paths.
#[derive(Clone, Default)]
struct MockApi {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    users: Mutex<HashMap<Uuid, User>>,
    sent: Mutex<Vec<(String, Uuid)>>,
    calls: Mutex<Vec<String>>,
    fail_with: Mutex<Option<ClientError>>,
}

fn unprocessable(detail: &str) -> ClientError {
    ClientError::Remote(RemoteError {
        code: Some("E_UNPROCESSABLE".into()),
        user_message: detail.into(),
        retryable: false,
    })
}

fn not_found() -> ClientError {
    ClientError::Remote(RemoteError {
        code: Some("E_USER_NOT_FOUND".into()),
        user_message: "user not found".into(),
        retryable: false,
    })
}

impl MockApi {
    fn record(&self, call: &str) {
        self.inner.calls.lock().expect("calls lock").push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().expect("calls lock").clone()
    }

    fn seed_user(&self, user: User) {
        self.inner.users.lock().expect("users lock").insert(user.id, user);
    }

    fn fail_next_with(&self, err: ClientError) {
        *self.inner.fail_with.lock().expect("fail lock") = Some(err);
    }

    fn take_failure(&self) -> Option<ClientError> {
        self.inner.fail_with.lock().expect("fail lock").take()
    }

    fn sent_messages(&self) -> Vec<(String, Uuid)> {
        self.inner.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn create_message(&self, text: &str, user_id: Uuid) -> Result<ChatMessage, ClientError> {
        self.record("create_message");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let len = text.chars().count();
        if len < 1 {
            return Err(unprocessable("text must be at least 1 character long"));
        }
        if len > 400 {
            return Err(unprocessable("text must be at most 400 characters long"));
        }
        self.inner.sent.lock().expect("sent lock").push((text.to_string(), user_id));
        Ok(ChatMessage {
            id: Uuid::new_v4(),
            text: text.to_string(),
            user_id,
            user_name: "guest-mock".into(),
            user_color: "f00".into(),
            created_at: 1000,
        })
    }

    async fn find_messages(&self, _limit: i64) -> Result<Vec<ChatMessage>, ClientError> {
        self.record("find_messages");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(Vec::new())
    }

    async fn create_user(&self, online: bool) -> Result<User, ClientError> {
        self.record("create_user");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let user = User { id: Uuid::new_v4(), name: "guest-mock".into(), color: "f00".into(), online };
        self.seed_user(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, ClientError> {
        self.record("get_user");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.inner
            .users
            .lock()
            .expect("users lock")
            .get(&id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn patch_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, ClientError> {
        self.record("patch_user");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if let Some(name) = &patch.name {
            let len = name.chars().count();
            if len < 1 {
                return Err(unprocessable("name must be at least 1 character long"));
            }
            if len > 32 {
                return Err(unprocessable("name must be at most 32 characters long"));
            }
        }
        let mut users = self.inner.users.lock().expect("users lock");
        let user = users.get_mut(&id).ok_or_else(not_found)?;
        if let Some(name) = &patch.name {
            user.name.clone_from(name);
        }
        if let Some(color) = &patch.color {
            user.color.clone_from(color);
        }
        if let Some(online) = patch.online {
            user.online = online;
        }
        Ok(user.clone())
    }

    async fn find_users(&self, _online: Option<bool>, _limit: i64) -> Result<Vec<User>, ClientError> {
        self.record("find_users");
        Ok(Vec::new())
    }
}

// =============================================================================
// SHARED SESSION
// =============================================================================

/// Session store the test can still read after the controller takes it.
#[derive(Clone, Default)]
struct SharedSession(Arc<Mutex<Option<String>>>);

impl SharedSession {
    fn with_id(id: &str) -> Self {
        Self(Arc::new(Mutex::new(Some(id.to_string()))))
    }

    fn current(&self) -> Option<String> {
        self.0.lock().expect("session lock").clone()
    }
}

impl SessionStore for SharedSession {
    fn load(&self) -> Option<String> {
        self.0.lock().expect("session lock").clone()
    }

    fn store(&mut self, user_id: &str) {
        *self.0.lock().expect("session lock") = Some(user_id.to_string());
    }
}

fn system_texts(view: &ChatView) -> Vec<&str> {
    view.feed
        .iter()
        .filter_map(|e| match e {
            FeedEntry::System(text) => Some(text.as_str()),
            FeedEntry::Message(_) => None,
        })
        .collect()
}

async fn started_controller() -> (ChatController<MockApi, SharedSession>, MockApi, SharedSession) {
    let api = MockApi::default();
    let session = SharedSession::default();
    let mut controller = ChatController::new(api.clone(), session.clone());
    controller.resolve_user().await.expect("resolve should succeed");
    (controller, api, session)
}

// =============================================================================
// IDENTITY RESOLUTION
// =============================================================================

#[tokio::test]
async fn fresh_session_creates_a_user_and_stores_the_id() {
    let api = MockApi::default();
    let session = SharedSession::default();
    let mut controller = ChatController::new(api.clone(), session.clone());

    controller.resolve_user().await.expect("resolve should succeed");

    assert_eq!(api.calls(), vec!["create_user"]);
    let user = controller.current_user().expect("user resolved");
    assert!(user.online);
    assert_eq!(session.current().as_deref(), Some(user.id.to_string().as_str()));
    assert_eq!(controller.view.title, "You are guest-mock");
}

#[tokio::test]
async fn stored_id_restores_the_user_and_marks_it_online() {
    let api = MockApi::default();
    let previous = User { id: Uuid::new_v4(), name: "ada".into(), color: "0f0".into(), online: false };
    api.seed_user(previous.clone());
    let session = SharedSession::with_id(&previous.id.to_string());
    let mut controller = ChatController::new(api.clone(), session.clone());

    controller.resolve_user().await.expect("resolve should succeed");

    assert_eq!(api.calls(), vec!["get_user", "patch_user"]);
    let user = controller.current_user().expect("user resolved");
    assert_eq!(user.id, previous.id);
    assert!(user.online, "restored user is patched online");
}

#[tokio::test]
async fn missing_stored_user_falls_back_to_a_fresh_guest() {
    let api = MockApi::default();
    let stale = Uuid::new_v4();
    let session = SharedSession::with_id(&stale.to_string());
    let mut controller = ChatController::new(api.clone(), session.clone());

    controller.resolve_user().await.expect("resolve should succeed");

    assert_eq!(api.calls(), vec!["get_user", "create_user"]);
    let user = controller.current_user().expect("user resolved");
    assert_ne!(user.id, stale);
    assert_eq!(session.current().as_deref(), Some(user.id.to_string().as_str()));
}

#[tokio::test]
async fn transport_errors_during_restore_do_not_mint_a_new_account() {
    let api = MockApi::default();
    let stored = Uuid::new_v4();
    let session = SharedSession::with_id(&stored.to_string());
    api.fail_next_with(ClientError::Transport("connection reset".into()));
    let mut controller = ChatController::new(api.clone(), session.clone());

    let err = controller.resolve_user().await.expect_err("transport error should propagate");
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    assert_eq!(api.calls(), vec!["get_user"], "no create after a transport failure");
    assert_eq!(session.current().as_deref(), Some(stored.to_string().as_str()));
    assert!(controller.current_user().is_none());
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::test]
async fn nick_renames_and_leaves_the_stored_id_unchanged() {
    let (mut controller, _api, session) = started_controller().await;
    let id_before = session.current().expect("id stored");

    controller.submit("/nick neo").await;

    let user = controller.current_user().expect("user present");
    assert_eq!(user.name, "neo");
    assert_eq!(controller.view.title, "You are neo");
    assert_eq!(session.current().as_deref(), Some(id_before.as_str()));
    assert_eq!(system_texts(&controller.view), vec!["Username successfully changed to: neo."]);
}

#[tokio::test]
async fn nick_failure_surfaces_the_validation_detail_inline() {
    let (mut controller, _api, _session) = started_controller().await;

    let long = "x".repeat(33);
    controller.submit(&format!("/nick {long}")).await;

    assert_eq!(
        system_texts(&controller.view),
        vec!["Error changing username: name must be at most 32 characters long"]
    );
    assert_eq!(controller.current_user().expect("user").name, "guest-mock");
}

#[tokio::test]
async fn nickcolor_reports_success_and_failure() {
    let (mut controller, api, _session) = started_controller().await;

    controller.submit("/nickcolor 00ff00").await;
    assert_eq!(system_texts(&controller.view), vec!["User color successfully changed."]);

    api.fail_next_with(unprocessable("color must be a 3 or 6 digit hex value"));
    controller.submit("/nickcolor chartreuse").await;
    assert_eq!(
        system_texts(&controller.view)[1],
        "Error changing user color: color must be a 3 or 6 digit hex value"
    );
}

#[tokio::test]
async fn unknown_command_announces_once_and_sends_nothing() {
    let (mut controller, api, _session) = started_controller().await;

    controller.submit("/foo").await;

    assert_eq!(system_texts(&controller.view), vec!["Unknown command: \"foo\"."]);
    assert!(api.sent_messages().is_empty(), "no chat message for a command");
    assert!(!api.calls().contains(&"create_message".to_string()));
}

#[tokio::test]
async fn clear_system_removes_announcements_locally() {
    let (mut controller, _api, _session) = started_controller().await;
    controller.view.add_system_message("Welcome to the chat! You are guest-mock.");
    controller.submit("/nick neo").await;
    assert_eq!(system_texts(&controller.view).len(), 2);

    controller.submit("/clear-system").await;
    assert!(system_texts(&controller.view).is_empty());
}

// =============================================================================
// SUBMISSION
// =============================================================================

#[tokio::test]
async fn plain_text_is_sent_with_the_current_user_id() {
    let (mut controller, api, _session) = started_controller().await;
    let user_id = controller.current_user().expect("user").id;

    controller.submit("hello there").await;

    assert_eq!(api.sent_messages(), vec![("hello there".to_string(), user_id)]);
}

#[tokio::test]
async fn empty_text_is_sent_and_the_server_rejection_is_surfaced() {
    let (mut controller, api, _session) = started_controller().await;

    controller.submit("").await;

    assert_eq!(api.calls().last().map(String::as_str), Some("create_message"));
    assert!(api.sent_messages().is_empty(), "hook rejects before persistence");
    assert_eq!(
        system_texts(&controller.view),
        vec!["Error sending message: text must be at least 1 character long"]
    );
}

// =============================================================================
// EVENTS
// =============================================================================

#[tokio::test]
async fn message_events_flag_the_current_user_as_sender() {
    let (mut controller, _api, _session) = started_controller().await;
    let own_id = controller.current_user().expect("user").id;

    let own = ChatMessage {
        id: Uuid::new_v4(),
        text: "mine".into(),
        user_id: own_id,
        user_name: "guest-mock".into(),
        user_color: "f00".into(),
        created_at: 1000,
    };
    let other = ChatMessage { id: Uuid::new_v4(), user_id: Uuid::new_v4(), ..own.clone() };

    controller.apply_event(ServerEvent::MessageCreated(own));
    controller.apply_event(ServerEvent::MessageCreated(other));

    let flags: Vec<bool> = controller
        .view
        .feed
        .iter()
        .filter_map(|e| match e {
            FeedEntry::Message(m) => Some(m.own),
            FeedEntry::System(_) => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn own_patched_event_refreshes_the_title() {
    let (mut controller, _api, _session) = started_controller().await;
    let mut me = controller.current_user().expect("user").clone();
    me.name = "renamed-elsewhere".into();

    controller.apply_event(ServerEvent::UserPatched(me));

    assert_eq!(controller.view.title, "You are renamed-elsewhere");
    assert_eq!(controller.current_user().expect("user").name, "renamed-elsewhere");
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[tokio::test]
async fn leave_is_best_effort_and_ignores_failures() {
    let (controller, api, _session) = started_controller().await;

    api.fail_next_with(ClientError::Transport("gone".into()));
    controller.leave().await;

    assert_eq!(api.calls().last().map(String::as_str), Some("patch_user"));
}

#[tokio::test]
async fn leave_without_a_user_is_a_no_op() {
    let api = MockApi::default();
    let controller = ChatController::new(api.clone(), SharedSession::default());

    controller.leave().await;

    assert!(api.calls().is_empty());
}

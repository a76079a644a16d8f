//! Domain services used by the websocket dispatch layer.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so the frame
//! dispatch layer can stay focused on protocol translation and fan-out.

pub mod message;
pub mod user;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

//! Event — the wire envelope for `boardroom` realtime traffic.
//!
//! ARCHITECTURE
//! ============
//! Every WebSocket message in either direction is an Event: a name plus a
//! JSON payload. Clients send `chat:*` / `profile:*` / `board:*` events, the
//! server dispatches on the name prefix, and server-initiated traffic
//! (broadcasts, history, errors) flows back in the same envelope.
//!
//! DESIGN
//! ======
//! - The payload is an untyped `serde_json::Value`; handlers pull out the
//!   fields they need and ignore the rest.
//! - Board mutations reuse the envelope with dotted names (`column.created`)
//!   so REST-originated broadcasts and socket traffic share one type.
//! - Errors are plain `error` events carrying `message` and, when the source
//!   was a typed service error, a grepable `code`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Payload key carrying the human-readable error message.
pub const EVENT_MESSAGE: &str = "message";

/// Payload key carrying the stable `E_*` error code.
pub const EVENT_CODE: &str = "code";

// =============================================================================
// TYPES
// =============================================================================

/// The wire envelope: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Event {
    /// Create an event with an arbitrary payload.
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self { name: name.into(), data }
    }

    /// Create an `error` event from a plain string.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", serde_json::json!({ EVENT_MESSAGE: message.into() }))
    }

    /// Create a structured `error` event from a typed service error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::new(
            "error",
            serde_json::json!({
                EVENT_CODE: err.error_code(),
                EVENT_MESSAGE: err.to_string(),
            }),
        )
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Event {
    /// Extract the name prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.name.split_once(':') else {
            return &self.name;
        };
        prefix
    }

    /// Extract the operation (everything after the first ':').
    #[must_use]
    pub fn op(&self) -> &str {
        let Some((_, op)) = self.name.split_once(':') else {
            return "";
        };
        op
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Per-user notification records (`notifications/<uid>/<id>`).
//!
//! # Invariants
//! - `read` only ever moves from `false` to `true`.
//! - Records are never validated beyond presence; gaps decode to defaults.

use super::{flag, millis, opt_text, text};
use serde_json::{json, Map, Value};

pub const DEFAULT_ICON: &str = "🔔";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Store key of the record.
    pub id: String,
    /// `type` field, e.g. `new-feedback`.
    pub kind: Option<String>,
    pub message: String,
    pub read: bool,
    /// Epoch milliseconds (`ts`, or legacy `timestamp`).
    pub ts: i64,
    pub link: Option<String>,
}

impl NotificationRecord {
    pub fn from_value(id: &str, record: &Value) -> Self {
        let ts = if record.get("ts").is_some() {
            millis(record, "ts")
        } else {
            millis(record, "timestamp")
        };
        Self {
            id: id.to_string(),
            kind: opt_text(record, "type"),
            message: text(record, "message"),
            read: flag(record, "read"),
            ts,
            link: opt_text(record, "link"),
        }
    }

    pub fn icon(&self) -> &'static str {
        icon_for(self.kind.as_deref())
    }

    /// Fragment to dispatch when the record is activated.
    pub fn target_fragment(&self) -> Option<String> {
        self.link.as_deref().map(|link| {
            if link.starts_with('#') {
                link.to_string()
            } else {
                format!("#{link}")
            }
        })
    }
}

/// Icon for a notification type; unknown or missing types get [`DEFAULT_ICON`].
pub fn icon_for(kind: Option<&str>) -> &'static str {
    match kind {
        Some("new-feedback") => "💬",
        Some("comment") => "🗨️",
        Some("reaction") => "👍",
        Some("new-lesson") => "📚",
        Some("new-signup") => "🆕",
        _ => DEFAULT_ICON,
    }
}

/// Compact relative age: `42s`, `5m`, `3h`, `2d`.
pub fn time_ago(ts: i64, now: i64) -> String {
    let seconds = now.saturating_sub(ts).max(0) / 1000;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h");
    }
    format!("{}d", hours / 24)
}

/// List filter of the notifications view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
}

impl NotificationFilter {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("unread") {
            Self::Unread
        } else {
            Self::All
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unread => "unread",
        }
    }

    pub fn admits(self, record: &NotificationRecord) -> bool {
        match self {
            Self::All => true,
            Self::Unread => !record.read,
        }
    }
}

/// Payload for a new notification; `read` and `ts` are stamped on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn to_record(&self, now: i64) -> Value {
        let mut record = Map::new();
        record.insert("type".to_string(), json!(self.kind));
        record.insert("message".to_string(), json!(self.message));
        if let Some(link) = &self.link {
            record.insert("link".to_string(), json!(link));
        }
        record.insert("read".to_string(), json!(false));
        record.insert("ts".to_string(), json!(now));
        Value::Object(record)
    }
}

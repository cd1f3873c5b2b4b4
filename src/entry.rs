use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A scheduled briefing, unique by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub title: String,
    pub fire_time: DateTime<Local>,
    pub weather: bool,
    pub news: bool,
}

/// Item of the notification feed. `content` may carry already sanitized markup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub content: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Display row for a pending alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAlarm {
    pub title: String,
    pub content: String,
}

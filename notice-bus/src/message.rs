//! Notification message envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NotificationType {
    /// Inbox message ("your answer was accepted")
    Inbox = 1,
    /// Achievement feed (reputation changed)
    Achievement = 2,
}

impl NotificationType {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Inbox => "inbox",
            NotificationType::Achievement => "achievement",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification produced after a ledger transaction commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMsg {
    /// Message ID (UUIDv7 for ordering)
    pub id: Uuid,

    /// User whose action caused the notification (absent for system actions)
    pub trigger_user_id: Option<String>,

    /// User who receives the notification
    pub receiver_user_id: String,

    /// Inbox or achievement
    pub notification_type: NotificationType,

    /// Content the notification points at
    pub object_id: String,

    /// Kind of that content (question, answer, ...)
    pub object_type: String,

    /// Inbox action, e.g. `accept_answer`
    pub action: Option<String>,

    /// Reputation change carried by an achievement
    pub rank: i64,

    /// Enqueue timestamp
    pub created_at: DateTime<Utc>,
}

impl NotificationMsg {
    /// Create a new message
    pub fn new(
        notification_type: NotificationType,
        receiver_user_id: impl Into<String>,
        object_id: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            trigger_user_id: None,
            receiver_user_id: receiver_user_id.into(),
            notification_type,
            object_id: object_id.into(),
            object_type: object_type.into(),
            action: None,
            rank: 0,
            created_at: Utc::now(),
        }
    }

    /// Achievement message
    pub fn achievement(
        receiver_user_id: impl Into<String>,
        object_id: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self::new(NotificationType::Achievement, receiver_user_id, object_id, object_type)
    }

    /// Inbox message
    pub fn inbox(
        receiver_user_id: impl Into<String>,
        object_id: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self::new(NotificationType::Inbox, receiver_user_id, object_id, object_type)
    }

    /// Set the triggering user
    pub fn with_trigger(mut self, trigger_user_id: impl Into<String>) -> Self {
        self.trigger_user_id = Some(trigger_user_id.into());
        self
    }

    /// Set the inbox action
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the reputation change
    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = rank;
        self
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

//! Message protocol between the automation and its peers.
//!
//! Requests come in from a coordinator or UI and are answered synchronously;
//! notifications go out to the coordinator while a deletion job runs. Both
//! are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "GET_STATUS"}
//! {"type": "DELETE_PROGRESS", "current": 3, "total": 10}
//! ```
//!
//! Notifications are fire-and-forget: a peer that fails to acknowledge is
//! logged and otherwise ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::SweepResult;
use crate::selection::SelectionView;

/// Reply to a request the automation cannot decode
pub const UNKNOWN_MESSAGE: &str = "Unknown message type";

// =============================================================================
// REQUESTS
// =============================================================================

/// Inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Report mode, selection size, item count and job state
    GetStatus,
    /// Flip automation mode
    ToggleMode,
}

/// Answer to [`Request::GetStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Automation mode
    pub enabled: bool,
    /// Selection size
    pub selected_count: usize,
    /// Entries currently on the page
    pub total_items: usize,
    /// Whether a deletion job is running
    pub is_deleting: bool,
}

/// Reply to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Status report
    Status(StatusReport),
    /// Acknowledgement of a mode toggle
    Toggled {
        /// Always true once handled
        success: bool,
    },
    /// Undecodable request
    Error {
        /// Reason
        error: String,
    },
}

impl Response {
    /// Reply for an undecodable request
    #[must_use]
    pub fn unknown() -> Self {
        Self::Error {
            error: UNKNOWN_MESSAGE.to_string(),
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Outbound job lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// A job started over `count` items
    DeleteStarted {
        /// Items in the job
        count: usize,
    },
    /// One more item reached a terminal state
    DeleteProgress {
        /// Items processed so far
        current: usize,
        /// Items in the job
        total: usize,
    },
    /// The job ran to the end
    DeleteCompleted {
        /// Items removed
        count: usize,
    },
    /// The job was cancelled
    DeleteCancelled {
        /// Items removed before the cancel took effect
        #[serde(rename = "deletedCount")]
        deleted_count: usize,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteStarted { count } => write!(f, "DELETE_STARTED count={count}"),
            Self::DeleteProgress { current, total } => {
                write!(f, "DELETE_PROGRESS {current}/{total}")
            }
            Self::DeleteCompleted { count } => write!(f, "DELETE_COMPLETED count={count}"),
            Self::DeleteCancelled { deleted_count } => {
                write!(f, "DELETE_CANCELLED deletedCount={deleted_count}")
            }
        }
    }
}

/// Peer that receives job notifications
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: Notification) -> SweepResult<()>;
}

/// Coordinator that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCoordinator;

#[async_trait]
impl Coordinator for NullCoordinator {
    async fn notify(&self, _notification: Notification) -> SweepResult<()> {
        Ok(())
    }
}

/// Deliver a notification, logging instead of failing
pub async fn send(coordinator: &dyn Coordinator, notification: Notification) {
    tracing::debug!(%notification, "notify coordinator");
    if let Err(err) = coordinator.notify(notification).await {
        tracing::warn!(%notification, error = %err, "coordinator did not acknowledge");
    }
}

// =============================================================================
// UI NOTICES
// =============================================================================

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Something worked
    Success,
    /// Neutral information
    Info,
    /// Request refused or nothing to do
    Warning,
    /// Something broke
    Error,
}

/// User-facing notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Message text
    pub text: String,
}

impl Notice {
    /// Success notice
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    /// Info notice
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    /// Warning notice
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    /// Error notice
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Render target for selection state and notices
pub trait UiSink: Send + Sync {
    /// Selection changed
    fn refresh(&self, view: SelectionView);

    /// Show a notice
    fn notice(&self, notice: Notice);
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl UiSink for LogSink {
    fn refresh(&self, view: SelectionView) {
        tracing::debug!(count = view.count, can_delete = view.can_delete, "selection view");
    }

    fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => tracing::info!("{}", notice.text),
            NoticeLevel::Warning => tracing::warn!("{}", notice.text),
            NoticeLevel::Error => tracing::error!("{}", notice.text),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod request_tests {
        use super::*;

        #[test]
        fn test_decode_requests() {
            let get: Request = serde_json::from_value(json!({"type": "GET_STATUS"})).unwrap();
            let toggle: Request = serde_json::from_value(json!({"type": "TOGGLE_MODE"})).unwrap();
            assert_eq!(get, Request::GetStatus);
            assert_eq!(toggle, Request::ToggleMode);
        }

        #[test]
        fn test_unknown_type_rejected() {
            assert!(serde_json::from_value::<Request>(json!({"type": "NUKE"})).is_err());
            assert!(serde_json::from_value::<Request>(json!({})).is_err());
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_status_wire_shape() {
            let response = Response::Status(StatusReport {
                enabled: true,
                selected_count: 2,
                total_items: 7,
                is_deleting: false,
            });
            assert_eq!(
                serde_json::to_value(response).unwrap(),
                json!({"enabled": true, "selectedCount": 2, "totalItems": 7, "isDeleting": false})
            );
        }

        #[test]
        fn test_toggle_and_error_shapes() {
            assert_eq!(
                serde_json::to_value(Response::Toggled { success: true }).unwrap(),
                json!({"success": true})
            );
            assert_eq!(
                serde_json::to_value(Response::unknown()).unwrap(),
                json!({"error": "Unknown message type"})
            );
        }
    }

    mod notification_tests {
        use super::*;

        #[test]
        fn test_notification_wire_shapes() {
            assert_eq!(
                serde_json::to_value(Notification::DeleteStarted { count: 4 }).unwrap(),
                json!({"type": "DELETE_STARTED", "count": 4})
            );
            assert_eq!(
                serde_json::to_value(Notification::DeleteProgress { current: 1, total: 4 }).unwrap(),
                json!({"type": "DELETE_PROGRESS", "current": 1, "total": 4})
            );
            assert_eq!(
                serde_json::to_value(Notification::DeleteCancelled { deleted_count: 2 }).unwrap(),
                json!({"type": "DELETE_CANCELLED", "deletedCount": 2})
            );
        }

        #[test]
        fn test_notification_display() {
            let n = Notification::DeleteProgress { current: 3, total: 10 };
            assert_eq!(n.to_string(), "DELETE_PROGRESS 3/10");
        }

        #[tokio::test]
        async fn test_send_swallows_errors() {
            struct Broken;

            #[async_trait]
            impl Coordinator for Broken {
                async fn notify(&self, _n: Notification) -> SweepResult<()> {
                    Err(crate::result::SweepError::page("peer gone"))
                }
            }

            send(&Broken, Notification::DeleteCompleted { count: 1 }).await;
        }
    }
}

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::log::ActivityLog;

/// Explicit per-user session state. One question is in flight at a time;
/// components receive the session by reference instead of reaching for
/// globals.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub log: ActivityLog,
    pub created_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            log: ActivityLog::default(),
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            log: ActivityLog::new(capacity),
            ..Self::new()
        }
    }

    /// Handle for user-initiated cancellation; aborts at the next suspension
    /// point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

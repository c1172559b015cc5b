// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Publish/subscribe surface for queue status and user notices.

use std::fmt;

use serde::Serialize;
use tally_core::{FailedRequest, QueuedRequest};
use tokio::sync::{broadcast, watch};

/// Notices buffered per subscriber before the oldest are dropped.
const NOTICE_CAPACITY: usize = 64;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Conflict,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Conflict => "conflict",
            NoticeLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// A message meant for the person using the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Conflict,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Snapshot of both queues.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatus {
    pub pending: Vec<QueuedRequest>,
    pub failed: Vec<FailedRequest>,
}

impl QueueStatus {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Fan-out hub for status snapshots and notices.
///
/// Status is a latest-value channel: late subscribers see the current
/// snapshot immediately. Notices are a stream: subscribers only see
/// notices sent after they subscribed.
pub struct SyncEvents {
    status_tx: watch::Sender<QueueStatus>,
    notice_tx: broadcast::Sender<Notice>,
}

impl SyncEvents {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(QueueStatus::default());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        SyncEvents {
            status_tx,
            notice_tx,
        }
    }

    /// Replace the current snapshot. Subscribers wake only if it differs.
    pub fn publish_status(&self, status: QueueStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// The most recently published snapshot.
    pub fn status(&self) -> QueueStatus {
        self.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<QueueStatus> {
        self.status_tx.subscribe()
    }

    /// Send a notice to every current subscriber and to the log.
    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(notice = %notice.message, "sync notice"),
            NoticeLevel::Conflict => tracing::warn!(notice = %notice.message, "sync conflict"),
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "sync error"),
        }
        // No subscribers is not an error.
        let _ = self.notice_tx.send(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }
}

impl Default for SyncEvents {
    fn default() -> Self {
        SyncEvents::new()
    }
}

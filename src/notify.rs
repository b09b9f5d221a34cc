use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Toast-style transient notifications for the operator. Handed to the
/// orchestrator at construction so tests can substitute a recorder.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn failure(&self, message: &str);
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Failure,
}

/// Buffers notices until the panel drains them, logging each as it
/// lands so headless runs still surface outcomes.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    pending: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        match self.pending.lock() {
            Ok(mut guard) => guard.split_off(0),
            Err(_) => Vec::new(),
        }
    }

    fn push(&self, kind: NoticeKind, message: &str) {
        let notice = Notice {
            id: Uuid::new_v4(),
            kind,
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        if let Ok(mut guard) = self.pending.lock() {
            guard.push(notice);
        }
    }
}

impl Notifier for NoticeBoard {
    fn success(&self, message: &str) {
        info!(target = "bookstall.panel", "{message}");
        self.push(NoticeKind::Success, message);
    }

    fn failure(&self, message: &str) {
        error!(target = "bookstall.panel", "{message}");
        self.push(NoticeKind::Failure, message);
    }
}

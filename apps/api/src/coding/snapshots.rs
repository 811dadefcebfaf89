//! Autosave history of in-progress code, one bounded list per session.
//!
//! History outlives the realtime channel so a client can resume after a
//! disconnect; it lives as long as the process.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

pub const MAX_SNAPSHOTS: usize = 20;
/// Growth in characters that forces a capture.
pub const SIZE_DELTA_CHARS: usize = 50;
/// Time since the last capture that forces a capture.
pub const CAPTURE_INTERVAL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeSnapshot {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub cursor: Value,
}

/// Debounce rule for autosave: capture the first edit, any edit that grew the
/// code by at least `SIZE_DELTA_CHARS`, or any edit at least
/// `CAPTURE_INTERVAL_SECS` after the latest capture.
pub fn should_capture(latest: Option<&CodeSnapshot>, code: &str, now: DateTime<Utc>) -> bool {
    let Some(latest) = latest else {
        return true;
    };
    let grown = code
        .chars()
        .count()
        .saturating_sub(latest.code.chars().count());
    grown >= SIZE_DELTA_CHARS || now - latest.timestamp >= Duration::seconds(CAPTURE_INTERVAL_SECS)
}

#[derive(Default)]
pub struct SnapshotStore {
    sessions: RwLock<HashMap<String, VecDeque<CodeSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty history for `session_id` unless one already exists.
    pub async fn ensure_session(&self, session_id: &str) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default();
    }

    /// Applies the capture policy to an edit. Returns whether a snapshot was taken.
    pub async fn record_edit(
        &self,
        session_id: &str,
        code: &str,
        cursor: Value,
        now: DateTime<Utc>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();

        if !should_capture(history.back(), code, now) {
            return false;
        }

        history.push_back(CodeSnapshot {
            code: code.to_string(),
            timestamp: now,
            cursor,
        });
        while history.len() > MAX_SNAPSHOTS {
            history.pop_front();
        }
        true
    }

    /// Snapshot history of a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Vec<CodeSnapshot> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }
}

//! Live realtime connections, keyed by session id.
//!
//! At most one connection per session: registering a session id again
//! replaces the previous entry. Each entry carries a connection id so a
//! superseded channel cannot remove or mutate its successor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::coding::proctor::PasteEvent;
use crate::coding::protocol::ServerEvent;

pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
pub struct SessionConnection {
    pub connection_id: Uuid,
    pub task_id: String,
    /// Outbound queue drained by the channel's writer task.
    pub outbox: Outbox,
    pub last_code: String,
    pub last_activity: DateTime<Utc>,
    pub paste_events: Vec<PasteEvent>,
    pub tab_switches: u32,
}

impl SessionConnection {
    pub fn new(task_id: &str, outbox: Outbox) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            outbox,
            last_code: String::new(),
            last_activity: Utc::now(),
            paste_events: Vec::new(),
            tab_switches: 0,
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    connections: RwLock<HashMap<String, SessionConnection>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection, returning the one it replaced, if any.
    pub async fn register(
        &self,
        session_id: &str,
        connection: SessionConnection,
    ) -> Option<SessionConnection> {
        self.connections
            .write()
            .await
            .insert(session_id.to_string(), connection)
    }

    /// Removes the session's connection if it is still `connection_id`.
    pub async fn remove(&self, session_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(session_id) {
            Some(conn) if conn.connection_id == connection_id => {
                connections.remove(session_id);
                true
            }
            _ => false,
        }
    }

    /// Runs `f` on the session's connection when it is still `connection_id`.
    pub async fn with_connection<R>(
        &self,
        session_id: &str,
        connection_id: Uuid,
        f: impl FnOnce(&mut SessionConnection) -> R,
    ) -> Option<R> {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(session_id)
            .filter(|conn| conn.connection_id == connection_id)
            .map(f)
    }

    /// Outbound queue of the session's connection when it is still
    /// `connection_id`. Takes only the read lock.
    pub async fn outbox(&self, session_id: &str, connection_id: Uuid) -> Option<Outbox> {
        self.connections
            .read()
            .await
            .get(session_id)
            .filter(|conn| conn.connection_id == connection_id)
            .map(|conn| conn.outbox.clone())
    }

    pub async fn is_current(&self, session_id: &str, connection_id: Uuid) -> bool {
        self.connections
            .read()
            .await
            .get(session_id)
            .is_some_and(|conn| conn.connection_id == connection_id)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }
}

//! Bridge connection tracking and management.
//!
//! - `WsConnectionManager`: tracks every active bridge connection and its channel
//! - `ConnectionGuard`: RAII guard for automatic cleanup on disconnect

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

struct ConnectionInfo {
    channel: String,
    opened_at: Instant,
}

/// Manages all active bridge connections.
///
/// Uses hierarchical cancellation tokens so shutdown can force-close every
/// connection at once.
pub struct WsConnectionManager {
    connections: DashMap<String, ConnectionInfo>,
    next_id: AtomicU64,
    /// Wrapped in RwLock so it can be replaced after close_all().
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a connection for `channel` and returns its cleanup guard.
    pub fn register(self: &Arc<Self>, channel: &str) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn_id = format!("ws-{}", id);
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            conn_id.clone(),
            ConnectionInfo {
                channel: channel.to_string(),
                opened_at: Instant::now(),
            },
        );
        log::info!(
            "[WS] Connection registered: {} channel={} (total: {})",
            conn_id,
            channel,
            self.connections.len()
        );

        ConnectionGuard {
            id: conn_id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        if let Some((_, info)) = self.connections.remove(id) {
            log::info!(
                "[WS] Connection unregistered: {} channel={} after {:?} (remaining: {})",
                id,
                info.channel,
                info.opened_at.elapsed(),
                self.connections.len()
            );
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Active connections grouped by channel, ordered by channel id.
    #[must_use]
    pub fn channel_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.connections.iter() {
            *counts.entry(entry.value().channel.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Force-closes all connections.
    ///
    /// After cancellation a fresh token is installed, so new connections are
    /// still accepted. Returns the number of connections signaled.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
            let mut guard = self.global_cancel.write();
            guard.cancel();
            *guard = CancellationToken::new();
        } else {
            log::info!("[WS] close_all called but no connections to close");
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters a connection when dropped, even if the handler panics.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    /// Cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the cancellation token for this connection.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}

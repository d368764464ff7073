//! Push fan-out for the team ranking
//!
//! Tracks every open push connection and delivers each published view to
//! all of them. A view is serialized once per publish and the same payload
//! is handed to every connection.
//!
//! Each connection owns a bounded outbound queue. A subscriber that falls
//! behind loses its oldest queued views, never the newest, so whatever it
//! reads last is the current ranking.
//!
//! Flow: connect → receive current view → receive every later publish.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use types::leaderboard::TeamBalance;

/// Unique connection identifier.
pub type ConnectionId = u64;

/// Serialized view, shared by every connection it is sent to
pub type Payload = Utf8Bytes;

/// Type-tagged push message: `{"type":"teams","data":[...]}`
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PushMessage<'a> {
    Teams(&'a [TeamBalance]),
}

impl PushMessage<'_> {
    pub fn encode(&self) -> Result<Payload, serde_json::Error> {
        serde_json::to_string(self).map(Payload::from)
    }
}

/// Outcome of queueing one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enqueued {
    Queued,
    /// Queue was full; the oldest payload made room
    DroppedOldest,
    Closed,
}

/// Bounded outbound queue shared by a connection and the broadcaster
struct Outbox {
    queue: Mutex<VecDeque<Payload>>,
    capacity: usize,
    ready: Notify,
    open: AtomicBool,
    dropped: AtomicU64,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ready: Notify::new(),
            open: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Payload>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn push(&self, payload: Payload) -> Enqueued {
        if !self.is_open() {
            return Enqueued::Closed;
        }

        let mut queue = self.lock();
        let outcome = if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            Enqueued::DroppedOldest
        } else {
            Enqueued::Queued
        };
        queue.push_back(payload);
        drop(queue);

        self.ready.notify_one();
        outcome
    }

    fn pop(&self) -> Option<Payload> {
        if !self.is_open() {
            return None;
        }
        self.lock().pop_front()
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.lock().clear();
        self.ready.notify_one();
    }
}

/// Subscriber side of a registered connection
pub struct Connection {
    id: ConnectionId,
    outbox: Arc<Outbox>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next payload to write to the channel. `None` once the connection is
    /// closed.
    pub async fn recv(&mut self) -> Option<Payload> {
        loop {
            if !self.outbox.is_open() {
                return None;
            }
            if let Some(payload) = self.outbox.pop() {
                return Some(payload);
            }
            // A notify_one issued before this point leaves a permit behind
            self.outbox.ready.notified().await;
        }
    }

    /// Non-blocking variant of `recv`
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.outbox.pop()
    }

    /// Mark the channel as closing; publishes skip it from now on
    pub fn close(&self) {
        self.outbox.close();
    }

    pub fn is_open(&self) -> bool {
        self.outbox.is_open()
    }

    /// Views discarded because this subscriber fell behind
    pub fn dropped(&self) -> u64 {
        self.outbox.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.outbox.close();
    }
}

struct LatestView {
    teams: Arc<Vec<TeamBalance>>,
    payload: Payload,
}

/// Live connection set plus the most recently published view
pub struct Broadcaster {
    connections: DashMap<ConnectionId, Arc<Outbox>>,
    /// Held exclusively by `publish` and `connect` so a new connection can
    /// never observe an older view after a newer one
    latest: RwLock<LatestView>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    /// `buffer` is the per-connection outbound queue length
    pub fn new(buffer: usize) -> Self {
        let teams = Vec::new();
        let payload = PushMessage::Teams(&teams)
            .encode()
            .unwrap_or_else(|_| Payload::from(r#"{"type":"teams","data":[]}"#.to_string()));

        Self {
            connections: DashMap::new(),
            latest: RwLock::new(LatestView {
                teams: Arc::new(teams),
                payload,
            }),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a connection and queue the current view for it
    pub fn connect(&self) -> Connection {
        let latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let outbox = Arc::new(Outbox::new(self.buffer));
        outbox.push(latest.payload.clone());
        self.connections.insert(id, Arc::clone(&outbox));
        drop(latest);

        info!(
            connection_id = id,
            connections = self.connections.len(),
            "Client connected"
        );

        Connection { id, outbox }
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, outbox)) => {
                outbox.close();
                info!(
                    connection_id = id,
                    connections = self.connections.len(),
                    "Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Make `teams` the current view and push it to every open connection.
    ///
    /// Returns the number of connections the payload was queued for.
    pub fn publish(&self, teams: Vec<TeamBalance>) -> usize {
        let payload = match PushMessage::Teams(&teams).encode() {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "Failed to serialize view, keeping previous one");
                return 0;
            }
        };

        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = LatestView {
            teams: Arc::new(teams),
            payload: payload.clone(),
        };

        let mut delivered = 0;
        for entry in self.connections.iter() {
            match entry.value().push(payload.clone()) {
                Enqueued::Queued => delivered += 1,
                Enqueued::DroppedOldest => {
                    warn!(
                        connection_id = *entry.key(),
                        "Outbound queue full, dropped oldest update"
                    );
                    delivered += 1;
                }
                Enqueued::Closed => {
                    debug!(connection_id = *entry.key(), "Connection closed, skipping");
                }
            }
        }
        drop(latest);

        debug!(delivered, "View published");
        delivered
    }

    /// Most recently published view
    pub fn latest(&self) -> Arc<Vec<TeamBalance>> {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&latest.teams)
    }

    /// Serialized form of `latest`
    pub fn latest_payload(&self) -> Payload {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .payload
            .clone()
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

// Frames queued per client before a slow consumer counts as a failed write.
const CLIENT_BUFFER: usize = 16;

/// One server-push frame; rendered on the wire as
/// `event: <name>\ndata: <json>\n\n`.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub event: String,
    pub data: Value,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

impl std::fmt::Display for SseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastStats {
    pub connected_clients: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

struct ClientHandle {
    sink: mpsc::Sender<SseFrame>,
    connected_at: DateTime<Utc>,
    heartbeat: JoinHandle<()>,
}

/// Registry of open dashboard connections. Broadcast is fire-and-forget per
/// subscriber: a failed write drops the client immediately, nothing is
/// buffered beyond the per-client channel and nothing is retried.
pub struct BroadcastHub {
    clients: RwLock<HashMap<String, ClientHandle>>,
    heartbeat_interval: Duration,
    started_at: Instant,
}

impl BroadcastHub {
    pub fn new(heartbeat_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            heartbeat_interval,
            started_at: Instant::now(),
        })
    }

    /// Allocates a client id and channel pair and registers the sender side.
    pub async fn open_client(self: &Arc<Self>) -> (String, mpsc::Receiver<SseFrame>) {
        let client_id = Uuid::new_v4().to_string();
        let (sink, receiver) = mpsc::channel(CLIENT_BUFFER);
        self.register(client_id.clone(), sink).await;
        (client_id, receiver)
    }

    /// Stores the sink, writes the `connected` handshake frame and starts
    /// the per-client heartbeat. The heartbeat timer is cancelled by the
    /// same path that unregisters the client.
    pub async fn register(self: &Arc<Self>, client_id: String, sink: mpsc::Sender<SseFrame>) {
        let connected_at = Utc::now();
        let handshake = SseFrame::new(
            "connected",
            json!({ "clientId": client_id, "timestamp": connected_at.to_rfc3339() }),
        );
        if sink.try_send(handshake).is_err() {
            tracing::warn!(client_id = %client_id, "handshake write failed, client not registered");
            return;
        }

        let hub = Arc::downgrade(self);
        let heartbeat_id = client_id.clone();
        let interval = self.heartbeat_interval;
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else { break };
                let frame =
                    SseFrame::new("heartbeat", json!({ "timestamp": Utc::now().to_rfc3339() }));
                if !hub.send_to(&heartbeat_id, frame).await {
                    break;
                }
            }
        });

        let mut clients = self.clients.write().await;
        if let Some(replaced) = clients.insert(
            client_id.clone(),
            ClientHandle {
                sink,
                connected_at,
                heartbeat,
            },
        ) {
            // re-registering an id must not leave the old timer ticking
            replaced.heartbeat.abort();
        }
        tracing::info!(client_id = %client_id, "broadcast client registered");
    }

    /// Idempotent; safe to invoke from both a close callback and a failed
    /// write. Returns whether the client was still registered.
    pub async fn unregister(&self, client_id: &str) -> bool {
        let removed = self.clients.write().await.remove(client_id);
        match removed {
            Some(handle) => {
                handle.heartbeat.abort();
                tracing::info!(
                    client_id = %client_id,
                    connected_at = %handle.connected_at.to_rfc3339(),
                    "broadcast client unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Writes one frame to every registered client and returns the number
    /// delivered. Any client whose write fails is removed on the spot.
    pub async fn broadcast(&self, event: &str, data: Value) -> usize {
        let frame = SseFrame::new(event, data);
        let targets: Vec<(String, mpsc::Sender<SseFrame>)> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .map(|(id, handle)| (id.clone(), handle.sink.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (client_id, sink) in targets {
            match sink.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(client_id),
            }
        }
        for client_id in dead {
            tracing::warn!(client_id = %client_id, "broadcast write failed, dropping client");
            self.unregister(&client_id).await;
        }
        delivered
    }

    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            connected_clients: self.clients.read().await.len(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }

    async fn send_to(&self, client_id: &str, frame: SseFrame) -> bool {
        let sink = {
            let clients = self.clients.read().await;
            clients.get(client_id).map(|handle| handle.sink.clone())
        };
        let Some(sink) = sink else { return false };
        if sink.try_send(frame).is_err() {
            self.unregister(client_id).await;
            return false;
        }
        true
    }
}

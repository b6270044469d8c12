//! Hub: the single serialization point between connections and the simulation
//!
//! One task owns the registry map and consumes a `HubEvent` queue. Connect,
//! disconnect, inbound frames and broadcast fan-out all pass through that one
//! consumer, so the registry is never touched concurrently and needs no lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SendPolicy;
use crate::game::GameCommand;

/// Capacity of the hub event queue
pub const HUB_EVENT_CAPACITY: usize = 256;

/// Events consumed by the hub task
#[derive(Debug)]
pub enum HubEvent {
    /// Register a new connection and reply with its assigned identity
    Register {
        outbound: mpsc::Sender<Bytes>,
        /// Dropped by the hub to stop the connection's outbound loop
        shutdown: oneshot::Sender<()>,
        reply: oneshot::Sender<i32>,
    },
    /// Remove a connection; idempotent since teardown can race fan-out
    Unregister { client_id: i32 },
    /// An inbound frame to append to the simulation command stream
    Inbound { client_id: i32, payload: Bytes },
    /// Deliver a snapshot payload to every registered connection
    Broadcast { payload: Bytes },
    /// Deliver a payload to a single connection, if still present
    Unicast { client_id: i32, payload: Bytes },
}

/// Error returned when the hub task is no longer running
#[derive(Debug, thiserror::Error)]
#[error("hub event loop has shut down")]
pub struct HubClosed;

/// Registry entry for one connection. Dropping it closes the outbound loop.
struct ClientEntry {
    outbound: mpsc::Sender<Bytes>,
    _shutdown: oneshot::Sender<()>,
}

/// The hub task state. Only `run` ever touches `registry`.
pub struct Hub {
    events_rx: mpsc::Receiver<HubEvent>,
    registry: HashMap<i32, ClientEntry>,
    /// Monotonically increasing; identities are never reused
    next_client_id: i32,
    cmd_tx: mpsc::Sender<GameCommand>,
    send_policy: SendPolicy,
    connection_count: Arc<AtomicUsize>,
}

impl Hub {
    pub fn new(cmd_tx: mpsc::Sender<GameCommand>, send_policy: SendPolicy) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::channel(HUB_EVENT_CAPACITY);
        let connection_count = Arc::new(AtomicUsize::new(0));

        let hub = Self {
            events_rx,
            registry: HashMap::new(),
            next_client_id: 0,
            cmd_tx,
            send_policy,
            connection_count: connection_count.clone(),
        };

        let handle = HubHandle {
            events: events_tx,
            connection_count,
        };

        (hub, handle)
    }

    /// Run the event loop until every handle is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event).await;
        }
        info!("hub event loop stopped");
    }

    async fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register {
                outbound,
                shutdown,
                reply,
            } => {
                let client_id = self.next_client_id;
                self.next_client_id += 1;

                self.registry.insert(
                    client_id,
                    ClientEntry {
                        outbound,
                        _shutdown: shutdown,
                    },
                );
                self.connection_count
                    .store(self.registry.len(), Ordering::Relaxed);

                info!(client_id, "client registered");
                // The caller may already be gone; nothing to do then.
                let _ = reply.send(client_id);
            }

            HubEvent::Unregister { client_id } => self.unregister(client_id).await,

            HubEvent::Inbound { client_id, payload } => {
                // Never await here: the tick driver drains this queue and can
                // itself be blocked submitting a broadcast event to the hub.
                // A blocking send on a full stream would deadlock both tasks,
                // so an overflowing frame is dropped instead (a local
                // failure, same as an unparseable one).
                match self.cmd_tx.try_send(GameCommand::Frame { client_id, payload }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(client_id, "command stream full, dropping frame");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!(client_id, "command stream closed, dropping frame");
                    }
                }
            }

            HubEvent::Broadcast { payload } => {
                let stalled = self.deliver_all(payload).await;
                for client_id in stalled {
                    warn!(client_id, "outbound queue full, disconnecting");
                    self.unregister(client_id).await;
                }
            }

            HubEvent::Unicast { client_id, payload } => {
                if let Some(entry) = self.registry.get(&client_id) {
                    if entry.outbound.send(payload).await.is_err() {
                        debug!(client_id, "unicast to closed outbound queue");
                    }
                } else {
                    debug!(client_id, "unicast to unknown client");
                }
            }
        }
    }

    async fn unregister(&mut self, client_id: i32) {
        if self.registry.remove(&client_id).is_none() {
            debug!(client_id, "unregister for unknown client");
            return;
        }
        self.connection_count
            .store(self.registry.len(), Ordering::Relaxed);
        info!(client_id, "client unregistered");

        if self
            .cmd_tx
            .send(GameCommand::RemoveClient { client_id })
            .await
            .is_err()
        {
            warn!(client_id, "command stream closed during unregister");
        }
    }

    /// Fan a payload out to every registered connection. Returns the clients
    /// that must be disconnected under `SendPolicy::Disconnect`.
    async fn deliver_all(&mut self, payload: Bytes) -> Vec<i32> {
        let mut stalled = Vec::new();

        for (client_id, entry) in &self.registry {
            match self.send_policy {
                SendPolicy::Block => {
                    // Backpressure: a full queue stalls the hub until the
                    // connection drains. Accepted liveness risk, see config.
                    if entry.outbound.send(payload.clone()).await.is_err() {
                        debug!(client_id, "broadcast to closed outbound queue");
                    }
                }
                SendPolicy::DropNewest => {
                    if let Err(mpsc::error::TrySendError::Full(_)) =
                        entry.outbound.try_send(payload.clone())
                    {
                        warn!(client_id, "outbound queue full, dropping snapshot");
                    }
                }
                SendPolicy::Disconnect => {
                    if let Err(mpsc::error::TrySendError::Full(_)) =
                        entry.outbound.try_send(payload.clone())
                    {
                        stalled.push(*client_id);
                    }
                }
            }
        }

        stalled
    }
}

/// Cloneable handle to the hub event queue
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    connection_count: Arc<AtomicUsize>,
}

impl HubHandle {
    /// Register a connection; the identity is delivered via a oneshot reply
    /// so the caller never waits behind unrelated registry traffic.
    pub async fn register(
        &self,
        outbound: mpsc::Sender<Bytes>,
        shutdown: oneshot::Sender<()>,
    ) -> Option<i32> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(HubEvent::Register {
                outbound,
                shutdown,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    pub async fn broadcast(&self, payload: Bytes) -> Result<(), HubClosed> {
        self.events
            .send(HubEvent::Broadcast { payload })
            .await
            .map_err(|_| HubClosed)
    }

    pub async fn unicast(&self, client_id: i32, payload: Bytes) -> Result<(), HubClosed> {
        self.events
            .send(HubEvent::Unicast { client_id, payload })
            .await
            .map_err(|_| HubClosed)
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Narrow capability handed to a connection's loops: forward inbound
    /// frames and unregister itself, nothing else.
    pub fn connection_api(&self, client_id: i32) -> ConnectionHub {
        ConnectionHub {
            events: self.events.clone(),
            client_id,
        }
    }
}

/// The subset of hub operations a connection's loops may use
#[derive(Clone)]
pub struct ConnectionHub {
    events: mpsc::Sender<HubEvent>,
    client_id: i32,
}

impl ConnectionHub {
    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    /// Forward an inbound frame into the hub's serialized event stream
    pub async fn forward(&self, payload: Bytes) -> Result<(), HubClosed> {
        self.events
            .send(HubEvent::Inbound {
                client_id: self.client_id,
                payload,
            })
            .await
            .map_err(|_| HubClosed)
    }

    /// Request removal from the registry; a no-op if already gone
    pub async fn unregister(&self) {
        let _ = self
            .events
            .send(HubEvent::Unregister {
                client_id: self.client_id,
            })
            .await;
    }
}

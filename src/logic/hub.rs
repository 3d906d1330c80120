//! Broadcast Hub - Real-Time Event Fan-Out
//!
//! Holds the set of currently subscribed viewers and pushes every
//! published state-change event to each of them. A viewer that went away
//! mid-delivery is dropped from the set and never fails the publish for
//! the others. Each viewer gets its own unbounded channel, so events for
//! one viewer arrive in publish order and a slow viewer cannot stall the
//! pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use super::types::{Alert, EquipmentStatus};

/// State-change events pushed to viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StatusChanged {
        equipment_id: i64,
        new_status: EquipmentStatus,
    },
    AlertCreated {
        alert: Alert,
    },
}

/// A live event stream for one viewer. Starts empty and only sees events
/// published after `subscribe` returned.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the next event. Returns None once unsubscribed.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking poll for the next already-delivered event.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.try_recv().ok()
    }
}

pub struct BroadcastHub {
    next_id: AtomicU64,
    viewers: RwLock<HashMap<u64, mpsc::UnboundedSender<PipelineEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            viewers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new viewer.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.viewers.write().insert(id, tx);
        log::info!("Viewer {} connected. Total viewers: {}", id, self.viewer_count());
        Subscription { id, receiver: rx }
    }

    /// Remove a viewer. Safe to call for an id that is already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.viewers.write().remove(&id).is_some();
        if removed {
            log::info!(
                "Viewer {} disconnected. Total viewers: {}",
                id,
                self.viewer_count()
            );
        }
        removed
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.read().len()
    }

    /// Deliver an event to every viewer subscribed right now.
    /// Returns how many viewers it reached.
    pub fn publish(&self, event: &PipelineEvent) -> usize {
        let mut delivered = 0;
        let mut disconnected = Vec::new();

        {
            let viewers = self.viewers.read();
            for (id, tx) in viewers.iter() {
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    disconnected.push(*id);
                }
            }
        }

        if !disconnected.is_empty() {
            let mut viewers = self.viewers.write();
            for id in disconnected {
                viewers.remove(&id);
                log::warn!("Viewer {} unreachable during broadcast, removed", id);
            }
        }

        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Events
//!
//! Lifecycle notifications of the wallet client as a closed enum, with
//! listener sets per [`EventKind`] and a broadcast channel for async
//! consumers.
//!
//! A failing or panicking listener is logged and skipped. It never affects
//! other listeners or the operation that emitted the event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::ErrorKind;
use crate::router::ExecutionPath;

const CHANNEL_CAPACITY: usize = 64;

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(&ClientEvent) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    SessionCreated,
    TxSubmitted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected {
        owner: Address,
        smart_wallet: Address,
        chain_id: u64,
    },
    Disconnected,
    SessionCreated {
        signer: Address,
        valid_until: i64,
        tx_hash: TxHash,
    },
    TxSubmitted {
        hash: TxHash,
        nonce: U256,
        path: ExecutionPath,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connected { .. } => EventKind::Connected,
            ClientEvent::Disconnected => EventKind::Disconnected,
            ClientEvent::SessionCreated { .. } => EventKind::SessionCreated,
            ClientEvent::TxSubmitted { .. } => EventKind::TxSubmitted,
            ClientEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    channel: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
            channel,
        }
    }

    /// Register a listener for one kind of event.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        for set in listeners.values_mut() {
            let before = set.len();
            set.retain(|(existing, _)| *existing != id);
            removed |= set.len() != before;
        }
        removed
    }

    /// Receiver of every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.channel.subscribe()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to its listeners and channel subscribers.
    pub fn emit(&self, event: ClientEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(|set| set.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(?kind, error = %e, "Event listener failed"),
                Err(_) => warn!(?kind, "Event listener panicked"),
            }
        }

        // No subscribers is fine
        let _ = self.channel.send(event);
    }
}

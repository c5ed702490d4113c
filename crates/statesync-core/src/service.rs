//! Synchronization service facade.
//!
//! [`SyncService`] composes the store, the client registry, the presence
//! notifier, and the snapshot broadcaster into the operations exposed over
//! the RPC boundary. Every operation except [`connect`](SyncService::connect)
//! and [`full_load`](SyncService::full_load) is gated on a known token.
//!
//! # Errors
//!
//! Protocol-level rejections ([`SyncError::UnknownClient`],
//! [`SyncError::NotImplemented`]) fail the call. Domain failures
//! ([`SyncError::Rejected`], [`SyncError::PartiallyApplied`]) are meant to
//! be returned to the caller as data; see [`SyncError::is_domain`].
//!
//! # Update semantics
//!
//! [`update_entity`](SyncService::update_entity) is not transactional. Edits
//! are applied one at a time in request order and processing stops at the
//! first failure. Edits before the failure stay applied.

use std::time::Duration;

use statesync_types::{
    ClientToken, ClientType, ConnectResponse, EntityId, EntitySnapshot, MemberEdit, MemberState,
    PresenceEvent, StatusResponse,
};
use tracing::{debug, info, warn};

use crate::broadcaster::{SnapshotBatch, SnapshotBroadcaster, TickReport};
use crate::config::SyncConfig;
use crate::error::{StoreError, SyncError};
use crate::fanout::Subscription;
use crate::presence::PresenceNotifier;
use crate::registry::ClientRegistry;
use crate::store::EntityStore;

/// The shared-world synchronization service.
#[derive(Debug)]
pub struct SyncService {
    store: EntityStore,
    clients: ClientRegistry,
    presence: PresenceNotifier,
    broadcaster: SnapshotBroadcaster,
}

impl SyncService {
    /// Create a service with an empty world.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            store: EntityStore::new(),
            clients: ClientRegistry::new(),
            presence: PresenceNotifier::new(&config.presence),
            broadcaster: SnapshotBroadcaster::new(&config.broadcast),
        }
    }

    fn authorize(&self, token: &ClientToken, operation: &'static str) -> Result<(), SyncError> {
        if self.clients.is_known(token) {
            Ok(())
        } else {
            warn!(%token, operation, "Unknown client rejected");
            Err(SyncError::UnknownClient(token.clone()))
        }
    }

    /// Register a new client and announce it to presence subscribers.
    pub fn connect(&self, client_type: ClientType) -> ConnectResponse {
        let token = self.clients.register(client_type.clone());
        info!(%token, client_type = %client_type, "Client connected");

        self.presence.announce(PresenceEvent {
            token: token.clone(),
            client_type: client_type.clone(),
        });

        ConnectResponse { token, client_type }
    }

    /// Snapshot of every entity, for initial client bootstrap.
    pub fn full_load(&self) -> Vec<EntitySnapshot> {
        let snapshots = self.store.snapshots();
        debug!(entities = snapshots.len(), "Full load served");
        snapshots
    }

    /// Create an entity. Each member keeps the owner it arrives with.
    pub fn create_entity(
        &self,
        token: &ClientToken,
        id: EntityId,
        prefab_name: String,
        members: Vec<MemberState>,
    ) -> Result<(), SyncError> {
        self.authorize(token, "CreateEntity")?;

        match self.store.create(id.clone(), prefab_name, members) {
            Ok(()) => {
                info!(entity = %id, %token, "Entity created");
                Ok(())
            }
            Err(e) => {
                debug!(entity = %id, %token, error = %e, "Entity creation rejected");
                Err(e.into())
            }
        }
    }

    /// Apply `edits` to entity `id`, in order, stopping at the first
    /// failure. Returns the number of edits applied.
    pub fn update_entity(
        &self,
        token: &ClientToken,
        id: &EntityId,
        edits: Vec<MemberEdit>,
    ) -> Result<usize, SyncError> {
        self.authorize(token, "UpdateEntity")?;

        if !self.store.contains(id.as_str()) {
            return Err(StoreError::EntityNotFound(id.clone()).into());
        }

        let mut applied: usize = 0;
        for edit in edits {
            if let Err(source) =
                self.store
                    .mutate_member(id.as_str(), &edit.member_name, edit.data, token)
            {
                warn!(entity = %id, %token, applied, error = %source, "Update rejected");
                return Err(if applied == 0 {
                    SyncError::Rejected(source)
                } else {
                    SyncError::PartiallyApplied { applied, source }
                });
            }
            applied = applied.saturating_add(1);
        }

        debug!(entity = %id, %token, applied, "Entity updated");
        Ok(applied)
    }

    /// Register the caller for the periodic state stream.
    pub fn open_state_stream(
        &self,
        token: &ClientToken,
    ) -> Result<Subscription<SnapshotBatch>, SyncError> {
        self.authorize(token, "StateStream")?;
        info!(%token, "State stream opened");
        Ok(self.broadcaster.subscribe(token.clone()))
    }

    /// Register the caller for presence notifications.
    pub fn open_subscription_stream(
        &self,
        token: &ClientToken,
    ) -> Result<Subscription<PresenceEvent>, SyncError> {
        self.authorize(token, "SubscriptionStream")?;
        info!(%token, "Subscription stream opened");
        Ok(self.presence.subscribe(token.clone()))
    }

    /// Declared but not implemented.
    #[allow(clippy::unused_self)]
    pub fn remove_entity(&self, id: &EntityId) -> Result<(), SyncError> {
        warn!(entity = %id, "RemoveEntity called");
        Err(SyncError::NotImplemented("RemoveEntity"))
    }

    /// Declared but not implemented.
    #[allow(clippy::unused_self)]
    pub fn retrieve_authority(&self, id: &EntityId) -> Result<Vec<MemberState>, SyncError> {
        warn!(entity = %id, "RetrieveAuthority called");
        Err(SyncError::NotImplemented("RetrieveAuthority"))
    }

    /// Declared but not implemented.
    #[allow(clippy::unused_self)]
    pub fn retrieve_state(&self, id: &EntityId) -> Result<EntitySnapshot, SyncError> {
        warn!(entity = %id, "RetrieveState called");
        Err(SyncError::NotImplemented("RetrieveState"))
    }

    /// Run one broadcast tick against the current store.
    pub fn broadcast_tick(&self) -> TickReport {
        self.broadcaster.tick(&self.store)
    }

    /// Configured broadcast period.
    pub const fn broadcast_interval(&self) -> Duration {
        self.broadcaster.interval()
    }

    /// Read-only access to the store, for diagnostics.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Counters for the status endpoint.
    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            entities: self.store.len(),
            clients: self.clients.len(),
            state_subscribers: self.broadcaster.subscriber_count(),
            presence_subscribers: self.presence.subscriber_count(),
            broadcast_interval_ms: u64::try_from(self.broadcast_interval().as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

//! Concurrent in-memory entity store.
//!
//! The store maps entity ids to entities. Each entity sits behind its own
//! read-write lock, so a write to entity A never blocks a read of entity B.
//! The outer [`DashMap`] shard lock is held only long enough to clone the
//! entity handle.
//!
//! Entities are fully built before insertion, so no reader can observe a
//! partially constructed entity.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use statesync_types::{ClientToken, EntityId, EntitySnapshot, MemberState};

use crate::authority;
use crate::error::StoreError;

/// A stored entity.
///
/// Members are kept in creation order for projection and indexed by name
/// for constant-time lookup on the write path.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    prefab_name: String,
    members: Vec<MemberState>,
    by_name: HashMap<String, usize>,
}

impl Entity {
    /// Build an entity, rejecting blank ids and repeated member names.
    pub fn new(
        id: EntityId,
        prefab_name: String,
        members: Vec<MemberState>,
    ) -> Result<Self, StoreError> {
        if !id.is_valid() {
            return Err(StoreError::InvalidId(id.into_inner()));
        }

        let mut by_name = HashMap::with_capacity(members.len());
        for (position, member) in members.iter().enumerate() {
            if by_name.insert(member.name.clone(), position).is_some() {
                return Err(StoreError::DuplicateMember {
                    entity: id,
                    member: member.name.clone(),
                });
            }
        }

        Ok(Self {
            id,
            prefab_name,
            members,
            by_name,
        })
    }

    /// Entity identifier.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Opaque classification string.
    pub fn prefab_name(&self) -> &str {
        &self.prefab_name
    }

    /// Members in creation order.
    pub fn members(&self) -> &[MemberState] {
        &self.members
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberState> {
        self.by_name
            .get(name)
            .and_then(|&position| self.members.get(position))
    }

    /// Overwrite a member's data if `requester` is its authoritative owner.
    pub fn write_member(
        &mut self,
        name: &str,
        data: Vec<u8>,
        requester: &ClientToken,
    ) -> Result<(), StoreError> {
        let member = self
            .by_name
            .get(name)
            .and_then(|&position| self.members.get_mut(position))
            .ok_or_else(|| StoreError::MemberNotFound {
                entity: self.id.clone(),
                member: name.to_owned(),
            })?;

        authority::check_authority(&self.id, member, requester)?;
        member.data = data;
        Ok(())
    }

    /// Project the entity into a wire snapshot.
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            prefab_name: self.prefab_name.clone(),
            members: self.members.clone(),
        }
    }
}

/// Concurrent map from entity id to entity.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: DashMap<EntityId, Arc<RwLock<Entity>>>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity. Fails if the id is already taken.
    pub fn create(
        &self,
        id: EntityId,
        prefab_name: String,
        members: Vec<MemberState>,
    ) -> Result<(), StoreError> {
        let entity = Entity::new(id, prefab_name, members)?;
        match self.entities.entry(entity.id.clone()) {
            Entry::Occupied(occupied) => Err(StoreError::AlreadyExists(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(RwLock::new(entity)));
                Ok(())
            }
        }
    }

    fn handle(&self, id: &str) -> Result<Arc<RwLock<Entity>>, StoreError> {
        self.entities
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::EntityNotFound(EntityId::from(id)))
    }

    /// Snapshot of a single entity.
    pub fn get(&self, id: &str) -> Result<EntitySnapshot, StoreError> {
        let handle = self.handle(id)?;
        let entity = handle.read();
        Ok(entity.snapshot())
    }

    /// Whether an entity with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Replace one member's data, checking the requester's authority.
    ///
    /// Only the target entity is locked for writing.
    pub fn mutate_member(
        &self,
        id: &str,
        member_name: &str,
        data: Vec<u8>,
        requester: &ClientToken,
    ) -> Result<(), StoreError> {
        let handle = self.handle(id)?;
        let mut entity = handle.write();
        entity.write_member(member_name, data, requester)
    }

    /// Visit every entity.
    ///
    /// Entity handles are collected first and each entity is read-locked
    /// only while the visitor runs on it. Entities created during the
    /// walk may or may not be visited.
    pub fn for_each(&self, mut visitor: impl FnMut(&Entity)) {
        let handles: Vec<Arc<RwLock<Entity>>> = self
            .entities
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for handle in handles {
            let entity = handle.read();
            visitor(&entity);
        }
    }

    /// Snapshot every entity, in unspecified order.
    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        let mut snapshots = Vec::with_capacity(self.entities.len());
        self.for_each(|entity| snapshots.push(entity.snapshot()));
        snapshots
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

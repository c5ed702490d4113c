//! Error types for the synchronization engine.
//!
//! [`StoreError`] covers domain failures: they are reported to callers as
//! data in a structured response. [`SyncError`] adds the protocol-level
//! rejections (unknown token, unimplemented operation) that callers see as
//! a failed call.

use statesync_types::{ClientToken, EntityId};

/// Domain failures raised by the entity store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No entity with this id exists.
    #[error("unknown entity: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but has no member with this name.
    #[error("unknown member: {entity}.{member}")]
    MemberNotFound {
        /// Entity that was searched.
        entity: EntityId,
        /// Member name that was not found.
        member: String,
    },

    /// An entity with this id already exists.
    #[error("entity already exists: {0}")]
    AlreadyExists(EntityId),

    /// The requester is not the member's recorded authoritative owner.
    #[error("unauthorized: {entity}.{member} is not owned by the requester")]
    Unauthorized {
        /// Entity holding the member.
        entity: EntityId,
        /// Member the requester tried to write.
        member: String,
        /// Token that attempted the write.
        requester: ClientToken,
    },

    /// Two members of a new entity share a name.
    #[error("duplicate member: {entity}.{member}")]
    DuplicateMember {
        /// Entity being created.
        entity: EntityId,
        /// Repeated member name.
        member: String,
    },

    /// The entity id is empty or blank.
    #[error("invalid entity id: {0:?}")]
    InvalidId(String),
}

/// Errors returned by [`SyncService`](crate::service::SyncService) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The token was never issued by this service.
    #[error("unknown client token: {0}")]
    UnknownClient(ClientToken),

    /// The operation is part of the contract surface but has no
    /// implementation yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// A domain failure with no side effects.
    #[error(transparent)]
    Rejected(#[from] StoreError),

    /// An update failed after some of its edits were already applied.
    #[error("{source} ({applied} earlier edits were applied)")]
    PartiallyApplied {
        /// Number of edits applied before the failure.
        applied: usize,
        /// The failure that stopped processing.
        source: StoreError,
    },
}

impl SyncError {
    /// Whether this is a domain failure that belongs in a structured
    /// response rather than a rejected call.
    pub const fn is_domain(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::PartiallyApplied { .. })
    }

    /// The underlying store failure, if any.
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Rejected(source) | Self::PartiallyApplied { source, .. } => Some(source),
            Self::UnknownClient(_) | Self::NotImplemented(_) => None,
        }
    }
}

//! Ownership check applied to every member write.
//!
//! Authority is assigned once, when an entity is created, from the owner
//! each member arrives with. Nothing in the service grants or transfers
//! it afterwards; this module only compares the recorded owner with the
//! requester.

use statesync_types::{ClientToken, EntityId, MemberState};

use crate::error::StoreError;

/// Whether `requester` is the recorded authoritative owner of `member`.
pub fn is_authoritative(member: &MemberState, requester: &ClientToken) -> bool {
    member.authoritative_owner == *requester
}

/// Fail with [`StoreError::Unauthorized`] unless `requester` owns `member`.
pub fn check_authority(
    entity: &EntityId,
    member: &MemberState,
    requester: &ClientToken,
) -> Result<(), StoreError> {
    if is_authoritative(member, requester) {
        Ok(())
    } else {
        Err(StoreError::Unauthorized {
            entity: entity.clone(),
            member: member.name.clone(),
            requester: requester.clone(),
        })
    }
}

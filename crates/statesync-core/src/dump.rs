//! Periodic debug dump of the entity store.
//!
//! Enabled with `logging.state_dump_interval_ms`. Each pass logs one
//! `debug` line per entity listing its members and their owners; payloads
//! are summarized by length only.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::service::SyncService;
use crate::store::Entity;

/// Render one entity as `name(owner, N bytes)` pairs.
pub fn describe(entity: &Entity) -> String {
    entity
        .members()
        .iter()
        .map(|m| format!("{}({}, {} bytes)", m.name, m.authoritative_owner, m.data.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Log every entity once per `period` until shutdown.
pub async fn run_state_dump(
    service: Arc<SyncService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    let mut pass: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                debug!(pass, entities = service.store().len(), "State dump");
                service.store().for_each(|entity| {
                    debug!(
                        pass,
                        entity = %entity.id(),
                        prefab = entity.prefab_name(),
                        members = %describe(entity),
                        "State dump item"
                    );
                });
                pass = pass.wrapping_add(1);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Spawn [`run_state_dump`] on a background task.
pub fn spawn_state_dump(
    service: Arc<SyncService>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_state_dump(service, period, shutdown))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use statesync_types::{ClientToken, EntityId, MemberState};

    use super::*;

    #[test]
    fn describe_lists_members_with_owner_and_size() {
        let entity = Entity::new(
            EntityId::from("e1"),
            String::from("ship"),
            vec![
                MemberState {
                    name: String::from("hp"),
                    data: b"100".to_vec(),
                    authoritative_owner: ClientToken::from("a"),
                },
                MemberState {
                    name: String::from("pos"),
                    data: Vec::new(),
                    authoritative_owner: ClientToken::from("b"),
                },
            ],
        )
        .unwrap();
        assert_eq!(describe(&entity), "hp(a, 3 bytes), pos(b, 0 bytes)");
    }
}

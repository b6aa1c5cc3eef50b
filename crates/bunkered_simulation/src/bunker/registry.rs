//! World-scoped bunker registry (resource) + lifecycle systems.

use super::{Bunker, BunkerId};
use crate::logger::{log, log_warning};
use crate::surface::SlotAnchor;
use bevy::prelude::*;
use std::collections::BTreeMap;

/// Marker на entity с коллайдером bunker'а
///
/// Despawn/remove → bunker снимается с регистрации.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct BunkerBody {
    pub id: BunkerId,
}

/// Все bunkers мира
///
/// BTreeMap → итерация в порядке id (детерминизм scoring'а и tie-break'ов).
#[derive(Resource, Debug, Default)]
pub struct BunkerRegistry {
    bunkers: BTreeMap<BunkerId, Bunker>,
    next_id: u32,
}

impl BunkerRegistry {
    pub fn register(&mut self, mut bunker: Bunker) -> BunkerId {
        self.next_id += 1;
        let id = BunkerId(self.next_id);
        bunker.id = id;
        log(&format!("BunkerRegistry: registered {:?} '{}'", id, bunker.name));
        self.bunkers.insert(id, bunker);
        id
    }

    pub fn unregister(&mut self, id: BunkerId) -> Option<Bunker> {
        let removed = self.bunkers.remove(&id);
        if let Some(bunker) = &removed {
            log(&format!(
                "BunkerRegistry: unregistered {:?} '{}' ({} claims dropped)",
                id,
                bunker.name,
                bunker.occupancy().claimants().len()
            ));
        }
        removed
    }

    pub fn get(&self, id: BunkerId) -> Option<&Bunker> {
        self.bunkers.get(&id)
    }

    pub fn get_mut(&mut self, id: BunkerId) -> Option<&mut Bunker> {
        self.bunkers.get_mut(&id)
    }

    pub fn contains(&self, id: BunkerId) -> bool {
        self.bunkers.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bunker> {
        self.bunkers.values()
    }

    pub fn len(&self) -> usize {
        self.bunkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bunkers.is_empty()
    }

    pub fn bunker_for_body(&self, body: Entity) -> Option<BunkerId> {
        self.bunkers
            .values()
            .find(|bunker| bunker.body == Some(body))
            .map(|bunker| bunker.id)
    }

    /// Снять все claims claimant'а во всех bunkers
    pub fn release_all_by(&mut self, claimant: Entity) -> usize {
        self.bunkers
            .values_mut()
            .map(|bunker| bunker.release_all_by(claimant))
            .sum()
    }
}

/// Глубина цепочки ChildOf, после которой считаем иерархию битой
const MAX_MARKER_DEPTH: usize = 16;

/// World transform marker'а: local transforms, собранные по цепочке ChildOf
///
/// Не зависит от transform propagation (headless app без TransformPlugin).
fn marker_world_transform(
    entity: Entity,
    markers: &Query<(&Transform, Option<&ChildOf>)>,
) -> Option<Transform> {
    let (local, parent) = markers.get(entity).ok()?;
    let mut world = *local;
    let mut next = parent.map(|child_of| child_of.parent());
    for _ in 0..MAX_MARKER_DEPTH {
        let Some(current) = next else {
            return Some(world);
        };
        let (transform, parent) = markers.get(current).ok()?;
        world = transform.mul_transform(world);
        next = parent.map(|child_of| child_of.parent());
    }
    None
}

/// Копирует world transforms slot markers в registry.
///
/// Marker обычно child bunker body; local offset компонуется с родителями.
/// Marker пропал → warning (один раз) и fallback на local anchor.
pub fn sync_slot_markers(
    mut registry: ResMut<BunkerRegistry>,
    markers: Query<(&Transform, Option<&ChildOf>)>,
) {
    for bunker in registry.bunkers.values_mut() {
        let name = bunker.name.clone();
        let Some(slots) = bunker.slots_mut() else {
            continue;
        };
        for slot in slots.iter_mut() {
            let SlotAnchor::Marker {
                entity, resolved, ..
            } = &mut slot.anchor
            else {
                continue;
            };
            match marker_world_transform(*entity, &markers) {
                Some(world) => *resolved = Some(world),
                None => {
                    if resolved.take().is_some() {
                        log_warning(&format!(
                            "BunkerRegistry: slot '{}' of '{}' lost marker {:?}, using local anchor",
                            slot.name, name, entity
                        ));
                    }
                }
            }
        }
    }
}

/// Bunker body despawned → unregister
pub fn unregister_despawned_bunkers(
    mut removed: RemovedComponents<BunkerBody>,
    mut registry: ResMut<BunkerRegistry>,
) {
    for body in removed.read() {
        if let Some(id) = registry.bunker_for_body(body) {
            registry.unregister(id);
        }
    }
}

/// Claims персонажей, которых больше нет в мире, освобождаются
pub fn release_orphaned_claims(mut registry: ResMut<BunkerRegistry>, alive: Query<()>) {
    let orphans: Vec<Entity> = registry
        .iter()
        .flat_map(|bunker| bunker.occupancy().claimants())
        .filter(|claimant| !alive.contains(*claimant))
        .collect();

    for claimant in orphans {
        let released = registry.release_all_by(claimant);
        if released > 0 {
            log_warning(&format!(
                "BunkerRegistry: released {} orphaned claim(s) of {:?}",
                released, claimant
            ));
        }
    }
}

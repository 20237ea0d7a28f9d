//! Zone-partial composition. Given a base zone and an ordered sequence of
//! partials, produces a new zone with the partials' overlays applied and
//! every dangling reference pruned.

use crate::serverdata::zone::ServerZone;
use crate::serverdata::partial::ServerZonePartial;

/// Euclidean-plane distance threshold (in map units) under which an
/// unspotted overlay NPC/object is considered a match for an existing,
/// unspotted entry it should replace.
const COLOCATION_RADIUS: f32 = 10.0;

/// Applies `partials` to `base` in order, then prunes dangling spawn-group
/// and spawn-location-group references. Callers are responsible for
/// ordering `partials` ascending by id (the tie-break rule for partials
/// that would otherwise apply in an unspecified order) and for resolving
/// which partials apply before calling this.
pub fn compose(base: &ServerZone, partials: &[&ServerZonePartial]) -> ServerZone {
    let mut zone = base.clone();

    for partial in partials {
        zone.drop_set_ids.extend(partial.drop_set_ids.iter().copied());

        for spawn_id in &partial.removed_spawn_ids {
            zone.spawns.remove(spawn_id);
        }

        apply_overlay_entries(&mut zone.npcs, &partial.npcs, |npc| (npc.id, npc.spot_id, npc.x, npc.y));
        apply_overlay_entries(&mut zone.objects, &partial.objects, |obj| {
            (obj.id, obj.spot_id, obj.x, obj.y)
        });

        for (id, spawn) in &partial.spawns {
            zone.spawns.insert(*id, spawn.clone());
        }
        for (id, group) in &partial.spawn_groups {
            zone.spawn_groups.insert(*id, group.clone());
        }
        for (id, location_group) in &partial.spawn_location_groups {
            zone.spawn_location_groups.insert(*id, location_group.clone());
        }
        for (id, spot) in &partial.spots {
            zone.spots.insert(*id, spot.clone());
        }

        zone.triggers.extend(partial.triggers.iter().cloned());
    }

    prune_dangling_references(&mut zone);
    zone
}

/// Applies the remove-then-append rule shared by NPC and object overlays:
/// an existing entry matching the overlay entry's spot (or, if unspotted,
/// lying within [`COLOCATION_RADIUS`] on both axes) is removed; a
/// non-zero-id overlay entry is then appended, a zero-id entry is a pure
/// deletion.
fn apply_overlay_entries<T: Clone>(
    existing: &mut Vec<T>,
    overlay: &[T],
    key: impl Fn(&T) -> (u32, u32, f32, f32),
) {
    for entry in overlay {
        let (overlay_id, overlay_spot, overlay_x, overlay_y) = key(entry);

        existing.retain(|candidate| {
            let (_, spot, x, y) = key(candidate);
            let matches = if overlay_spot != 0 {
                spot == overlay_spot
            } else {
                spot == 0
                    && (x - overlay_x).abs() <= COLOCATION_RADIUS
                    && (y - overlay_y).abs() <= COLOCATION_RADIUS
            };
            !matches
        });

        if overlay_id != 0 {
            existing.push(entry.clone());
        }
    }
}

/// Removes spawn-groups whose every referenced spawn has vanished (else
/// strips the missing ids in place), then removes spawn-location-groups
/// whose every referenced group has vanished (else strips in place).
/// Logs one debug line per whole-entity removal.
fn prune_dangling_references(zone: &mut ServerZone) {
    let mut removed_groups = Vec::new();
    zone.spawn_groups.retain(|id, group| {
        group.spawn_ids.retain(|spawn_id| zone.spawns.contains_key(spawn_id));
        if group.spawn_ids.is_empty() {
            removed_groups.push(*id);
            false
        } else {
            true
        }
    });
    for id in &removed_groups {
        log::debug!("zone {} composition removed spawn group {id}: no spawns remain", zone.id);
    }

    let mut removed_location_groups = Vec::new();
    zone.spawn_location_groups.retain(|id, location_group| {
        location_group
            .group_ids
            .retain(|group_id| zone.spawn_groups.contains_key(group_id));
        if location_group.group_ids.is_empty() {
            removed_location_groups.push(*id);
            false
        } else {
            true
        }
    });
    for id in &removed_location_groups {
        log::debug!(
            "zone {} composition removed spawn location group {id}: no spawn groups remain",
            zone.id
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::serverdata::zone::{Spawn, SpawnGroup, SpawnLocationGroup};
    use hashbrown::{HashMap, HashSet};

    fn base_zone() -> ServerZone {
        let mut spawns = HashMap::new();
        spawns.insert(1, Spawn { id: 1, enemy_type: 10 });
        spawns.insert(2, Spawn { id: 2, enemy_type: 11 });
        spawns.insert(3, Spawn { id: 3, enemy_type: 12 });

        let mut spawn_groups = HashMap::new();
        spawn_groups.insert(
            1,
            SpawnGroup {
                id: 1,
                spawn_ids: vec![1, 2],
            },
        );

        let mut spawn_location_groups = HashMap::new();
        spawn_location_groups.insert(
            1,
            SpawnLocationGroup {
                id: 1,
                group_ids: vec![1],
            },
        );

        ServerZone {
            id: 100,
            dynamic_map_id: 100,
            start_x: 0.0,
            start_y: 0.0,
            npcs: Vec::new(),
            objects: Vec::new(),
            spawns,
            spawn_groups,
            spawn_location_groups,
            spots: HashMap::new(),
            triggers: Vec::new(),
            drop_set_ids: HashSet::new(),
            valid_team_types: Vec::new(),
        }
    }

    /// Scenario 3: partial removes spawn 2; G1 shrinks to {1}; L1 survives
    /// referencing G1.
    #[test]
    fn partial_removing_a_spawn_shrinks_its_group_but_keeps_it() {
        let base = base_zone();

        let mut removed_spawn_ids = HashSet::new();
        removed_spawn_ids.insert(2);

        let partial = ServerZonePartial {
            id: 500,
            auto_apply: true,
            dynamic_map_ids: vec![100],
            drop_set_ids: HashSet::new(),
            removed_spawn_ids,
            npcs: Vec::new(),
            objects: Vec::new(),
            spawns: HashMap::new(),
            spawn_groups: HashMap::new(),
            spawn_location_groups: HashMap::new(),
            spots: HashMap::new(),
            triggers: Vec::new(),
        };

        let composed = compose(&base, &[&partial]);

        assert!(!composed.spawns.contains_key(&2));
        let group = composed.spawn_groups.get(&1).expect("group 1 survives");
        assert_eq!(group.spawn_ids, vec![1]);
        assert!(composed.spawn_location_groups.contains_key(&1));
    }

    /// Scenario 4: partial replaces G1 with a group referencing only a
    /// dangling spawn id; G1 and L1 are both removed.
    #[test]
    fn partial_replacing_group_with_dangling_spawn_removes_group_and_location_group() {
        let base = base_zone();

        let mut spawn_groups = HashMap::new();
        spawn_groups.insert(
            1,
            SpawnGroup {
                id: 1,
                spawn_ids: vec![99],
            },
        );

        let partial = ServerZonePartial {
            id: 501,
            auto_apply: true,
            dynamic_map_ids: vec![100],
            drop_set_ids: HashSet::new(),
            removed_spawn_ids: HashSet::new(),
            npcs: Vec::new(),
            objects: Vec::new(),
            spawns: HashMap::new(),
            spawn_groups,
            spawn_location_groups: HashMap::new(),
            spots: HashMap::new(),
            triggers: Vec::new(),
        };

        let composed = compose(&base, &[&partial]);

        assert!(!composed.spawn_groups.contains_key(&1));
        assert!(!composed.spawn_location_groups.contains_key(&1));
        assert!(composed.check_invariants());
    }

    #[test]
    fn npc_overlay_with_matching_spot_replaces_existing_entry() {
        use crate::serverdata::zone::ServerNPC;

        let mut base = base_zone();
        base.npcs.push(ServerNPC {
            id: 5,
            spot_id: 7,
            x: 0.0,
            y: 0.0,
        });

        let partial = ServerZonePartial {
            id: 502,
            auto_apply: true,
            dynamic_map_ids: vec![100],
            drop_set_ids: HashSet::new(),
            removed_spawn_ids: HashSet::new(),
            npcs: vec![ServerNPC {
                id: 6,
                spot_id: 7,
                x: 1.0,
                y: 1.0,
            }],
            objects: Vec::new(),
            spawns: HashMap::new(),
            spawn_groups: HashMap::new(),
            spawn_location_groups: HashMap::new(),
            spots: HashMap::new(),
            triggers: Vec::new(),
        };

        let composed = compose(&base, &[&partial]);
        assert_eq!(composed.npcs.len(), 1);
        assert_eq!(composed.npcs[0].id, 6);
    }

    #[test]
    fn zero_id_overlay_entry_is_a_pure_deletion() {
        use crate::serverdata::zone::ServerObject;

        let mut base = base_zone();
        base.objects.push(ServerObject {
            id: 9,
            spot_id: 3,
            x: 0.0,
            y: 0.0,
        });

        let partial = ServerZonePartial {
            id: 503,
            auto_apply: true,
            dynamic_map_ids: vec![100],
            drop_set_ids: HashSet::new(),
            removed_spawn_ids: HashSet::new(),
            npcs: Vec::new(),
            objects: vec![ServerObject {
                id: 0,
                spot_id: 3,
                x: 0.0,
                y: 0.0,
            }],
            spawns: HashMap::new(),
            spawn_groups: HashMap::new(),
            spawn_location_groups: HashMap::new(),
            spots: HashMap::new(),
            triggers: Vec::new(),
        };

        let composed = compose(&base, &[&partial]);
        assert!(composed.objects.is_empty());
    }
}

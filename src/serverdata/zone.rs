//! Zone definition types.

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerNPC {
    pub id: u32,
    pub spot_id: u32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerObject {
    pub id: u32,
    pub spot_id: u32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Spawn {
    pub id: u32,
    pub enemy_type: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnGroup {
    pub id: u32,
    #[serde(default, rename = "SpawnID")]
    pub spawn_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnLocationGroup {
    pub id: u32,
    #[serde(default, rename = "GroupID")]
    pub group_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Spot {
    pub id: u32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trigger {
    pub event_id: String,
}

#[derive(Debug, Clone)]
pub struct ServerZone {
    pub id: u32,
    pub dynamic_map_id: u32,
    pub start_x: f32,
    pub start_y: f32,
    pub npcs: Vec<ServerNPC>,
    pub objects: Vec<ServerObject>,
    pub spawns: HashMap<u32, Spawn>,
    pub spawn_groups: HashMap<u32, SpawnGroup>,
    pub spawn_location_groups: HashMap<u32, SpawnLocationGroup>,
    pub spots: HashMap<u32, Spot>,
    pub triggers: Vec<Trigger>,
    pub drop_set_ids: HashSet<u32>,
    pub valid_team_types: Vec<u8>,
}

impl ServerZone {
    /// Checks the two referential invariants composed zones must hold:
    /// every spawn-group references only live spawns, and every
    /// spawn-location-group references only live spawn-groups. Whether
    /// every spawn's enemy type resolves in the definition catalog is
    /// checked separately at registration time, since that check needs
    /// a `DefinitionManager` this type doesn't carry.
    pub fn check_invariants(&self) -> bool {
        let spawns_ok = self
            .spawn_groups
            .values()
            .all(|group| group.spawn_ids.iter().all(|id| self.spawns.contains_key(id)));
        let groups_ok = self.spawn_location_groups.values().all(|location_group| {
            location_group
                .group_ids
                .iter()
                .all(|id| self.spawn_groups.contains_key(id))
        });
        spawns_ok && groups_ok
    }
}

/// On-disk XML shape for a zone. `ServerZone`'s indices are built from
/// the flat lists a zone document carries.
#[derive(Debug, Deserialize)]
pub struct ZoneDocument {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "DynamicMapID")]
    pub dynamic_map_id: u32,
    #[serde(default, rename = "StartX")]
    pub start_x: f32,
    #[serde(default, rename = "StartY")]
    pub start_y: f32,
    #[serde(default, rename = "NPC")]
    pub npcs: Vec<ServerNPC>,
    #[serde(default, rename = "Object")]
    pub objects: Vec<ServerObject>,
    #[serde(default, rename = "Spawn")]
    pub spawns: Vec<Spawn>,
    #[serde(default, rename = "SpawnGroup")]
    pub spawn_groups: Vec<SpawnGroup>,
    #[serde(default, rename = "SpawnLocationGroup")]
    pub spawn_location_groups: Vec<SpawnLocationGroup>,
    #[serde(default, rename = "Spot")]
    pub spots: Vec<Spot>,
    #[serde(default, rename = "Trigger")]
    pub triggers: Vec<Trigger>,
    #[serde(default, rename = "DropSetID")]
    pub drop_set_ids: Vec<u32>,
    #[serde(default, rename = "ValidTeamType")]
    pub valid_team_types: Vec<u8>,
}

impl From<ZoneDocument> for ServerZone {
    fn from(doc: ZoneDocument) -> Self {
        Self {
            id: doc.id,
            dynamic_map_id: doc.dynamic_map_id,
            start_x: doc.start_x,
            start_y: doc.start_y,
            npcs: doc.npcs,
            objects: doc.objects,
            spawns: doc.spawns.into_iter().map(|s| (s.id, s)).collect(),
            spawn_groups: doc.spawn_groups.into_iter().map(|g| (g.id, g)).collect(),
            spawn_location_groups: doc
                .spawn_location_groups
                .into_iter()
                .map(|g| (g.id, g))
                .collect(),
            spots: doc.spots.into_iter().map(|s| (s.id, s)).collect(),
            triggers: doc.triggers,
            drop_set_ids: doc.drop_set_ids.into_iter().collect(),
            valid_team_types: doc.valid_team_types,
        }
    }
}

//! Zone partial overlay type.

use crate::serverdata::zone::{ServerNPC, ServerObject, Spawn, SpawnGroup, SpawnLocationGroup, Spot, Trigger};
use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

/// Id reserved for the "direct global partial", discarded with a warning
/// if it carries any content.
pub const GLOBAL_PARTIAL_ID: u32 = 0;

#[derive(Debug, Clone)]
pub struct ServerZonePartial {
    pub id: u32,
    pub auto_apply: bool,
    /// Dynamic-map ids this partial targets. Empty means unrestricted: an
    /// explicit `extra_partial_ids` request may apply it to any map.
    pub dynamic_map_ids: Vec<u32>,
    pub drop_set_ids: HashSet<u32>,
    /// Spawn ids to remove from the zone before this partial's own
    /// `spawns` overlay is applied. Spawn deletion has no zero-id
    /// convention the way NPC/object overlays do, since a spawn carries
    /// no positional identity to match against — it is named explicitly.
    pub removed_spawn_ids: HashSet<u32>,
    pub npcs: Vec<ServerNPC>,
    pub objects: Vec<ServerObject>,
    pub spawns: HashMap<u32, Spawn>,
    pub spawn_groups: HashMap<u32, SpawnGroup>,
    pub spawn_location_groups: HashMap<u32, SpawnLocationGroup>,
    pub spots: HashMap<u32, Spot>,
    pub triggers: Vec<Trigger>,
}

impl ServerZonePartial {
    pub fn targets(&self, dynamic_map_id: u32) -> bool {
        self.dynamic_map_ids.is_empty() || self.dynamic_map_ids.contains(&dynamic_map_id)
    }

    pub fn is_empty_content(&self) -> bool {
        self.drop_set_ids.is_empty()
            && self.removed_spawn_ids.is_empty()
            && self.npcs.is_empty()
            && self.objects.is_empty()
            && self.spawns.is_empty()
            && self.spawn_groups.is_empty()
            && self.spawn_location_groups.is_empty()
            && self.spots.is_empty()
            && self.triggers.is_empty()
    }
}

/// On-disk XML shape for a zone partial.
#[derive(Debug, Deserialize)]
pub struct ZonePartialDocument {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default, rename = "AutoApply")]
    pub auto_apply: bool,
    #[serde(default, rename = "DynamicMapID")]
    pub dynamic_map_ids: Vec<u32>,
    #[serde(default, rename = "DropSetID")]
    pub drop_set_ids: Vec<u32>,
    #[serde(default, rename = "RemovedSpawnID")]
    pub removed_spawn_ids: Vec<u32>,
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
}

impl From<ZonePartialDocument> for ServerZonePartial {
    fn from(doc: ZonePartialDocument) -> Self {
        Self {
            id: doc.id,
            auto_apply: doc.auto_apply,
            dynamic_map_ids: doc.dynamic_map_ids,
            drop_set_ids: doc.drop_set_ids.into_iter().collect(),
            removed_spawn_ids: doc.removed_spawn_ids.into_iter().collect(),
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
        }
    }
}

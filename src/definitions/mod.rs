//! Boot-time catalog of static game-data definitions: demons, items,
//! skills, and the secondary indices handlers need to resolve fusion
//! ranges, enchant/disassembly/modification lookups, equipment sets,
//! special titles, tri-union fusion results, and dynamic map spot data.
//!
//! Everything here is loaded once at boot from the [`crate::datastore::DataStore`]
//! and exposed read-only afterwards behind `Arc`.

pub mod records;
pub mod table;

use crate::datastore::{DataStore, DataStoreError};
use hashbrown::{HashMap, HashSet};
use records::{
    Demon, DevilBoostLot, Disassembly, DynamicMap, Enchant, EnchantSetOverlay,
    EnchantSpecialOverlay, EquipmentSet, FusionFlags, Item, Modification, SStatus, Skill,
    SpecialTitle, Tokusei, TriUnionSpecial,
};
use std::sync::Arc;
use table::{load_table, DefinitionRecord, TableError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to load definition table {table}: {source}")]
    Table {
        table: &'static str,
        #[source]
        source: TableError,
    },
    #[error(transparent)]
    DataStore(#[from] DataStoreError),
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
}

fn load<T: DefinitionRecord>(
    store: &DataStore,
    path: &str,
    table: &'static str,
    expected_table_count: Option<u16>,
) -> Result<Vec<T>, DefinitionError> {
    let bytes = store.decrypt_file(path)?;
    load_table(&bytes, expected_table_count).map_err(|source| DefinitionError::Table {
        table,
        source,
    })
}

/// Demons eligible for race-ordered fusion range lookups, sorted ascending
/// by base level within each race.
#[derive(Debug, Default)]
struct FusionRangeIndex {
    by_race: HashMap<u16, Vec<(u16, u32)>>,
}

impl FusionRangeIndex {
    fn insert(&mut self, demon: &Demon) {
        if !demon.fusion_flags.contains(FusionFlags::FUSION_RANGE) {
            return;
        }
        let entries = self.by_race.entry(demon.race).or_default();
        entries.push((demon.base_level, demon.id));
        entries.sort_by_key(|(level, _)| *level);
    }

    fn range(&self, race: u16) -> &[(u16, u32)] {
        self.by_race.get(&race).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The read-only, fully indexed definition catalog.
pub struct DefinitionManager {
    demons: HashMap<u32, Arc<Demon>>,
    demons_by_name: HashMap<String, Arc<Demon>>,
    fusion_ranges: FusionRangeIndex,

    items: HashMap<u32, Arc<Item>>,
    items_by_name: HashMap<String, Arc<Item>>,

    skills: HashMap<u32, Arc<Skill>>,
    skills_by_function: HashMap<u32, Vec<u32>>,

    enchants: HashMap<u32, Arc<Enchant>>,
    enchants_by_demon_id: HashMap<u32, u32>,
    enchants_by_item_id: HashMap<u32, u32>,

    disassembly_by_item_id: HashMap<u32, Arc<Disassembly>>,
    modifications_by_item_id: HashMap<u32, Arc<Modification>>,

    equipment_sets: HashMap<u32, Arc<EquipmentSet>>,
    equipment_sets_by_equipment_id: HashMap<u32, Vec<u32>>,

    special_titles: HashSet<u32>,

    tri_union_specials: HashMap<u32, Arc<TriUnionSpecial>>,
    tri_union_by_source: HashMap<u32, Vec<u32>>,

    dynamic_maps: HashMap<u32, Arc<DynamicMap>>,
    spot_data_files: HashMap<String, Arc<Vec<u8>>>,

    devil_boost_lots: HashMap<u32, Arc<DevilBoostLot>>,

    tokusei: HashMap<u32, Arc<Tokusei>>,
    s_status: HashMap<u32, Arc<SStatus>>,
    enchant_sets: HashMap<u32, Arc<EnchantSetOverlay>>,
    enchant_specials: HashMap<u32, Arc<EnchantSpecialOverlay>>,
}

impl DefinitionManager {
    /// Loads the representative binary tables this catalog indexes from
    /// `store`. Every table load is fatal on error: a corrupt or
    /// mismatched table aborts boot rather than starting with a partial
    /// catalog.
    pub fn load(store: &DataStore) -> Result<Self, DefinitionError> {
        let demon_records: Vec<Demon> = load(store, "data/demon.bin", "demon", Some(1))?;
        let item_records: Vec<Item> = load(store, "data/item.bin", "item", Some(1))?;
        let skill_records: Vec<Skill> = load(store, "data/skill.bin", "skill", Some(1))?;
        let enchant_records: Vec<Enchant> = load(store, "data/enchant.bin", "enchant", Some(1))?;
        let disassembly_records: Vec<Disassembly> =
            load(store, "data/disassembly.bin", "disassembly", Some(1))?;
        let modification_records: Vec<Modification> =
            load(store, "data/modification.bin", "modification", Some(1))?;
        let equipment_set_records: Vec<EquipmentSet> =
            load(store, "data/equipment_set.bin", "equipment_set", Some(1))?;
        let special_title_records: Vec<SpecialTitle> =
            load(store, "data/special_title.bin", "special_title", Some(1))?;
        let tri_union_records: Vec<TriUnionSpecial> =
            load(store, "data/tri_union_special.bin", "tri_union_special", Some(1))?;
        let dynamic_map_records: Vec<DynamicMap> =
            load(store, "data/dynamic_map.bin", "dynamic_map", Some(1))?;
        let devil_boost_lot_records: Vec<DevilBoostLot> =
            load(store, "data/devil_boost_lot.bin", "devil_boost_lot", Some(1))?;

        let mut demons = HashMap::new();
        let mut demons_by_name = HashMap::new();
        let mut fusion_ranges = FusionRangeIndex::default();
        for demon in demon_records {
            fusion_ranges.insert(&demon);
            let demon = Arc::new(demon);
            demons_by_name.insert(demon.name.clone(), demon.clone());
            demons.insert(demon.id, demon);
        }

        let mut items = HashMap::new();
        let mut items_by_name = HashMap::new();
        for item in item_records {
            let item = Arc::new(item);
            items_by_name.insert(item.name.clone(), item.clone());
            items.insert(item.id, item);
        }

        let mut skills = HashMap::new();
        let mut skills_by_function: HashMap<u32, Vec<u32>> = HashMap::new();
        for skill in skill_records {
            skills_by_function
                .entry(skill.function_id)
                .or_default()
                .push(skill.id);
            skills.insert(skill.id, Arc::new(skill));
        }

        let mut enchants = HashMap::new();
        let mut enchants_by_demon_id = HashMap::new();
        let mut enchants_by_item_id = HashMap::new();
        for enchant in enchant_records {
            if enchant.demon_id != 0 {
                if let Some(existing) = enchants_by_demon_id.insert(enchant.demon_id, enchant.id) {
                    log::warn!(
                        "enchant {} replaces enchant {} already indexed for demon {}",
                        enchant.id,
                        existing,
                        enchant.demon_id
                    );
                }
            }
            if enchant.item_id != 0 {
                if let Some(existing) = enchants_by_item_id.insert(enchant.item_id, enchant.id) {
                    log::warn!(
                        "enchant {} replaces enchant {} already indexed for item {}",
                        enchant.id,
                        existing,
                        enchant.item_id
                    );
                }
            }
            enchants.insert(enchant.id, Arc::new(enchant));
        }

        let mut disassembly_by_item_id = HashMap::new();
        for disassembly in disassembly_records {
            disassembly_by_item_id.insert(disassembly.item_id, Arc::new(disassembly));
        }

        let mut modifications_by_item_id = HashMap::new();
        for modification in modification_records {
            modifications_by_item_id.insert(modification.item_id, Arc::new(modification));
        }

        let mut equipment_sets = HashMap::new();
        let mut equipment_sets_by_equipment_id: HashMap<u32, Vec<u32>> = HashMap::new();
        for set in equipment_set_records {
            for equipment_id in set.equipment_ids() {
                equipment_sets_by_equipment_id
                    .entry(equipment_id)
                    .or_default()
                    .push(set.id);
            }
            equipment_sets.insert(set.id, Arc::new(set));
        }

        let special_titles = special_title_records
            .into_iter()
            .filter(|title| title.id >= 1024 && !title.title.is_empty())
            .map(|title| title.id)
            .collect();

        let mut tri_union_specials = HashMap::new();
        let mut tri_union_by_source: HashMap<u32, Vec<u32>> = HashMap::new();
        for special in tri_union_records {
            for source_id in special.source_demon_ids {
                tri_union_by_source.entry(source_id).or_default().push(special.id);
            }
            tri_union_specials.insert(special.id, Arc::new(special));
        }

        let mut dynamic_maps = HashMap::new();
        let mut spot_data_files: HashMap<String, Arc<Vec<u8>>> = HashMap::new();
        for dynamic_map in dynamic_map_records {
            if !spot_data_files.contains_key(&dynamic_map.spot_data_file) {
                let path = format!("data/zone/{}", dynamic_map.spot_data_file);
                let bytes = store.decrypt_file(&path)?;
                spot_data_files.insert(dynamic_map.spot_data_file.clone(), Arc::new(bytes));
            }
            dynamic_maps.insert(dynamic_map.id, Arc::new(dynamic_map));
        }

        let devil_boost_lots = devil_boost_lot_records
            .into_iter()
            .map(|lot| (lot.id, Arc::new(lot)))
            .collect();

        Ok(Self {
            demons,
            demons_by_name,
            fusion_ranges,
            items,
            items_by_name,
            skills,
            skills_by_function,
            enchants,
            enchants_by_demon_id,
            enchants_by_item_id,
            disassembly_by_item_id,
            modifications_by_item_id,
            equipment_sets,
            equipment_sets_by_equipment_id,
            special_titles,
            tri_union_specials,
            tri_union_by_source,
            dynamic_maps,
            spot_data_files,
            devil_boost_lots,
            tokusei: HashMap::new(),
            s_status: HashMap::new(),
            enchant_sets: HashMap::new(),
            enchant_specials: HashMap::new(),
        })
    }

    pub fn get_demon(&self, id: u32) -> Option<Arc<Demon>> {
        self.demons.get(&id).cloned()
    }

    pub fn get_demon_by_name(&self, name: &str) -> Option<Arc<Demon>> {
        self.demons_by_name.get(name).cloned()
    }

    /// Demons of `race` flagged for fusion-range lookups, ascending by
    /// base level.
    pub fn fusion_range(&self, race: u16) -> &[(u16, u32)] {
        self.fusion_ranges.range(race)
    }

    pub fn get_item(&self, id: u32) -> Option<Arc<Item>> {
        self.items.get(&id).cloned()
    }

    pub fn get_item_by_name(&self, name: &str) -> Option<Arc<Item>> {
        self.items_by_name.get(name).cloned()
    }

    pub fn get_skill(&self, id: u32) -> Option<Arc<Skill>> {
        self.skills.get(&id).cloned()
    }

    pub fn skills_for_function(&self, function_id: u32) -> &[u32] {
        self.skills_by_function
            .get(&function_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_enchant(&self, id: u32) -> Option<Arc<Enchant>> {
        self.enchants.get(&id).cloned()
    }

    pub fn enchant_for_demon(&self, demon_id: u32) -> Option<Arc<Enchant>> {
        self.enchants_by_demon_id
            .get(&demon_id)
            .and_then(|id| self.get_enchant(*id))
    }

    pub fn enchant_for_item(&self, item_id: u32) -> Option<Arc<Enchant>> {
        self.enchants_by_item_id
            .get(&item_id)
            .and_then(|id| self.get_enchant(*id))
    }

    pub fn disassembly_for_item(&self, item_id: u32) -> Option<Arc<Disassembly>> {
        self.disassembly_by_item_id.get(&item_id).cloned()
    }

    pub fn modification_for_item(&self, item_id: u32) -> Option<Arc<Modification>> {
        self.modifications_by_item_id.get(&item_id).cloned()
    }

    pub fn get_equipment_set(&self, id: u32) -> Option<Arc<EquipmentSet>> {
        self.equipment_sets.get(&id).cloned()
    }

    pub fn equipment_sets_for_equipment(&self, equipment_id: u32) -> &[u32] {
        self.equipment_sets_by_equipment_id
            .get(&equipment_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_special_title(&self, id: u32) -> bool {
        self.special_titles.contains(&id)
    }

    pub fn get_tri_union_special(&self, id: u32) -> Option<Arc<TriUnionSpecial>> {
        self.tri_union_specials.get(&id).cloned()
    }

    /// Tri-union specials reachable from `source_demon_id` through any of
    /// its three source slots.
    pub fn tri_union_specials_from(&self, source_demon_id: u32) -> &[u32] {
        self.tri_union_by_source
            .get(&source_demon_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_dynamic_map(&self, id: u32) -> Option<Arc<DynamicMap>> {
        self.dynamic_maps.get(&id).cloned()
    }

    pub fn spot_data(&self, file_name: &str) -> Option<Arc<Vec<u8>>> {
        self.spot_data_files.get(file_name).cloned()
    }

    pub fn get_devil_boost_lot(&self, id: u32) -> Option<Arc<DevilBoostLot>> {
        self.devil_boost_lots.get(&id).cloned()
    }

    /// Every demon id awarded across every devil-boost lot, used by the
    /// aggregate "what can devil boost give out" query.
    pub fn devil_boost_demon_ids(&self) -> HashSet<u32> {
        self.devil_boost_lots
            .values()
            .flat_map(|lot| lot.demon_ids.iter().copied())
            .collect()
    }

    pub fn get_tokusei(&self, id: u32) -> Option<Arc<Tokusei>> {
        self.tokusei.get(&id).cloned()
    }

    pub fn register_tokusei(&mut self, value: Tokusei) -> Result<(), DefinitionError> {
        register(&mut self.tokusei, "tokusei", value.id, value)
    }

    pub fn get_s_status(&self, id: u32) -> Option<Arc<SStatus>> {
        self.s_status.get(&id).cloned()
    }

    pub fn register_s_status(&mut self, value: SStatus) -> Result<(), DefinitionError> {
        register(&mut self.s_status, "s-status", value.id, value)
    }

    pub fn get_enchant_set(&self, id: u32) -> Option<Arc<EnchantSetOverlay>> {
        self.enchant_sets.get(&id).cloned()
    }

    pub fn register_enchant_set(&mut self, value: EnchantSetOverlay) -> Result<(), DefinitionError> {
        register(&mut self.enchant_sets, "enchant-set", value.id, value)
    }

    pub fn get_enchant_special(&self, id: u32) -> Option<Arc<EnchantSpecialOverlay>> {
        self.enchant_specials.get(&id).cloned()
    }

    pub fn register_enchant_special(
        &mut self,
        value: EnchantSpecialOverlay,
    ) -> Result<(), DefinitionError> {
        register(&mut self.enchant_specials, "enchant-special", value.id, value)
    }
}

/// Inserts `value` under `id`, rejecting a duplicate rather than silently
/// overwriting it. Used by the overlay definition types that server data
/// registers after the binary catalog has already loaded.
fn register<T>(
    map: &mut HashMap<u32, Arc<T>>,
    kind: &'static str,
    id: u32,
    value: T,
) -> Result<(), DefinitionError> {
    if map.contains_key(&id) {
        return Err(DefinitionError::DuplicateId { kind, id });
    }
    map.insert(id, Arc::new(value));
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::Packet;
    use crate::datastore::DataStore;
    use std::path::PathBuf;

    fn temp_store(name: &str) -> (DataStore, PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("channel-server-definitions-test-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        (DataStore::new(vec![path.clone()]), path)
    }

    fn write_table(store: &DataStore, path: &str, entries: impl FnOnce(&mut Packet)) {
        let mut packet = Packet::new();
        entries(&mut packet);
        store.encrypt_file(path, &packet.into_bytes()).unwrap();
    }

    #[test]
    fn loads_demons_and_builds_fusion_range_index() {
        let (store, _root) = temp_store("demons");

        write_table(&store, "data/demon.bin", |packet| {
            packet.write_u16(2);
            packet.write_u16(0);
            packet.write_u32(10);
            packet.write_string("Pixie", crate::codec::StringEncoding::Cp932, true);
            packet.write_u16(1);
            packet.write_u16(5);
            packet.write_u8(FusionFlags::FUSION_RANGE.bits());
            packet.write_u32(11);
            packet.write_string("Jack Frost", crate::codec::StringEncoding::Cp932, true);
            packet.write_u16(1);
            packet.write_u16(3);
            packet.write_u8(FusionFlags::FUSION_RANGE.bits());
        });
        write_table(&store, "data/item.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/skill.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/enchant.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/disassembly.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/modification.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/equipment_set.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/special_title.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/tri_union_special.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/dynamic_map.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });
        write_table(&store, "data/devil_boost_lot.bin", |packet| {
            packet.write_u16(0);
            packet.write_u16(0);
        });

        let manager = DefinitionManager::load(&store).unwrap();
        assert_eq!(manager.get_demon(10).unwrap().name, "Pixie");
        let range = manager.fusion_range(1);
        assert_eq!(range, &[(3, 11), (5, 10)]);
    }

    #[test]
    fn register_rejects_duplicate_overlay_id() {
        let (store, _root) = temp_store("overlay");
        for path in [
            "data/demon.bin",
            "data/item.bin",
            "data/skill.bin",
            "data/enchant.bin",
            "data/disassembly.bin",
            "data/modification.bin",
            "data/equipment_set.bin",
            "data/special_title.bin",
            "data/tri_union_special.bin",
            "data/dynamic_map.bin",
            "data/devil_boost_lot.bin",
        ] {
            write_table(&store, path, |packet| {
                packet.write_u16(0);
                packet.write_u16(0);
            });
        }

        let mut manager = DefinitionManager::load(&store).unwrap();
        manager.register_tokusei(Tokusei { id: 1 }).unwrap();
        let err = manager.register_tokusei(Tokusei { id: 1 }).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::DuplicateId {
                kind: "tokusei",
                id: 1
            }
        ));
    }
}

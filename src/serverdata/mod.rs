//! Server-data catalog: zones, zone-partials, and the other XML-defined
//! content every gameplay handler reads through the [`composer`]. Loaded
//! once at boot from well-known subtrees of the data store, in a fixed
//! order, then held immutably.

pub mod composer;
pub mod overlay;
pub mod partial;
pub mod script;
pub mod xml;
pub mod zone;

use crate::datastore::{DataStore, DataStoreError};
use crate::definitions::DefinitionManager;
use hashbrown::HashMap;
use overlay::{
    DemonPresent, DemonQuestReward, DropSet, ServerEvent, Shop, ZoneInstance,
    ZoneInstanceVariantDocument,
};
use partial::{ServerZonePartial, ZonePartialDocument, GLOBAL_PARTIAL_ID};
use script::{ScriptDefinition, ScriptError, ScriptHost};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use xml::XmlLoadError;
use zone::{ServerZone, ZoneDocument};

/// Subtrees loaded, in order, under the data store root. Earlier
/// categories may be referenced by later ones but not vice versa.
pub const LOAD_ORDER: &[&str] = &[
    "demon_present",
    "demon_quest_reward",
    "drop_set",
    "enchant_set",
    "enchant_special",
    "s_status",
    "tokusei",
    "zones",
    "zones/partial",
    "events",
    "zone_instance",
    "zone_instance_variant",
    "shops",
    "scripts",
];

#[derive(Debug, Error)]
pub enum ServerDataError {
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("composition references unknown partial id {0}")]
    UnknownPartial(u32),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Xml(#[from] XmlLoadError),
    #[error(transparent)]
    Store(#[from] DataStoreError),
    #[error(transparent)]
    Definition(#[from] crate::definitions::DefinitionError),
    #[error("zone-instance-variant subtype {subtype} does not allow {count} time points")]
    InvalidTimePointCount { subtype: ZoneInstanceVariantSubtype, count: u32 },
    #[error("zone-instance-variant {id} has unknown subtype code {code}")]
    UnknownSubtypeCode { id: u32, code: u8 },
    #[error("duplicate script name {0}")]
    DuplicateScript(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneInstanceVariantSubtype {
    TimeTrial,
    Pvp,
    DemonOnly,
    Diaspora,
    Mission,
    Pentalpha { sub_id: u8 },
}

impl std::fmt::Display for ZoneInstanceVariantSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimeTrial => write!(f, "time-trial"),
            Self::Pvp => write!(f, "pvp"),
            Self::DemonOnly => write!(f, "demon-only"),
            Self::Diaspora => write!(f, "diaspora"),
            Self::Mission => write!(f, "mission"),
            Self::Pentalpha { sub_id } => write!(f, "pentalpha[{sub_id}]"),
        }
    }
}

/// Validates a zone-instance-variant's declared time-point count against
/// its subtype's fixed rule.
pub fn validate_time_point_count(
    subtype: ZoneInstanceVariantSubtype,
    count: u32,
) -> Result<(), ServerDataError> {
    let valid = match subtype {
        ZoneInstanceVariantSubtype::TimeTrial => count == 4,
        ZoneInstanceVariantSubtype::Pvp => count == 2 || count == 3,
        ZoneInstanceVariantSubtype::DemonOnly => count == 3 || count == 4,
        ZoneInstanceVariantSubtype::Diaspora => count == 2,
        ZoneInstanceVariantSubtype::Mission => count == 1,
        ZoneInstanceVariantSubtype::Pentalpha { sub_id } => sub_id < 5,
    };

    if valid {
        Ok(())
    } else {
        Err(ServerDataError::InvalidTimePointCount { subtype, count })
    }
}

impl ZoneInstanceVariantSubtype {
    fn from_code(code: u8, pentalpha_sub_id: u8) -> Option<Self> {
        match code {
            0 => Some(Self::TimeTrial),
            1 => Some(Self::Pvp),
            2 => Some(Self::DemonOnly),
            3 => Some(Self::Diaspora),
            4 => Some(Self::Mission),
            5 => Some(Self::Pentalpha { sub_id: pentalpha_sub_id }),
            _ => None,
        }
    }
}

/// A zone-instance-variant entry, already validated against its
/// subtype's time-point-count rule at load time.
#[derive(Debug, Clone)]
pub struct ZoneInstanceVariant {
    pub id: u32,
    pub subtype: ZoneInstanceVariantSubtype,
    pub time_point_count: u32,
}

/// The read-only, fully indexed server-data catalog.
pub struct ServerDataManager {
    definitions: Arc<DefinitionManager>,
    zones: HashMap<u32, Arc<ServerZone>>,
    partials: HashMap<u32, Arc<ServerZonePartial>>,
    /// `dynamic_map_id -> partial ids`, kept sorted ascending so
    /// composition order is reproducible.
    auto_apply_by_dynamic_map: HashMap<u32, Vec<u32>>,
    demon_presents: HashMap<u32, Arc<DemonPresent>>,
    demon_quest_rewards: HashMap<u32, Arc<DemonQuestReward>>,
    drop_sets: HashMap<u32, Arc<DropSet>>,
    events: HashMap<u32, Arc<ServerEvent>>,
    zone_instances: HashMap<u32, Arc<ZoneInstance>>,
    zone_instance_variants: HashMap<u32, Arc<ZoneInstanceVariant>>,
    shops: HashMap<u32, Arc<Shop>>,
    scripts: HashMap<String, Arc<ScriptDefinition>>,
}

impl ServerDataManager {
    pub fn new(definitions: Arc<DefinitionManager>) -> Self {
        Self {
            definitions,
            zones: HashMap::new(),
            partials: HashMap::new(),
            auto_apply_by_dynamic_map: HashMap::new(),
            demon_presents: HashMap::new(),
            demon_quest_rewards: HashMap::new(),
            drop_sets: HashMap::new(),
            events: HashMap::new(),
            zone_instances: HashMap::new(),
            zone_instance_variants: HashMap::new(),
            shops: HashMap::new(),
            scripts: HashMap::new(),
        }
    }

    /// Registers a base zone. Zones whose dynamic-map id is unknown to
    /// the definition catalog, or that spawn an enemy type the catalog
    /// has no demon for, are skipped with a warning rather than failing
    /// the whole boot; a duplicate zone id is fatal.
    pub fn register_zone(&mut self, zone: ServerZone) -> Result<(), ServerDataError> {
        if self.definitions.get_dynamic_map(zone.dynamic_map_id).is_none() {
            log::warn!(
                "zone {} references unknown dynamic map {}, skipping",
                zone.id,
                zone.dynamic_map_id
            );
            return Ok(());
        }
        for spawn in zone.spawns.values() {
            if self.definitions.get_demon(spawn.enemy_type).is_none() {
                log::warn!(
                    "zone {} spawn {} references unknown demon {}, skipping",
                    zone.id,
                    spawn.id,
                    spawn.enemy_type
                );
                return Ok(());
            }
        }
        if self.zones.contains_key(&zone.id) {
            return Err(ServerDataError::DuplicateId {
                kind: "zone",
                id: zone.id,
            });
        }
        self.zones.insert(zone.id, Arc::new(zone));
        Ok(())
    }

    /// Registers a zone partial. Id `0` ("direct global partial") is
    /// reserved: if it carries any content it is discarded with a
    /// warning, per the open-question decision recorded in this crate's
    /// design notes.
    pub fn register_partial(&mut self, partial: ServerZonePartial) -> Result<(), ServerDataError> {
        if partial.id == GLOBAL_PARTIAL_ID {
            if !partial.is_empty_content() {
                log::warn!("zone partial id 0 is reserved and was discarded");
            }
            return Ok(());
        }
        if self.partials.contains_key(&partial.id) {
            return Err(ServerDataError::DuplicateId {
                kind: "zone partial",
                id: partial.id,
            });
        }

        if partial.auto_apply {
            for dynamic_map_id in &partial.dynamic_map_ids {
                let entries = self.auto_apply_by_dynamic_map.entry(*dynamic_map_id).or_default();
                entries.push(partial.id);
                entries.sort_unstable();
            }
        }

        self.partials.insert(partial.id, Arc::new(partial));
        Ok(())
    }

    pub fn get_zone(&self, zone_id: u32) -> Option<Arc<ServerZone>> {
        self.zones.get(&zone_id).cloned()
    }

    pub fn get_partial(&self, partial_id: u32) -> Option<Arc<ServerZonePartial>> {
        self.partials.get(&partial_id).cloned()
    }

    /// Resolves `(zone_id, dynamic_map_id)` into a (possibly partial-
    /// composed) zone. Returns `None` if the base zone is absent or an
    /// `extra_partial_ids` entry does not resolve — both are treated as
    /// a fatal lookup by the caller.
    pub fn compose_zone(
        &self,
        zone_id: u32,
        dynamic_map_id: u32,
        apply_partials: bool,
        extra_partial_ids: &[u32],
    ) -> Option<Arc<ServerZone>> {
        let base = self.get_zone(zone_id)?;

        if !apply_partials {
            return Some(base);
        }

        let mut ids: Vec<u32> = self
            .auto_apply_by_dynamic_map
            .get(&dynamic_map_id)
            .cloned()
            .unwrap_or_default();

        for &extra in extra_partial_ids {
            let partial = self.partials.get(&extra)?;
            if !partial.auto_apply && partial.targets(dynamic_map_id) && !ids.contains(&extra) {
                ids.push(extra);
            }
        }

        if ids.is_empty() {
            return Some(base);
        }

        ids.sort_unstable();
        let partials: Option<Vec<Arc<ServerZonePartial>>> =
            ids.iter().map(|id| self.partials.get(id).cloned()).collect();
        let partials = partials?;
        let partial_refs: Vec<&ServerZonePartial> = partials.iter().map(Arc::as_ref).collect();

        Some(Arc::new(composer::compose(&base, &partial_refs)))
    }

    pub fn register_demon_present(&mut self, value: DemonPresent) -> Result<(), ServerDataError> {
        insert_unique(&mut self.demon_presents, "demon present", value.id, value)
    }

    pub fn get_demon_present(&self, id: u32) -> Option<Arc<DemonPresent>> {
        self.demon_presents.get(&id).cloned()
    }

    pub fn register_demon_quest_reward(&mut self, value: DemonQuestReward) -> Result<(), ServerDataError> {
        insert_unique(&mut self.demon_quest_rewards, "demon quest reward", value.id, value)
    }

    pub fn get_demon_quest_reward(&self, id: u32) -> Option<Arc<DemonQuestReward>> {
        self.demon_quest_rewards.get(&id).cloned()
    }

    pub fn register_drop_set(&mut self, value: DropSet) -> Result<(), ServerDataError> {
        insert_unique(&mut self.drop_sets, "drop set", value.id, value)
    }

    pub fn get_drop_set(&self, id: u32) -> Option<Arc<DropSet>> {
        self.drop_sets.get(&id).cloned()
    }

    pub fn register_event(&mut self, value: ServerEvent) -> Result<(), ServerDataError> {
        insert_unique(&mut self.events, "event", value.id, value)
    }

    pub fn get_event(&self, id: u32) -> Option<Arc<ServerEvent>> {
        self.events.get(&id).cloned()
    }

    pub fn register_zone_instance(&mut self, value: ZoneInstance) -> Result<(), ServerDataError> {
        insert_unique(&mut self.zone_instances, "zone instance", value.id, value)
    }

    pub fn get_zone_instance(&self, id: u32) -> Option<Arc<ZoneInstance>> {
        self.zone_instances.get(&id).cloned()
    }

    /// Decodes `doc`'s subtype code, validates its time-point count
    /// against the decoded subtype, and registers it if both succeed.
    pub fn register_zone_instance_variant(
        &mut self,
        doc: ZoneInstanceVariantDocument,
    ) -> Result<(), ServerDataError> {
        let subtype = ZoneInstanceVariantSubtype::from_code(doc.subtype_code, doc.pentalpha_sub_id)
            .ok_or(ServerDataError::UnknownSubtypeCode {
                id: doc.id,
                code: doc.subtype_code,
            })?;
        validate_time_point_count(subtype, doc.time_point_count)?;
        insert_unique(
            &mut self.zone_instance_variants,
            "zone instance variant",
            doc.id,
            ZoneInstanceVariant {
                id: doc.id,
                subtype,
                time_point_count: doc.time_point_count,
            },
        )
    }

    pub fn get_zone_instance_variant(&self, id: u32) -> Option<Arc<ZoneInstanceVariant>> {
        self.zone_instance_variants.get(&id).cloned()
    }

    pub fn register_shop(&mut self, value: Shop) -> Result<(), ServerDataError> {
        insert_unique(&mut self.shops, "shop", value.id, value)
    }

    pub fn get_shop(&self, id: u32) -> Option<Arc<Shop>> {
        self.shops.get(&id).cloned()
    }

    /// Registers a script definition already validated by [`script::validate`].
    /// Keyed by name since scripts are addressed by name, not a numeric id.
    pub fn register_script(&mut self, definition: ScriptDefinition) -> Result<(), ServerDataError> {
        if self.scripts.contains_key(&definition.name) {
            return Err(ServerDataError::DuplicateScript(definition.name));
        }
        self.scripts.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get_script(&self, name: &str) -> Option<Arc<ScriptDefinition>> {
        self.scripts.get(name).cloned()
    }
}

/// Inserts `value` under `id`, rejecting a duplicate rather than silently
/// overwriting it.
fn insert_unique<T>(
    map: &mut HashMap<u32, Arc<T>>,
    kind: &'static str,
    id: u32,
    value: T,
) -> Result<(), ServerDataError> {
    if map.contains_key(&id) {
        return Err(ServerDataError::DuplicateId { kind, id });
    }
    map.insert(id, Arc::new(value));
    Ok(())
}

/// Deserializes every `.xml` file directly under `category` in `data_store`
/// (search paths merged, first-hit-wins), sorted by virtual path for a
/// deterministic load order.
fn load_category<T: DeserializeOwned>(data_store: &DataStore, category: &str) -> Result<Vec<T>, ServerDataError> {
    let listing = data_store.list(category, false, true)?;
    let mut paths: Vec<&String> = listing.files.iter().filter(|path| path.ends_with(".xml")).collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let bytes = data_store.read_file(path)?;
            let text = String::from_utf8_lossy(&bytes);
            quick_xml::de::from_str(&text).map_err(|source| {
                ServerDataError::Xml(XmlLoadError::Parse {
                    path: path.clone(),
                    source,
                })
            })
        })
        .collect()
}

/// Walks the XML-defined overlay categories (`enchant_set`,
/// `enchant_special`, `s_status`, `tokusei`) and registers each into
/// `definitions`. Must run before `definitions` is wrapped in the `Arc`
/// every connection shares, since registration needs `&mut`.
pub fn load_overlays(data_store: &DataStore, definitions: &mut DefinitionManager) -> Result<(), ServerDataError> {
    for tokusei in load_category(data_store, "tokusei")? {
        definitions.register_tokusei(tokusei)?;
    }
    for s_status in load_category(data_store, "s_status")? {
        definitions.register_s_status(s_status)?;
    }
    for enchant_set in load_category(data_store, "enchant_set")? {
        definitions.register_enchant_set(enchant_set)?;
    }
    for enchant_special in load_category(data_store, "enchant_special")? {
        definitions.register_enchant_special(enchant_special)?;
    }
    Ok(())
}

/// Walks the `zones` and `zones/partial` categories and registers each
/// document into `manager`. Must run after the overlay categories so the
/// catalog's `Arc<DefinitionManager>` cross-reference checks can run.
pub fn load_zones_and_partials(data_store: &DataStore, manager: &mut ServerDataManager) -> Result<(), ServerDataError> {
    for doc in load_category::<ZoneDocument>(data_store, "zones")? {
        manager.register_zone(doc.into())?;
    }
    for doc in load_category::<ZonePartialDocument>(data_store, "zones/partial")? {
        manager.register_partial(doc.into())?;
    }
    Ok(())
}

/// Walks the remaining `LOAD_ORDER` categories that carry no composition
/// behavior of their own (`demon_present`, `demon_quest_reward`,
/// `drop_set`, `events`, `zone_instance`, `zone_instance_variant`,
/// `shops`) and registers each into `manager`.
pub fn load_remaining_categories(data_store: &DataStore, manager: &mut ServerDataManager) -> Result<(), ServerDataError> {
    for value in load_category(data_store, "demon_present")? {
        manager.register_demon_present(value)?;
    }
    for value in load_category(data_store, "demon_quest_reward")? {
        manager.register_demon_quest_reward(value)?;
    }
    for value in load_category(data_store, "drop_set")? {
        manager.register_drop_set(value)?;
    }
    for value in load_category(data_store, "events")? {
        manager.register_event(value)?;
    }
    for value in load_category(data_store, "zone_instance")? {
        manager.register_zone_instance(value)?;
    }
    for doc in load_category::<ZoneInstanceVariantDocument>(data_store, "zone_instance_variant")? {
        manager.register_zone_instance_variant(doc)?;
    }
    for value in load_category(data_store, "shops")? {
        manager.register_shop(value)?;
    }
    Ok(())
}

/// Walks the `scripts` category, evaluating each `.nut` file through
/// `host` and validating the resulting definition against its script
/// type's contract before registering it into `manager`.
pub fn load_scripts(
    data_store: &DataStore,
    host: &dyn ScriptHost,
    manager: &mut ServerDataManager,
) -> Result<(), ServerDataError> {
    let listing = data_store.list("scripts", true, true)?;
    let mut paths: Vec<&String> = listing.files.iter().filter(|path| path.ends_with(".nut")).collect();
    paths.sort();

    for path in paths {
        let definition = host.evaluate(path)?;
        script::validate(&definition)?;
        manager.register_script(definition)?;
    }
    Ok(())
}

//! Representative definition record types. The real catalog loads on the
//! order of forty tables; these cover every secondary-index rule so the
//! indexing and lookup machinery in [`super::catalog`] is exercised end
//! to end.

use crate::codec::{CodecResult, Packet};
use crate::definitions::table::DefinitionRecord;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FusionFlags: u8 {
        /// Demon participates in race-ordered fusion range lookups.
        const FUSION_RANGE = 0b0000_0001;
    }
}

#[derive(Debug, Clone)]
pub struct Demon {
    pub id: u32,
    pub name: String,
    pub race: u16,
    pub base_level: u16,
    pub fusion_flags: FusionFlags,
}

impl DefinitionRecord for Demon {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let name = reader.read_string(crate::codec::StringEncoding::Cp932, true)?;
        let race = reader.read_u16()?;
        let base_level = reader.read_u16()?;
        let fusion_flags = FusionFlags::from_bits_truncate(reader.read_u8()?);
        Ok(Self {
            id,
            name,
            race,
            base_level,
            fusion_flags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

impl DefinitionRecord for Item {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let name = reader.read_string(crate::codec::StringEncoding::Utf8, true)?;
        Ok(Self { id, name })
    }
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub id: u32,
    pub function_id: u32,
}

impl DefinitionRecord for Skill {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let function_id = reader.read_u32()?;
        Ok(Self { id, function_id })
    }
}

#[derive(Debug, Clone)]
pub struct Enchant {
    pub id: u32,
    pub demon_id: u32,
    pub item_id: u32,
}

impl DefinitionRecord for Enchant {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let demon_id = reader.read_u32()?;
        let item_id = reader.read_u32()?;
        Ok(Self {
            id,
            demon_id,
            item_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Disassembly {
    pub id: u32,
    pub item_id: u32,
}

impl DefinitionRecord for Disassembly {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let item_id = reader.read_u32()?;
        Ok(Self { id, item_id })
    }
}

#[derive(Debug, Clone)]
pub struct Modification {
    pub id: u32,
    pub item_id: u32,
}

impl DefinitionRecord for Modification {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let item_id = reader.read_u32()?;
        Ok(Self { id, item_id })
    }
}

/// An equipment set references up to four equipment item ids, zero meaning
/// "no item in this slot".
#[derive(Debug, Clone)]
pub struct EquipmentSet {
    pub id: u32,
    pub equipment_ids: [u32; 4],
}

impl EquipmentSet {
    pub fn equipment_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.equipment_ids.iter().copied().filter(|id| *id != 0)
    }
}

impl DefinitionRecord for EquipmentSet {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let mut equipment_ids = [0u32; 4];
        for slot in equipment_ids.iter_mut() {
            *slot = reader.read_u32()?;
        }
        Ok(Self { id, equipment_ids })
    }
}

/// A fused demon formed from three source demons, indexed by each source.
#[derive(Debug, Clone)]
pub struct TriUnionSpecial {
    pub id: u32,
    pub source_demon_ids: [u32; 3],
    pub result_demon_id: u32,
}

impl DefinitionRecord for TriUnionSpecial {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let mut source_demon_ids = [0u32; 3];
        for slot in source_demon_ids.iter_mut() {
            *slot = reader.read_u32()?;
        }
        let result_demon_id = reader.read_u32()?;
        Ok(Self {
            id,
            source_demon_ids,
            result_demon_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SpecialTitle {
    pub id: u32,
    pub title: String,
}

impl DefinitionRecord for SpecialTitle {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let title = reader.read_string(crate::codec::StringEncoding::Utf8, true)?;
        Ok(Self { id, title })
    }
}

/// A dynamic-map binds a zone to the name of a separately loaded spot-data
/// file (several dynamic maps may share one spot-data file).
#[derive(Debug, Clone)]
pub struct DynamicMap {
    pub id: u32,
    pub spot_data_file: String,
}

impl DefinitionRecord for DynamicMap {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, _hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let spot_data_file = reader.read_string(crate::codec::StringEncoding::Utf8, true)?;
        Ok(Self { id, spot_data_file })
    }
}

/// Devil-boost lot entries: each lot awards some number of demon ids.
#[derive(Debug, Clone)]
pub struct DevilBoostLot {
    pub id: u32,
    pub demon_ids: Vec<u32>,
}

impl DefinitionRecord for DevilBoostLot {
    fn id(&self) -> u32 {
        self.id
    }

    fn parse(reader: &mut Packet, hints: &[u16]) -> CodecResult<Self> {
        let id = reader.read_u32()?;
        let count = hints.first().copied().unwrap_or(0) as usize;
        let mut demon_ids = Vec::with_capacity(count);
        for _ in 0..count {
            demon_ids.push(reader.read_u32()?);
        }
        Ok(Self { id, demon_ids })
    }
}

/// Server-data-loaded overlay definitions, registered into the catalog
/// after the server-data catalog parses them from XML.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Tokusei {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SStatus {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnchantSetOverlay {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnchantSpecialOverlay {
    #[serde(rename = "ID")]
    pub id: u32,
}

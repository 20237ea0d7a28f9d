//! XML-defined overlay categories that carry no composition behavior of
//! their own today: the catalog only needs to know they exist and that
//! their ids don't collide. Each is kept in its own id-keyed table so a
//! later handler can start reading through a getter without touching the
//! load path again.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DemonPresent {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemonQuestReward {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropSet {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "ID")]
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneInstance {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "ZoneID")]
    pub zone_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Shop {
    #[serde(rename = "ID")]
    pub id: u32,
}

/// On-disk shape of a zone-instance-variant entry; `subtype_code` maps
/// onto [`super::ZoneInstanceVariantSubtype`] the way `NpcState`-style
/// codes elsewhere map onto their Rust enum.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneInstanceVariantDocument {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Subtype")]
    pub subtype_code: u8,
    #[serde(default, rename = "PentalphaSubID")]
    pub pentalpha_sub_id: u8,
    #[serde(default, rename = "TimePointCount")]
    pub time_point_count: u32,
}

use serde::{Deserialize, Serialize};

use crate::class::CharacterClass;
use crate::gps::GpsCategory;
use crate::status::Difficulty;
use crate::version::CharacterVersion;

/// Non-fatal conditions found on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    ChecksumMismatch { stored: u32, computed: u32 },
    FileSizeMismatch { stored: u32, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: CharacterVersion,
    pub name: String,
    pub class: CharacterClass,
    pub hardcore: bool,
    pub expansion: bool,
    pub title: u8,
    pub last_played: Difficulty,
    pub starting_act: u8,
    pub level: u32,
    pub experience: u32,
    pub gold: u32,
    pub stash_gold: u32,
    pub attributes: Vec<AttributeEntry>,
    pub skills: Vec<u8>,
    pub waypoints_active: Vec<usize>,
    pub items: Vec<ItemEntry>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeEntry {
    pub name: String,
    pub value: u32,
    pub raw: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemEntry {
    pub index: usize,
    pub len: usize,
    pub location: String,
    pub socketed_into: Option<usize>,
    pub code: Option<String>,
    pub category: Option<GpsCategory>,
}

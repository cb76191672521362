use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::checksum::read_u32_le;
use crate::class::CharacterClass;
use crate::d2s::attributes::Attribute;
use crate::d2s::items::Item;
use crate::d2s::quests::QuestState;
use crate::d2s::waypoints::WAYPOINT_COUNT;
use crate::d2s::{CharacterRecord, Document};
use crate::gps::{self, GpsCode, codes};
use crate::interchange::{self, Naming};
use crate::status::{CharacterStatus, Difficulty, DifficultyState};
use crate::version::CharacterVersion;

use super::error::{CoreError, CoreErrorCode};
use super::types::{AttributeEntry, ItemEntry, Snapshot, Warning};

/// An open character save. Edits patch the in-memory image; [`Character::save`]
/// writes it back atomically.
#[derive(Debug)]
pub struct Character {
    path: Option<PathBuf>,
    document: Document,
    warnings: Vec<Warning>,
}

impl Character {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        let mut character = Self::from_bytes(bytes)?;
        character.path = Some(path.to_path_buf());
        Ok(character)
    }

    pub fn from_bytes<B: AsRef<[u8]>>(bytes: B) -> Result<Self, CoreError> {
        let document = Document::parse_bytes(bytes.as_ref())
            .map_err(|e| CoreError::from_codec("failed to parse character save", e))?;
        let warnings = integrity_warnings(&document)?;
        for warning in &warnings {
            warn!("{}: {warning:?}", document.record().name);
        }
        Ok(Self {
            path: None,
            document,
            warnings,
        })
    }

    /// Synthesize a new character from an interchange document. It has no
    /// path until [`Character::save_as`].
    pub fn from_document(value: &Value, naming: Naming) -> Result<Self, CoreError> {
        let document = interchange::document_from_value(value, naming)
            .map_err(|e| CoreError::from_codec("failed to build character from document", e))?;
        Ok(Self {
            path: None,
            document,
            warnings: Vec::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self) -> &CharacterRecord {
        self.document.record()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn version(&self) -> CharacterVersion {
        self.document.version()
    }

    pub fn name(&self) -> &str {
        &self.record().name
    }

    pub fn class(&self) -> CharacterClass {
        self.record().class
    }

    pub fn status(&self) -> CharacterStatus {
        self.record().status
    }

    pub fn attribute(&self, attr: Attribute) -> u32 {
        self.record().attributes.get(attr)
    }

    pub fn level(&self) -> u32 {
        self.attribute(Attribute::Level)
    }

    pub fn experience(&self) -> u32 {
        self.attribute(Attribute::Experience)
    }

    pub fn skill(&self, index: usize) -> Option<u8> {
        self.record().skills.get(index).copied()
    }

    pub fn quest_state(&self, difficulty: Difficulty, act: usize, quest: usize) -> Option<QuestState> {
        self.record().quests[difficulty.index()].quest_state(act, quest)
    }

    pub fn is_act_completed(&self, difficulty: Difficulty, act: usize) -> bool {
        self.record().quests[difficulty.index()].is_act_completed(act)
    }

    pub fn waypoint_active(&self, difficulty: Difficulty, index: usize) -> bool {
        self.record().waypoint_active(difficulty, index)
    }

    pub fn items(&self) -> &[Item] {
        &self.record().items.items
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_checksum_valid(&self) -> Result<bool, CoreError> {
        self.document
            .is_checksum_valid()
            .map_err(|e| CoreError::from_codec("failed to verify checksum", e))
    }

    pub fn is_file_size_valid(&self) -> bool {
        self.document.is_file_size_valid()
    }

    pub fn is_modified(&self) -> bool {
        self.document.is_modified()
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), CoreError> {
        self.document
            .set_name(name)
            .map_err(|e| CoreError::from_codec("failed to set name", e))
    }

    pub fn set_class(&mut self, class: CharacterClass) -> Result<(), CoreError> {
        self.document
            .set_class(class)
            .map_err(|e| CoreError::from_codec("failed to set class", e))
    }

    pub fn set_status(&mut self, status: CharacterStatus) -> Result<(), CoreError> {
        self.document
            .set_status(status)
            .map_err(|e| CoreError::from_codec("failed to set status", e))
    }

    pub fn set_title(&mut self, title: u8) -> Result<(), CoreError> {
        self.document
            .set_title(title)
            .map_err(|e| CoreError::from_codec("failed to set title", e))
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyState) -> Result<(), CoreError> {
        self.document
            .set_difficulty(difficulty)
            .map_err(|e| CoreError::from_codec("failed to set difficulty", e))
    }

    /// Returns the stored value after clamping.
    pub fn set_attribute(&mut self, attr: Attribute, value: u32) -> Result<u32, CoreError> {
        self.document
            .set_attribute(attr, value)
            .map_err(|e| CoreError::from_codec(&format!("failed to set {attr}"), e))
    }

    pub fn set_skill(&mut self, index: usize, level: u8) -> Result<u8, CoreError> {
        self.document
            .set_skill(index, level)
            .map_err(|e| CoreError::from_codec(&format!("failed to set skill {index}"), e))
    }

    pub fn set_quest_state(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        quest: usize,
        state: QuestState,
    ) -> Result<(), CoreError> {
        self.document
            .set_quest_state(difficulty, act, quest, state)
            .map_err(|e| CoreError::from_codec("failed to set quest state", e))
    }

    pub fn set_act_completed(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        completed: bool,
    ) -> Result<(), CoreError> {
        self.document
            .set_act_completed(difficulty, act, completed)
            .map_err(|e| CoreError::from_codec("failed to set act completion", e))
    }

    pub fn set_act_introduced(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        introduced: bool,
    ) -> Result<(), CoreError> {
        self.document
            .set_act_introduced(difficulty, act, introduced)
            .map_err(|e| CoreError::from_codec("failed to set act introduction", e))
    }

    pub fn set_waypoint(
        &mut self,
        difficulty: Difficulty,
        index: usize,
        active: bool,
    ) -> Result<(), CoreError> {
        self.document
            .set_waypoint(difficulty, index, active)
            .map_err(|e| CoreError::from_codec("failed to set waypoint", e))
    }

    /// Convert every item recognized as `existing` to `desired`; placement
    /// rejections are skipped and not counted.
    pub fn convert_gps(&mut self, existing: GpsCode, desired: GpsCode) -> Result<usize, CoreError> {
        self.document
            .convert_gps(existing, desired)
            .map_err(|e| CoreError::from_codec(&format!("failed to convert {existing} to {desired}"), e))
    }

    pub fn update_gem(&mut self, index: usize, desired: GpsCode) -> Result<bool, CoreError> {
        self.document
            .update_gem(index, desired)
            .map_err(|e| CoreError::from_codec(&format!("failed to update item {index}"), e))
    }

    pub fn upgrade_gems(&mut self) -> Result<usize, CoreError> {
        self.convert_pairs(&codes::gem_upgrades(), "gems")
    }

    pub fn upgrade_potions(&mut self) -> Result<usize, CoreError> {
        self.convert_pairs(&codes::potion_upgrades(), "potions")
    }

    pub fn upgrade_rejuvenation_potions(&mut self) -> Result<usize, CoreError> {
        self.convert_pairs(&codes::rejuvenation_upgrades(), "rejuvenation potions")
    }

    fn convert_pairs(&mut self, pairs: &[(GpsCode, GpsCode)], label: &str) -> Result<usize, CoreError> {
        self.document
            .convert_gps_pairs(pairs)
            .map_err(|e| CoreError::from_codec(&format!("failed to upgrade {label}"), e))
    }

    pub fn to_document(&self, naming: Naming) -> Result<Value, CoreError> {
        interchange::to_value(self.record(), naming).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to export character document: {e}"),
            )
        })
    }

    pub fn apply_document(&mut self, value: &Value, naming: Naming) -> Result<(), CoreError> {
        interchange::apply_value(&mut self.document, value, naming)
            .map_err(|e| CoreError::from_codec("failed to apply character document", e))
    }

    pub fn snapshot(&self) -> Snapshot {
        let record = self.record();
        Snapshot {
            version: record.version,
            name: record.name.clone(),
            class: record.class,
            hardcore: record.status.is_hardcore(),
            expansion: record.status.is_expansion(),
            title: record.title,
            last_played: record.difficulty.last_played,
            starting_act: record.difficulty.starting_act,
            level: record.attributes.get(Attribute::Level),
            experience: record.attributes.get(Attribute::Experience),
            gold: record.attributes.get(Attribute::Gold),
            stash_gold: record.attributes.get(Attribute::StashGold),
            attributes: Attribute::ALL
                .into_iter()
                .map(|attr| AttributeEntry {
                    name: attr.name().to_string(),
                    value: record.attributes.get(attr),
                    raw: record.attributes.raw(attr),
                })
                .collect(),
            skills: record.skills.to_vec(),
            waypoints_active: Difficulty::ALL
                .into_iter()
                .map(|d| {
                    (0..WAYPOINT_COUNT)
                        .filter(|&i| record.waypoint_active(d, i))
                        .count()
                })
                .collect(),
            items: record
                .items
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let code = gps::recognize(item);
                    ItemEntry {
                        index,
                        len: item.len(),
                        location: item.location().to_string(),
                        socketed_into: item.parent(),
                        code: code.map(|c| c.to_string()),
                        category: code.and_then(|c| c.category()),
                    }
                })
                .collect(),
            warnings: self.warnings.clone(),
        }
    }

    /// Current image with file size and checksum recomputed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.document.to_bytes_modified().map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to emit modified bytes: {e}"),
            )
        })
    }

    pub fn to_bytes_unmodified(&self) -> Result<Vec<u8>, CoreError> {
        self.document.to_bytes_unmodified().map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to emit unmodified bytes: {e}"),
            )
        })
    }

    pub fn save(&mut self) -> Result<(), CoreError> {
        let path = self.path.clone().ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::UnsupportedOperation,
                "character has no file path; use save_as",
            )
        })?;
        self.save_as(path)
    }

    /// Finalize size and checksum, then stage the image next to `path` and
    /// move it into place. The target is untouched if any step fails.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CoreError> {
        let path = path.as_ref();
        self.document
            .finalize()
            .map_err(|e| CoreError::from_codec("failed to finalize save", e))?;
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to write {}: {e}", path.display()),
            )
        })?;
        info!("saved {} ({} bytes) to {}", self.name(), bytes.len(), path.display());
        self.document.mark_saved();
        self.path = Some(path.to_path_buf());
        self.warnings.clear();
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn integrity_warnings(document: &Document) -> Result<Vec<Warning>, CoreError> {
    let mut warnings = Vec::new();
    let record = document.record();
    let layout = record.version.layout();

    if let Some(offset) = layout.checksum_offset {
        let image = document
            .to_bytes_unmodified()
            .map_err(|e| CoreError::from_codec("failed to verify checksum", e))?;
        let computed = crate::checksum::compute_checksum(&image, Some(offset));
        let stored = read_u32_le(&image, offset).unwrap_or_default();
        if stored != computed {
            warnings.push(Warning::ChecksumMismatch { stored, computed });
        }
    }

    if let Some(stored) = record.file_size {
        let actual = document.layout().file_len;
        if stored as usize != actual {
            warnings.push(Warning::FileSizeMismatch { stored, actual });
        }
    }
    Ok(warnings)
}

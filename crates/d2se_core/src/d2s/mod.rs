pub mod attributes;
pub mod header;
pub mod items;
pub mod quests;
pub mod skills;
pub mod types;
pub mod waypoints;

use std::io::{self, Read};

use log::debug;

use crate::checksum::{apply_checksum, compute_checksum, read_u32_le};
use crate::class::CharacterClass;
use crate::gps::{self, GpsCode};
use crate::layout::{ByteRange, FileLayout, SectionId, SectionLayout};
use crate::status::{CharacterStatus, Difficulty, DifficultyState};
use crate::version::{
    CharacterVersion, ItemListLayout, MAGIC, MAGIC_OFFSET, check_magic, read_raw_version,
};
use attributes::{Attribute, AttributeSet};
use header::BasicInfo;
use items::{ItemFormat, ItemList};
use quests::{ActProgress, QuestState};
use skills::{SKILL_BLOCK_LEN, SKILL_COUNT};
use types::{
    ATTRIBUTE_MARKER, DIFFICULTY_COUNT, NPC_BLOCK_LEN, NPC_HEADER_LEN, NPC_MARKER, QUEST_MARKER,
    SKILL_MARKER, WAYPOINT_MARKER, find_marker, read_u16_le,
};
use waypoints::{WAYPOINT_BLOCK_LEN, WaypointSet};

const EXPANSION_ACT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub version: CharacterVersion,
    pub magic: [u8; 4],
    pub file_size: Option<u32>,
    pub checksum: Option<u32>,
    pub name: String,
    pub status: CharacterStatus,
    pub title: u8,
    pub class: CharacterClass,
    pub display_level: u8,
    pub difficulty: DifficultyState,
    pub quests: [ActProgress; DIFFICULTY_COUNT],
    pub waypoints: [WaypointSet; DIFFICULTY_COUNT],
    pub skills: [u8; SKILL_COUNT],
    pub attributes: AttributeSet,
    pub items: ItemList,
}

impl CharacterRecord {
    /// A level 1 character of `class` with the class's starting attributes.
    pub fn new(version: CharacterVersion, name: &str, class: CharacterClass) -> Self {
        let layout = version.layout();
        let mut attributes = AttributeSet::default();
        if let Some(base) = class.base() {
            attributes.set(Attribute::Strength, base.strength);
            attributes.set(Attribute::Dexterity, base.dexterity);
            attributes.set(Attribute::Energy, base.energy);
            attributes.set(Attribute::Vitality, base.vitality);
            attributes.set(Attribute::Life, base.life);
            attributes.set(Attribute::MaxLife, base.life);
            attributes.set(Attribute::Mana, base.mana);
            attributes.set(Attribute::MaxMana, base.mana);
            attributes.set(Attribute::Stamina, base.stamina);
            attributes.set(Attribute::MaxStamina, base.stamina);
        }
        attributes.set(Attribute::Level, 1);

        let status = if layout.has_expansion_quests() && !version.is_legacy() {
            CharacterStatus::EXPANSION
        } else {
            CharacterStatus::empty()
        };

        Self {
            version,
            magic: MAGIC,
            file_size: None,
            checksum: None,
            name: name.to_string(),
            status,
            title: 0,
            class,
            display_level: 1,
            difficulty: DifficultyState::default(),
            quests: std::array::from_fn(|_| ActProgress::new(layout.quest_difficulty_len / 2)),
            waypoints: [WaypointSet::default(); DIFFICULTY_COUNT],
            skills: [0; SKILL_COUNT],
            attributes,
            items: ItemList::empty(layout.item_layout),
        }
    }

    pub fn basic_info(&self) -> BasicInfo {
        BasicInfo {
            name: self.name.clone(),
            status: self.status,
            title: self.title,
            class: self.class,
            display_level: self.display_level,
            difficulty: self.difficulty,
        }
    }

    /// Act V exists only for expansion characters of a generation that
    /// stores it.
    pub fn has_act_v(&self) -> bool {
        self.status.is_expansion() && self.version.layout().has_expansion_quests()
    }

    /// Waypoint state after repair against the same difficulty's quests.
    pub fn waypoint_active(&self, difficulty: Difficulty, index: usize) -> bool {
        let d = difficulty.index();
        self.waypoints[d].is_active(index, &self.quests[d], self.has_act_v())
    }
}

#[derive(Debug)]
pub struct Document {
    record: CharacterRecord,
    layout: FileLayout,
    section_blobs: Vec<SectionBlob>,
    original_section_blobs: Vec<SectionBlob>,
    original_file_len: usize,
    /// encoded attribute bytes at the start of the attribute section
    attribute_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SectionBlob {
    bytes: Vec<u8>,
}

struct Capture<'a> {
    source: &'a [u8],
    sections: Vec<SectionLayout>,
    blobs: Vec<SectionBlob>,
}

impl<'a> Capture<'a> {
    fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            sections: Vec::new(),
            blobs: Vec::new(),
        }
    }

    fn record(&mut self, id: SectionId, start: usize, end: usize) {
        debug!("section {id:?} at {start}..{end}");
        self.sections.push(SectionLayout {
            id,
            range: ByteRange { start, end },
        });
        self.blobs.push(SectionBlob {
            bytes: self.source[start..end].to_vec(),
        });
    }
}

impl Document {
    pub fn parse_with_layout<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse_bytes(&bytes)
    }

    pub fn parse_bytes(bytes: &[u8]) -> io::Result<Self> {
        check_magic(bytes)?;
        let raw_version = read_raw_version(bytes)?;
        let mut version = CharacterVersion::detect(raw_version)?;
        let layout = version.layout();
        debug!("detected character version {version} (raw {raw_version})");

        let info = header::parse_basic_info(bytes, layout)?;
        let fixed_header_end = layout.difficulty_offset + layout.difficulty_len();

        let quest_at = require_marker(bytes, QUEST_MARKER, fixed_header_end, "quest")?;
        let quests = quests::parse_quest_block(&bytes[quest_at..], layout)?;
        let quest_end = quest_at + quests::quest_block_len(layout);

        let waypoint_at = require_marker(bytes, WAYPOINT_MARKER, quest_end, "waypoint")?;
        let waypoints = waypoints::parse_waypoint_block(&bytes[waypoint_at..])?;
        let waypoint_end = waypoint_at + WAYPOINT_BLOCK_LEN;

        let npc_at = if layout.has_npc_block {
            let first_attribute = find_marker(bytes, ATTRIBUTE_MARKER, waypoint_end);
            find_marker(bytes, NPC_MARKER, waypoint_end)
                .filter(|&at| first_attribute.is_none_or(|gf| at < gf))
        } else {
            None
        };
        let attribute_search = match npc_at {
            Some(at) => {
                let declared = read_u16_le(bytes, at + NPC_MARKER.len()).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "NPC block truncated before its length",
                    )
                })?;
                at + usize::from(declared).max(NPC_HEADER_LEN)
            }
            None => waypoint_end,
        };

        let attribute_at = require_marker(bytes, ATTRIBUTE_MARKER, attribute_search, "attribute")?;
        let (attributes, attribute_len) =
            attributes::decode(layout.attribute_codec, &bytes[attribute_at..])?;

        let skills_at = require_marker(
            bytes,
            SKILL_MARKER,
            attribute_at + attribute_len,
            "skill",
        )?;
        let skills = skills::parse_skill_block(&bytes[skills_at..])?;
        let items_at = skills_at + SKILL_BLOCK_LEN;

        let (items, items_end) = match layout.item_layout {
            ItemListLayout::Legacy => (items::parse_legacy(bytes, items_at), bytes.len()),
            ItemListLayout::Counted => items::parse_counted(bytes, items_at)?,
        };

        if version == CharacterVersion::V104
            && !items.items.is_empty()
            && items
                .items
                .iter()
                .all(|item| item.format() == ItemFormat::LegacyFull)
        {
            version = CharacterVersion::V100;
            debug!("all item records are full-length; treating save as {version}");
        }

        let mut capture = Capture::new(bytes);
        capture.record(SectionId::Header, 0, quest_at);
        capture.record(SectionId::Quests, quest_at, waypoint_at);
        match npc_at {
            Some(at) => {
                capture.record(SectionId::Waypoints, waypoint_at, at);
                capture.record(SectionId::NpcIntro, at, attribute_at);
            }
            None => capture.record(SectionId::Waypoints, waypoint_at, attribute_at),
        }
        capture.record(SectionId::Attributes, attribute_at, skills_at);
        capture.record(SectionId::Skills, skills_at, items_at);
        capture.record(SectionId::Items, items_at, items_end);
        if items_end < bytes.len() {
            capture.record(SectionId::Tail, items_end, bytes.len());
        }

        let file_len = bytes.len();
        let layout_map = FileLayout {
            file_len,
            sections: capture.sections,
        };
        layout_map.validate()?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[MAGIC_OFFSET..MAGIC_OFFSET + 4]);

        let record = CharacterRecord {
            version,
            magic,
            file_size: layout.file_size_offset.and_then(|at| read_u32_le(bytes, at)),
            checksum: layout.checksum_offset.and_then(|at| read_u32_le(bytes, at)),
            name: info.name,
            status: info.status,
            title: info.title,
            class: info.class,
            display_level: info.display_level,
            difficulty: info.difficulty,
            quests,
            waypoints,
            skills,
            attributes,
            items,
        };

        let original_section_blobs = capture.blobs.clone();
        Ok(Self {
            record,
            layout: layout_map,
            section_blobs: capture.blobs,
            original_section_blobs,
            original_file_len: file_len,
            attribute_len,
        })
    }

    /// Build a complete save image from a record.
    pub fn from_record(mut record: CharacterRecord) -> io::Result<Self> {
        let layout = record.version.layout();
        if record.items.layout != layout.item_layout {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "item list layout {:?} does not match version {}",
                    record.items.layout, record.version
                ),
            ));
        }
        for progress in &mut record.quests {
            progress.resize(layout.quest_difficulty_len / 2);
        }
        record.magic = MAGIC;

        let mut blobs = vec![
            (
                SectionId::Header,
                header::synthesize_header(record.version, &record.basic_info())?,
            ),
            (
                SectionId::Quests,
                quests::encode_quest_block(layout, &record.quests),
            ),
            (
                SectionId::Waypoints,
                waypoints::encode_waypoint_block(&record.waypoints),
            ),
        ];
        if layout.has_npc_block {
            blobs.push((SectionId::NpcIntro, synthesize_npc_block()));
        }
        let attribute_blob = attributes::encode(layout.attribute_codec, &record.attributes);
        let attribute_len = attribute_blob.len();
        blobs.push((SectionId::Attributes, attribute_blob));
        blobs.push((SectionId::Skills, skills::encode_skill_block(&record.skills)));
        blobs.push((SectionId::Items, record.items.encode()));

        let mut sections = Vec::with_capacity(blobs.len());
        let mut section_blobs = Vec::with_capacity(blobs.len());
        let mut at = 0usize;
        for (id, bytes) in blobs {
            sections.push(SectionLayout {
                id,
                range: ByteRange {
                    start: at,
                    end: at + bytes.len(),
                },
            });
            at += bytes.len();
            section_blobs.push(SectionBlob { bytes });
        }

        let layout_map = FileLayout {
            file_len: at,
            sections,
        };
        layout_map.validate()?;

        let mut doc = Self {
            record,
            layout: layout_map,
            original_section_blobs: section_blobs.clone(),
            section_blobs,
            original_file_len: at,
            attribute_len,
        };
        doc.finalize()?;
        doc.original_section_blobs = doc.section_blobs.clone();
        Ok(doc)
    }

    pub fn record(&self) -> &CharacterRecord {
        &self.record
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn version(&self) -> CharacterVersion {
        self.record.version
    }

    pub fn is_modified(&self) -> bool {
        self.section_blobs != self.original_section_blobs
    }

    pub fn to_bytes_unmodified(&self) -> io::Result<Vec<u8>> {
        emit_from_blobs(
            &self.original_section_blobs,
            self.original_file_len,
            "unmodified",
        )
    }

    /// Current image with file size and checksum recomputed where the
    /// version stores them.
    pub fn to_bytes_modified(&self) -> io::Result<Vec<u8>> {
        let mut out = self.current_image()?;
        self.stamp_integrity(&mut out)?;
        Ok(out)
    }

    /// Write the recomputed file size and checksum back into the header
    /// section and the record.
    pub fn finalize(&mut self) -> io::Result<()> {
        let image = self.to_bytes_modified()?;
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        for offset in [layout.file_size_offset, layout.checksum_offset]
            .into_iter()
            .flatten()
        {
            blob.bytes[offset..offset + 4].copy_from_slice(&image[offset..offset + 4]);
        }
        self.record.file_size = layout
            .file_size_offset
            .and_then(|at| read_u32_le(&image, at));
        self.record.checksum = layout
            .checksum_offset
            .and_then(|at| read_u32_le(&image, at));
        Ok(())
    }

    /// Adopt the current image as the original one, after it has been
    /// written out.
    pub fn mark_saved(&mut self) {
        self.original_section_blobs = self.section_blobs.clone();
        self.original_file_len = self.layout.file_len;
    }

    /// Stored checksum of the current image against a fresh computation.
    /// Versions without a checksum always pass.
    pub fn is_checksum_valid(&self) -> io::Result<bool> {
        let Some(offset) = self.record.version.layout().checksum_offset else {
            return Ok(true);
        };
        let image = self.current_image()?;
        Ok(read_u32_le(&image, offset) == Some(compute_checksum(&image, Some(offset))))
    }

    pub fn is_file_size_valid(&self) -> bool {
        match self.record.version.layout().file_size_offset {
            Some(_) => self.record.file_size == Some(self.layout.file_len as u32),
            None => true,
        }
    }

    pub fn computed_checksum(&self) -> io::Result<Option<u32>> {
        let offset = self.record.version.layout().checksum_offset;
        let image = self.current_image()?;
        Ok(offset.map(|at| compute_checksum(&image, Some(at))))
    }

    pub fn set_name(&mut self, name: &str) -> io::Result<()> {
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        header::patch_name(&mut blob.bytes, layout, name)?;
        self.record.name = name.to_string();
        Ok(())
    }

    pub fn set_status(&mut self, status: CharacterStatus) -> io::Result<()> {
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        header::patch_status(&mut blob.bytes, layout, status)?;
        self.record.status = status;
        Ok(())
    }

    pub fn set_title(&mut self, title: u8) -> io::Result<()> {
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        header::patch_title(&mut blob.bytes, layout, title)?;
        self.record.title = title;
        Ok(())
    }

    pub fn set_class(&mut self, class: CharacterClass) -> io::Result<()> {
        if class.is_expansion_only() && !self.record.status.is_expansion() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{class} requires an expansion character"),
            ));
        }
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        header::patch_class(&mut blob.bytes, layout, class)?;
        self.record.class = class;
        Ok(())
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyState) -> io::Result<()> {
        if usize::from(difficulty.starting_act) >= crate::status::ACT_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "invalid starting act {}, expected 0..{}",
                    difficulty.starting_act,
                    crate::status::ACT_COUNT - 1
                ),
            ));
        }
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Header)?;
        header::patch_difficulty(&mut blob.bytes, layout, difficulty)?;
        self.record.difficulty = difficulty;
        Ok(())
    }

    /// Set an attribute in whole units, clamped to its width. Level,
    /// vitality and energy also move the derived pools; level also updates
    /// the header's display level. Returns the stored value.
    pub fn set_attribute(&mut self, attr: Attribute, value: u32) -> io::Result<u32> {
        let mut set = self.record.attributes;
        let old = set.get(attr);
        let stored = set.set(attr, value);
        if matches!(attr, Attribute::Level | Attribute::Vitality | Attribute::Energy) {
            set.apply_growth(self.record.class, attr, old, stored);
        }
        set.reconcile();
        self.replace_attributes(set)?;
        Ok(stored)
    }

    /// Replace the whole attribute block without derived-value growth.
    pub fn replace_attributes(&mut self, attributes: AttributeSet) -> io::Result<()> {
        let codec = self.record.version.layout().attribute_codec;
        let encoded = attributes::encode(codec, &attributes);
        let index = self.section_index(SectionId::Attributes)?;
        let trailing = self.section_blobs[index]
            .bytes
            .get(self.attribute_len..)
            .unwrap_or_default()
            .to_vec();
        let new_len = encoded.len();
        let mut bytes = encoded;
        bytes.extend_from_slice(&trailing);
        self.replace_section_blob(SectionId::Attributes, bytes)?;
        self.attribute_len = new_len;
        self.record.attributes = attributes;

        let level = attributes.get(Attribute::Level).min(u32::from(u8::MAX)) as u8;
        if level != self.record.display_level {
            let layout = self.record.version.layout();
            let blob = self.section_blob_mut(SectionId::Header)?;
            header::patch_display_level(&mut blob.bytes, layout, level)?;
            self.record.display_level = level;
        }
        Ok(())
    }

    pub fn set_skill(&mut self, index: usize, level: u8) -> io::Result<u8> {
        let blob = self.section_blob_mut(SectionId::Skills)?;
        let stored = skills::patch_skill(&mut blob.bytes, index, level)?;
        self.record.skills[index] = stored;
        Ok(stored)
    }

    pub fn set_quest_state(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        quest: usize,
        state: QuestState,
    ) -> io::Result<()> {
        self.require_act(act)?;
        self.update_quests(difficulty, |p| p.set_quest_state(act, quest, state))
    }

    pub fn set_act_completed(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        completed: bool,
    ) -> io::Result<()> {
        self.require_act(act)?;
        self.update_quests(difficulty, |p| p.set_act_completed(act, completed))
    }

    pub fn set_act_introduced(
        &mut self,
        difficulty: Difficulty,
        act: usize,
        introduced: bool,
    ) -> io::Result<()> {
        self.require_act(act)?;
        self.update_quests(difficulty, |p| p.set_act_introduced(act, introduced))
    }

    pub fn replace_quests(&mut self, difficulty: Difficulty, progress: ActProgress) -> io::Result<()> {
        self.update_quests(difficulty, |p| {
            let words = p.word_count();
            *p = progress;
            p.resize(words);
            Ok(())
        })
    }

    /// Store a waypoint bit. The whole difficulty record is rewritten in its
    /// repaired form.
    pub fn set_waypoint(&mut self, difficulty: Difficulty, index: usize, active: bool) -> io::Result<()> {
        let d = difficulty.index();
        let mut set = self.record.waypoints[d].repaired(&self.record.quests[d], self.record.has_act_v());
        set.set_stored(index, active)?;
        self.replace_waypoints(difficulty, set)
    }

    pub fn replace_waypoints(&mut self, difficulty: Difficulty, set: WaypointSet) -> io::Result<()> {
        let d = difficulty.index();
        let blob = self.section_blob_mut(SectionId::Waypoints)?;
        waypoints::patch_waypoint_record(&mut blob.bytes, d, &set)?;
        self.record.waypoints[d] = set;
        Ok(())
    }

    /// Convert every item recognized as `existing`; see [`gps::convert_items`].
    pub fn convert_gps(&mut self, existing: GpsCode, desired: GpsCode) -> io::Result<usize> {
        let count = gps::convert_items(&mut self.record.items.items, existing, desired);
        if count > 0 {
            self.rewrite_items()?;
        }
        Ok(count)
    }

    pub fn convert_gps_pairs(&mut self, pairs: &[(GpsCode, GpsCode)]) -> io::Result<usize> {
        let count = gps::convert_all(&mut self.record.items.items, pairs);
        if count > 0 {
            self.rewrite_items()?;
        }
        Ok(count)
    }

    pub fn update_gem(&mut self, index: usize, desired: GpsCode) -> io::Result<bool> {
        let item = self.record.items.items.get_mut(index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no item at index {index}"),
            )
        })?;
        let converted = gps::update_item(item, desired);
        if converted {
            self.rewrite_items()?;
        }
        Ok(converted)
    }

    pub fn replace_items(&mut self, items: ItemList) -> io::Result<()> {
        if items.layout != self.record.items.layout {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "item list layout does not match the save",
            ));
        }
        self.record.items = items;
        self.rewrite_items()
    }

    /// Act V is editable only on expansion characters.
    fn require_act(&self, act: usize) -> io::Result<()> {
        if act == EXPANSION_ACT && !self.record.has_act_v() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("act {} requires an expansion character", act + 1),
            ));
        }
        Ok(())
    }

    fn update_quests<F>(&mut self, difficulty: Difficulty, apply: F) -> io::Result<()>
    where
        F: FnOnce(&mut ActProgress) -> io::Result<()>,
    {
        let d = difficulty.index();
        let mut progress = self.record.quests[d].clone();
        apply(&mut progress)?;
        let layout = self.record.version.layout();
        let blob = self.section_blob_mut(SectionId::Quests)?;
        quests::patch_difficulty(&mut blob.bytes, layout, d, &progress)?;
        self.record.quests[d] = progress;
        Ok(())
    }

    fn rewrite_items(&mut self) -> io::Result<()> {
        let bytes = self.record.items.encode();
        self.replace_section_blob(SectionId::Items, bytes)
    }

    fn current_image(&self) -> io::Result<Vec<u8>> {
        self.validate_modified_state()?;
        emit_from_blobs(&self.section_blobs, self.layout.file_len, "modified")
    }

    fn stamp_integrity(&self, image: &mut [u8]) -> io::Result<()> {
        let layout = self.record.version.layout();
        if let Some(offset) = layout.file_size_offset {
            header::patch_u32(image, offset, image.len() as u32, "file size")?;
        }
        if let Some(offset) = layout.checksum_offset {
            apply_checksum(image, offset).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "image too short for its checksum field",
                )
            })?;
        }
        Ok(())
    }

    fn section_blob_mut(&mut self, id: SectionId) -> io::Result<&mut SectionBlob> {
        let section_index = self.section_index(id)?;

        self.section_blobs.get_mut(section_index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "section blob list does not match recorded layout",
            )
        })
    }

    fn section_index(&self, id: SectionId) -> io::Result<usize> {
        self.layout
            .sections
            .iter()
            .position(|section| section.id == id)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("missing section {id:?}"),
                )
            })
    }

    fn replace_section_blob(&mut self, id: SectionId, bytes: Vec<u8>) -> io::Result<()> {
        let section_index = self.section_index(id)?;
        self.layout.resize_section(section_index, bytes.len())?;
        let slot = self.section_blobs.get_mut(section_index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "section blob list does not match recorded layout",
            )
        })?;
        slot.bytes = bytes;
        Ok(())
    }

    fn validate_modified_state(&self) -> io::Result<()> {
        if self.layout.sections.len() != self.section_blobs.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "layout/blob section count mismatch: {} layout sections, {} blobs",
                    self.layout.sections.len(),
                    self.section_blobs.len()
                ),
            ));
        }

        for (idx, (section, blob)) in self
            .layout
            .sections
            .iter()
            .zip(self.section_blobs.iter())
            .enumerate()
        {
            let expected = section.range.len();
            let actual = blob.bytes.len();
            if expected != actual {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "section/blob length mismatch at index {idx} ({:?}): layout={}, blob={}",
                        section.id, expected, actual
                    ),
                ));
            }
        }

        self.layout.validate()
    }
}

fn require_marker(bytes: &[u8], marker: &[u8], from: usize, label: &str) -> io::Result<usize> {
    find_marker(bytes, marker, from).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("missing {label} block marker after offset {from}"),
        )
    })
}

fn synthesize_npc_block() -> Vec<u8> {
    let mut out = vec![0u8; NPC_BLOCK_LEN];
    out[..NPC_MARKER.len()].copy_from_slice(NPC_MARKER);
    out[NPC_MARKER.len()..NPC_HEADER_LEN].copy_from_slice(&(NPC_BLOCK_LEN as u16).to_le_bytes());
    out
}

fn emit_from_blobs(
    blobs: &[SectionBlob],
    expected_len: usize,
    mode_label: &str,
) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    for blob in blobs {
        out.extend_from_slice(&blob.bytes);
    }

    if out.len() != expected_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{mode_label} emit length mismatch: got {}, expected {}",
                out.len(),
                expected_len
            ),
        ));
    }

    Ok(out)
}

//! Key/value document form of a character.
//!
//! The tree is a `serde_json::Value`. Two key conventions exist: serialized
//! (`max_life`) and plain (`MaxLife`). Exporting then importing onto the same
//! save leaves its bytes unchanged.

use std::collections::BTreeMap;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::class::CharacterClass;
use crate::d2s::attributes::Attribute;
use crate::d2s::items::{Item, ItemFormat, ItemList};
use crate::d2s::quests::ActProgress;
use crate::d2s::skills::SKILL_COUNT;
use crate::d2s::types::DIFFICULTY_COUNT;
use crate::d2s::waypoints::{WAYPOINT_COUNT, WaypointSet};
use crate::d2s::{CharacterRecord, Document};
use crate::gps;
use crate::status::{CharacterStatus, Difficulty, DifficultyState};
use crate::version::{CharacterVersion, ItemListLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Naming {
    Plain,
    #[default]
    Serialized,
}

impl Naming {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "plain" => Some(Self::Plain),
            "serialized" => Some(Self::Serialized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharacterDocument {
    pub version: u32,
    pub name: String,
    pub class: CharacterClass,
    pub status: StatusDocument,
    pub title: u8,
    pub difficulty: DifficultyState,
    pub attributes: BTreeMap<String, u32>,
    pub skills: Vec<u8>,
    pub quests: Vec<Vec<u16>>,
    pub waypoints: Vec<Vec<bool>>,
    pub items: Vec<ItemDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusDocument {
    pub hardcore: bool,
    pub resurrected: bool,
    pub expansion: bool,
    pub ladder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemDocument {
    pub hex: String,
    /// index of the item this one is socketed into
    #[serde(default)]
    pub parent: Option<usize>,
    /// recognized consumable code; informational, ignored on import
    #[serde(default)]
    pub code: Option<String>,
}

impl StatusDocument {
    fn from_status(status: CharacterStatus) -> Self {
        Self {
            hardcore: status.contains(CharacterStatus::HARDCORE),
            resurrected: status.contains(CharacterStatus::RESURRECTED),
            expansion: status.contains(CharacterStatus::EXPANSION),
            ladder: status.contains(CharacterStatus::LADDER),
        }
    }

    /// Named flags applied over `base`; unnamed bits of `base` survive.
    fn apply(&self, base: CharacterStatus) -> CharacterStatus {
        let mut out = base;
        out.set(CharacterStatus::HARDCORE, self.hardcore);
        out.set(CharacterStatus::RESURRECTED, self.resurrected);
        out.set(CharacterStatus::EXPANSION, self.expansion);
        out.set(CharacterStatus::LADDER, self.ladder);
        out
    }
}

impl CharacterDocument {
    pub fn from_record(record: &CharacterRecord) -> Self {
        Self {
            version: record.version.raw(),
            name: record.name.clone(),
            class: record.class,
            status: StatusDocument::from_status(record.status),
            title: record.title,
            difficulty: record.difficulty,
            attributes: Attribute::ALL
                .into_iter()
                .map(|attr| (attr.name().to_string(), record.attributes.get(attr)))
                .collect(),
            skills: record.skills.to_vec(),
            quests: record.quests.iter().map(|p| p.words().to_vec()).collect(),
            waypoints: record
                .waypoints
                .iter()
                .map(|set| (0..WAYPOINT_COUNT).map(|i| set.stored(i)).collect())
                .collect(),
            items: record
                .items
                .items
                .iter()
                .map(|item| ItemDocument {
                    hex: item.to_hex(),
                    parent: item.parent(),
                    code: gps::recognize(item).map(|c| c.to_string()),
                })
                .collect(),
        }
    }

    fn character_version(&self) -> io::Result<CharacterVersion> {
        // 1.00 and 1.04 share a raw version; a 1.00 document names it by its
        // full-length item records.
        let version = CharacterVersion::detect(self.version)?;
        if version == CharacterVersion::V104
            && !self.items.is_empty()
            && self.items.iter().all(|i| i.hex.len() / 2 == crate::d2s::items::LEGACY_FULL_LEN)
        {
            return Ok(CharacterVersion::V100);
        }
        Ok(version)
    }

    fn difficulty_count_check<T>(rows: &[T], label: &str) -> io::Result<()> {
        if rows.len() != DIFFICULTY_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {DIFFICULTY_COUNT} {label} rows, found {}", rows.len()),
            ));
        }
        Ok(())
    }

    fn skill_levels(&self) -> io::Result<[u8; SKILL_COUNT]> {
        self.skills.as_slice().try_into().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {SKILL_COUNT} skills, found {}", self.skills.len()),
            )
        })
    }

    fn item_list(&self, layout: ItemListLayout, base: Option<&ItemList>) -> io::Result<ItemList> {
        let mut list = match base {
            Some(existing) => ItemList {
                items: Vec::new(),
                ..existing.clone()
            },
            None => ItemList::empty(layout),
        };
        for entry in &self.items {
            let format = match layout {
                ItemListLayout::Counted => ItemFormat::Modern,
                ItemListLayout::Legacy => ItemFormat::legacy_for_len(entry.hex.len() / 2),
            };
            let item = Item::from_hex(&entry.hex, format)?.with_parent(entry.parent);
            list.items.push(item);
        }
        Ok(list)
    }

    fn waypoint_set(base: WaypointSet, bits: &[bool]) -> io::Result<WaypointSet> {
        let mut set = base;
        for (index, &value) in bits.iter().enumerate() {
            set.set_stored(index, value)?;
        }
        Ok(set)
    }
}

pub fn to_value(record: &CharacterRecord, naming: Naming) -> io::Result<Value> {
    let value = serde_json::to_value(CharacterDocument::from_record(record))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(match naming {
        Naming::Serialized => value,
        Naming::Plain => rename_keys(value, &snake_to_pascal),
    })
}

pub fn from_value(value: &Value, naming: Naming) -> io::Result<CharacterDocument> {
    let value = match naming {
        Naming::Serialized => value.clone(),
        Naming::Plain => rename_keys(value.clone(), &pascal_to_snake),
    };
    serde_json::from_value(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Synthesize a complete save image from a document.
pub fn document_from_value(value: &Value, naming: Naming) -> io::Result<Document> {
    let doc = from_value(value, naming)?;
    let version = doc.character_version()?;
    let layout = version.layout();
    CharacterDocument::difficulty_count_check(&doc.quests, "quest")?;
    CharacterDocument::difficulty_count_check(&doc.waypoints, "waypoint")?;
    crate::d2s::header::validate_name(&doc.name)?;

    let mut record = CharacterRecord::new(version, &doc.name, doc.class);
    record.status = doc.status.apply(CharacterStatus::empty());
    record.title = doc.title;
    record.difficulty = doc.difficulty;
    for (name, &value) in &doc.attributes {
        let attr = lookup_attribute(name)?;
        record.attributes.set(attr, value);
    }
    record.display_level = record
        .attributes
        .get(Attribute::Level)
        .min(u32::from(u8::MAX)) as u8;
    record.skills = doc.skill_levels()?;
    for (d, words) in doc.quests.iter().enumerate() {
        record.quests[d] = ActProgress::from_words(words.clone());
    }
    for (d, bits) in doc.waypoints.iter().enumerate() {
        record.waypoints[d] = CharacterDocument::waypoint_set(WaypointSet::default(), bits)?;
    }
    record.items = doc.item_list(layout.item_layout, None)?;

    Document::from_record(record)
}

/// Apply a document onto an open save, touching only what differs.
pub fn apply_value(target: &mut Document, value: &Value, naming: Naming) -> io::Result<()> {
    let doc = from_value(value, naming)?;
    let current = target.record().clone();
    if CharacterVersion::detect(doc.version)?.raw() != current.version.raw() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "document version {} does not match save version {}",
                doc.version,
                current.version.raw()
            ),
        ));
    }
    CharacterDocument::difficulty_count_check(&doc.quests, "quest")?;
    CharacterDocument::difficulty_count_check(&doc.waypoints, "waypoint")?;

    if doc.name != current.name {
        target.set_name(&doc.name)?;
    }
    let status = doc.status.apply(current.status);
    if status != current.status {
        target.set_status(status)?;
    }
    if doc.class != current.class {
        target.set_class(doc.class)?;
    }
    if doc.title != current.title {
        target.set_title(doc.title)?;
    }
    if doc.difficulty != current.difficulty {
        target.set_difficulty(doc.difficulty)?;
    }

    let mut attributes = current.attributes;
    for (name, &value) in &doc.attributes {
        attributes.set_preserving_fraction(lookup_attribute(name)?, value);
    }
    if attributes != current.attributes {
        target.replace_attributes(attributes)?;
    }

    let skills = doc.skill_levels()?;
    for (index, (&new, &old)) in skills.iter().zip(current.skills.iter()).enumerate() {
        if new != old {
            target.set_skill(index, new)?;
        }
    }

    for difficulty in Difficulty::ALL {
        let d = difficulty.index();
        let progress = ActProgress::from_words(doc.quests[d].clone());
        let mut resized = progress.clone();
        resized.resize(current.quests[d].word_count());
        if resized != current.quests[d] {
            target.replace_quests(difficulty, progress)?;
        }

        let set = CharacterDocument::waypoint_set(current.waypoints[d], &doc.waypoints[d])?;
        if set != current.waypoints[d] {
            target.replace_waypoints(difficulty, set)?;
        }
    }

    let items = doc.item_list(current.items.layout, Some(&current.items))?;
    if items != current.items {
        target.replace_items(items)?;
    }
    Ok(())
}

fn lookup_attribute(name: &str) -> io::Result<Attribute> {
    Attribute::from_name(name).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown attribute {name:?}"),
        )
    })
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (rename(&key), rename_keys(inner, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect())
        }
        other => other,
    }
}

pub fn snake_to_pascal(key: &str) -> String {
    key.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

pub fn pascal_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Naming, pascal_to_snake, snake_to_pascal};

    #[test]
    fn key_conventions_round_trip() {
        for key in ["max_life", "stat_points_left", "name", "last_played", "stash_gold"] {
            assert_eq!(pascal_to_snake(&snake_to_pascal(key)), key);
        }
        assert_eq!(snake_to_pascal("max_life"), "MaxLife");
        assert_eq!(pascal_to_snake("StartingAct"), "starting_act");
    }

    #[test]
    fn naming_from_name() {
        assert_eq!(Naming::from_name("Plain"), Some(Naming::Plain));
        assert_eq!(Naming::from_name("serialized"), Some(Naming::Serialized));
        assert_eq!(Naming::from_name("xml"), None);
    }
}

#![allow(dead_code)]

use d2se_core::bitstream::write_bits_at;
use d2se_core::class::CharacterClass;
use d2se_core::d2s::attributes::Attribute;
use d2se_core::d2s::items::{Item, ItemFormat, ItemList};
use d2se_core::d2s::{CharacterRecord, Document};
use d2se_core::version::{CharacterVersion, ItemListLayout};

pub const LOC_STORED: u8 = 0;
pub const LOC_EQUIPPED: u8 = 1;
pub const LOC_BELT: u8 = 2;
pub const LOC_SOCKETED: u8 = 6;

/// A 1.07+ record carrying only the fields the editor reads.
pub fn modern_item(code: &[u8; 4], location: u8, socketed: bool, filled: u8) -> Item {
    let mut bytes = vec![0u8; 16];
    bytes[..2].copy_from_slice(b"JM");
    if socketed {
        write_bits_at(&mut bytes, 27, 1, 1).unwrap();
    }
    write_bits_at(&mut bytes, 58, u64::from(location), 3).unwrap();
    let offset = if location == LOC_SOCKETED { 73 } else { 76 };
    write_bits_at(&mut bytes, offset, u64::from(u32::from_le_bytes(*code)), 32).unwrap();
    write_bits_at(&mut bytes, offset + 32, u64::from(filled), 3).unwrap();
    Item::new(bytes, ItemFormat::Modern)
}

pub fn legacy_item(len: usize, family: u8, variant: u8, location: u8) -> Item {
    let mut bytes = vec![0u8; len];
    bytes[..2].copy_from_slice(b"JM");
    bytes[6] = location;
    let at = if len == 27 { 12 } else { 9 };
    bytes[at] = family;
    bytes[at + 1] = variant;
    Item::new(bytes, ItemFormat::legacy_for_len(len))
}

/// Level 10 sorceress with some progress and a handful of items suited to
/// the version's item format.
pub fn record_for(version: CharacterVersion) -> CharacterRecord {
    let mut record = CharacterRecord::new(version, "Tester", CharacterClass::Sorceress);
    record.attributes.set(Attribute::Level, 10);
    record.attributes.set(Attribute::Experience, 12345);
    record.attributes.set(Attribute::Gold, 500);
    record.attributes.set(Attribute::StatPointsLeft, 5);
    record.display_level = 10;
    record.skills[0] = 3;
    record.skills[7] = 1;
    record.quests[0].set_act_introduced(0, true).unwrap();
    record.quests[0].set_act_completed(0, true).unwrap();
    record.waypoints[0].set_stored(3, true).unwrap();

    let layout = version.layout();
    let mut items = ItemList::empty(layout.item_layout);
    items.items = match (layout.item_layout, version) {
        (ItemListLayout::Counted, _) => vec![
            modern_item(b"swd ", LOC_EQUIPPED, true, 1),
            modern_item(b"gcr ", LOC_SOCKETED, false, 0).with_parent(Some(0)),
            modern_item(b"hp1 ", LOC_BELT, false, 0),
            modern_item(b"gcb ", LOC_STORED, false, 0),
        ],
        (ItemListLayout::Legacy, CharacterVersion::V100) => vec![
            legacy_item(27, 0x11, 0x02, LOC_STORED),
            legacy_item(27, 0x20, 0x01, LOC_BELT),
        ],
        (ItemListLayout::Legacy, _) => vec![
            legacy_item(15, 0x31, 0x42, LOC_STORED),
            legacy_item(15, 0x38, 0x10, LOC_BELT),
        ],
    };
    record.items = items;
    record
}

/// 1.10 character whose only consumable is a chipped ruby in a sword.
pub fn socketed_gem_record() -> CharacterRecord {
    let mut record = record_for(CharacterVersion::V110);
    record.items.items = vec![
        modern_item(b"swd ", LOC_EQUIPPED, true, 1),
        modern_item(b"gcr ", LOC_SOCKETED, false, 0).with_parent(Some(0)),
    ];
    record
}

pub fn image(record: CharacterRecord) -> Vec<u8> {
    Document::from_record(record)
        .expect("failed to synthesize save")
        .to_bytes_modified()
        .expect("failed to emit save")
}

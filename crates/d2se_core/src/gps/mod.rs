pub mod codes;
pub mod legacy;

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::d2s::items::{Item, ItemFormat, ItemLocation};

const CONFIRMATION: u8 = 0x20;

/// Canonical consumable identity: family, condition, variant and the
/// confirmation byte, independent of how a record stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpsCode([u8; 4]);

impl GpsCode {
    pub fn from_triple(triple: [u8; 3]) -> Self {
        Self([triple[0], triple[1], triple[2], CONFIRMATION])
    }

    pub fn from_raw(raw: [u8; 4]) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> [u8; 4] {
        self.0
    }

    pub fn triple(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn condition(&self) -> u8 {
        self.0[1]
    }

    pub fn variant(&self) -> u8 {
        self.0[2]
    }

    pub fn is_confirmed(&self) -> bool {
        self.0[3] == CONFIRMATION
    }

    /// Parse the three-letter form, e.g. `"gpr"`.
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return None;
        }
        Some(Self::from_triple([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn category(&self) -> Option<GpsCategory> {
        if !self.is_confirmed() {
            return None;
        }
        codes::category(*self)
    }
}

impl fmt::Display for GpsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.triple() {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpsCategory {
    Gem,
    Skull,
    Rune,
    Potion,
}

impl GpsCategory {
    pub fn is_socketable(&self) -> bool {
        matches!(self, Self::Gem | Self::Skull | Self::Rune)
    }
}

/// Belts take potions only and sockets take gems, skulls and runes only.
pub fn placement_allows(location: ItemLocation, category: GpsCategory) -> bool {
    match location {
        ItemLocation::Belt => category == GpsCategory::Potion,
        ItemLocation::Socketed => category.is_socketable(),
        _ => true,
    }
}

/// Catalogued identity of an item, in either encoding.
pub fn recognize(item: &Item) -> Option<GpsCode> {
    let code = match item.format() {
        ItemFormat::Modern => GpsCode::from_raw(item.type_code()?),
        format => {
            let table = legacy::table_for(format)?;
            let (family, variant) = item.legacy_identity()?;
            table.lookup(family, variant)?
        }
    };
    code.category().map(|_| code)
}

/// Rewrite one consumable to `desired`. Returns false without touching the
/// item when it is not a catalogued consumable, or when the placement or the
/// record format cannot take the new code.
pub fn update_item(item: &mut Item, desired: GpsCode) -> bool {
    let Some(category) = desired.category() else {
        return false;
    };
    if recognize(item).is_none() {
        return false;
    }
    let location = item.location();
    if !placement_allows(location, category) {
        debug!("skipping {desired} conversion: {location} placement rejects {category:?}");
        return false;
    }

    match item.format() {
        ItemFormat::Modern => item.set_type_code(desired.raw()).is_ok(),
        format => {
            let Some(table) = legacy::table_for(format) else {
                return false;
            };
            let Some((family, variant)) = table.identity(desired) else {
                debug!("{desired} has no identity in {}", table.name);
                return false;
            };
            if item.is_glued() {
                let current = item.legacy_identity().map(|(f, _)| f);
                if !current.is_some_and(|f| table.is_socketable_family(f)) {
                    return false;
                }
            }
            item.set_legacy_identity(family, variant).is_ok()
        }
    }
}

/// Convert every item recognized as `existing` to `desired`. Returns how
/// many were actually rewritten.
pub fn convert_items(items: &mut [Item], existing: GpsCode, desired: GpsCode) -> usize {
    if desired.category().is_none() {
        return 0;
    }
    items
        .iter_mut()
        .filter(|item| recognize(item) == Some(existing))
        .map(|item| update_item(item, desired))
        .filter(|converted| *converted)
        .count()
}

/// Apply a list of `(from, to)` conversions and sum the counts.
pub fn convert_all(items: &mut [Item], pairs: &[(GpsCode, GpsCode)]) -> usize {
    pairs
        .iter()
        .map(|&(from, to)| convert_items(items, from, to))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{GpsCategory, GpsCode, convert_items, placement_allows, recognize, update_item};
    use crate::bitstream::write_bits_at;
    use crate::d2s::items::{Item, ItemFormat, ItemLocation};

    fn code(s: &str) -> GpsCode {
        GpsCode::parse(s).unwrap()
    }

    fn modern(code: &GpsCode, location: u8) -> Item {
        let mut bytes = vec![0u8; 16];
        bytes[..2].copy_from_slice(b"JM");
        write_bits_at(&mut bytes, 58, u64::from(location), 3).unwrap();
        let offset = if location == 6 { 73 } else { 76 };
        write_bits_at(&mut bytes, offset, u64::from(u32::from_le_bytes(code.raw())), 32).unwrap();
        Item::new(bytes, ItemFormat::Modern)
    }

    fn legacy_full(family: u8, variant: u8, location: u8) -> Item {
        let mut bytes = vec![0u8; 27];
        bytes[..2].copy_from_slice(b"JM");
        bytes[6] = location;
        bytes[12] = family;
        bytes[13] = variant;
        Item::new(bytes, ItemFormat::LegacyFull)
    }

    #[test]
    fn parse_and_display() {
        let c = code("gpr");
        assert_eq!(c.raw(), *b"gpr ");
        assert_eq!(c.to_string(), "gpr");
        assert_eq!(c.family(), b'g');
        assert_eq!(c.condition(), b'p');
        assert_eq!(c.variant(), b'r');
        assert!(GpsCode::parse("gp").is_none());
        assert_eq!(GpsCode::from_raw(*b"gpr\0").category(), None);
    }

    #[test]
    fn placement_rule() {
        assert!(placement_allows(ItemLocation::Belt, GpsCategory::Potion));
        assert!(!placement_allows(ItemLocation::Belt, GpsCategory::Gem));
        assert!(!placement_allows(ItemLocation::Socketed, GpsCategory::Potion));
        assert!(placement_allows(ItemLocation::Socketed, GpsCategory::Rune));
        assert!(placement_allows(ItemLocation::Stored, GpsCategory::Skull));
    }

    #[test]
    fn socketed_gem_never_becomes_a_potion() {
        let mut items = vec![modern(&code("gcr"), 6)];
        let before = items.clone();
        assert_eq!(convert_items(&mut items, code("gcr"), code("hp5")), 0);
        assert_eq!(items, before);
    }

    #[test]
    fn two_loose_gems_convert() {
        let mut items = vec![
            modern(&code("gcb"), 0),
            modern(&code("gcb"), 4),
            modern(&code("gcg"), 0),
        ];
        assert_eq!(convert_items(&mut items, code("gcb"), code("gpb")), 2);
        assert_eq!(recognize(&items[0]), Some(code("gpb")));
        assert_eq!(recognize(&items[1]), Some(code("gpb")));
        assert_eq!(recognize(&items[2]), Some(code("gcg")));
    }

    #[test]
    fn belted_potion_never_becomes_a_gem() {
        let mut item = modern(&code("hp1"), 2);
        assert!(!update_item(&mut item, code("gpw")));
        assert!(update_item(&mut item, code("hp5")));
        assert_eq!(recognize(&item), Some(code("hp5")));
    }

    #[test]
    fn non_consumables_are_left_alone() {
        let mut sword = modern(&GpsCode::from_raw(*b"swd "), 1);
        assert!(!update_item(&mut sword, code("gpw")));
        assert_eq!(sword.type_code(), Some(*b"swd "));
    }

    #[test]
    fn uncatalogued_target_converts_nothing() {
        let mut items = vec![modern(&code("gcb"), 0)];
        assert_eq!(convert_items(&mut items, code("gcb"), code("zzz")), 0);
    }

    #[test]
    fn legacy_records_convert_through_their_table() {
        let mut items = vec![legacy_full(0x11, 0x02, 0)];
        assert_eq!(recognize(&items[0]), Some(code("gcb")));
        assert_eq!(convert_items(&mut items, code("gcb"), code("gpb")), 1);
        assert_eq!(items[0].legacy_identity(), Some((0x15, 0x1A)));
    }

    #[test]
    fn legacy_runes_are_not_representable() {
        let mut item = legacy_full(0x11, 0x02, 0);
        assert!(!update_item(&mut item, code("r01")));
        assert_eq!(item.legacy_identity(), Some((0x11, 0x02)));
    }

    #[test]
    fn glued_legacy_gem_in_any_socketable_family_is_rewritten() {
        // flawed (0x12) and flawless (0x14) families, not just the first listed one
        let mut flawed = legacy_full(0x12, 0x0A, 6);
        assert!(update_item(&mut flawed, code("gpr")));
        assert_eq!(flawed.legacy_identity(), Some((0x15, 0x1C)));

        let mut flawless = legacy_full(0x14, 0x12, 6);
        assert!(update_item(&mut flawless, code("gpv")));

        let mut odd = legacy_full(0x20, 0x01, 6);
        assert!(!update_item(&mut odd, code("gpv")));
    }
}

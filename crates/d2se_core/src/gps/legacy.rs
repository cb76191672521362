//! Byte-pair identities of consumables in pre-1.07 records.
//!
//! The two record formats assign their identity bytes independently, so each
//! format gets its own table keyed first on the family byte and then on the
//! variant byte. The 27-byte layout numbers gem and skull variants
//! consecutively across families; the 15-byte layout shares one family byte
//! between two qualities and tells them apart by the variant's high nibble.

use super::GpsCode;
use crate::d2s::items::ItemFormat;

type VariantTable = &'static [(u8, [u8; 3])];

pub struct LegacyTable {
    pub name: &'static str,
    families: &'static [(u8, VariantTable)],
    socketable_families: &'static [u8],
}

impl LegacyTable {
    /// Nested lookup: family byte first, then variant byte.
    pub fn lookup(&self, family: u8, variant: u8) -> Option<GpsCode> {
        let (_, variants) = self.families.iter().find(|(f, _)| *f == family)?;
        variants
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, code)| GpsCode::from_triple(*code))
    }

    /// Reverse lookup; `None` when the code has no identity in this format.
    pub fn identity(&self, code: GpsCode) -> Option<(u8, u8)> {
        let triple = code.triple();
        self.families.iter().find_map(|(family, variants)| {
            variants
                .iter()
                .find(|(_, c)| *c == triple)
                .map(|(variant, _)| (*family, *variant))
        })
    }

    pub fn is_socketable_family(&self, family: u8) -> bool {
        self.socketable_families.contains(&family)
    }

    pub fn codes(&self) -> impl Iterator<Item = GpsCode> + '_ {
        self.families
            .iter()
            .flat_map(|(_, variants)| variants.iter().map(|(_, c)| GpsCode::from_triple(*c)))
    }
}

pub fn table_for(format: ItemFormat) -> Option<&'static LegacyTable> {
    match format {
        ItemFormat::LegacyFull => Some(&FULL_RECORD_TABLE),
        ItemFormat::LegacyCompact => Some(&COMPACT_RECORD_TABLE),
        _ => None,
    }
}

/// 27-byte records written by 1.00 - 1.03.
pub static FULL_RECORD_TABLE: LegacyTable = LegacyTable {
    name: "1.00 full record",
    families: &[
        (
            0x11,
            &[
                (0x00, *b"gcv"),
                (0x01, *b"gcy"),
                (0x02, *b"gcb"),
                (0x03, *b"gcg"),
                (0x04, *b"gcr"),
                (0x05, *b"gcw"),
            ],
        ),
        (
            0x12,
            &[
                (0x06, *b"gfv"),
                (0x07, *b"gfy"),
                (0x08, *b"gfb"),
                (0x09, *b"gfg"),
                (0x0A, *b"gfr"),
                (0x0B, *b"gfw"),
            ],
        ),
        (
            0x13,
            &[
                (0x0C, *b"gsv"),
                (0x0D, *b"gsy"),
                (0x0E, *b"gsb"),
                (0x0F, *b"gsg"),
                (0x10, *b"gsr"),
                (0x11, *b"gsw"),
            ],
        ),
        (
            0x14,
            &[
                (0x12, *b"gzv"),
                (0x13, *b"gly"),
                (0x14, *b"glb"),
                (0x15, *b"glg"),
                (0x16, *b"glr"),
                (0x17, *b"glw"),
            ],
        ),
        (
            0x15,
            &[
                (0x18, *b"gpv"),
                (0x19, *b"gpy"),
                (0x1A, *b"gpb"),
                (0x1B, *b"gpg"),
                (0x1C, *b"gpr"),
                (0x1D, *b"gpw"),
            ],
        ),
        (
            0x16,
            &[
                (0x1E, *b"skc"),
                (0x1F, *b"skf"),
                (0x20, *b"sku"),
                (0x21, *b"skl"),
                (0x22, *b"skz"),
            ],
        ),
        (
            0x20,
            &[
                (0x01, *b"hp1"),
                (0x02, *b"hp2"),
                (0x03, *b"hp3"),
                (0x04, *b"hp4"),
                (0x05, *b"hp5"),
            ],
        ),
        (
            0x21,
            &[
                (0x01, *b"mp1"),
                (0x02, *b"mp2"),
                (0x03, *b"mp3"),
                (0x04, *b"mp4"),
                (0x05, *b"mp5"),
            ],
        ),
        (
            0x22,
            &[
                (0x01, *b"rvs"),
                (0x02, *b"rvl"),
                (0x03, *b"yps"),
                (0x04, *b"vps"),
                (0x05, *b"wms"),
            ],
        ),
    ],
    socketable_families: &[0x11, 0x12, 0x13, 0x14, 0x15, 0x16],
};

/// 15-byte records written by 1.04 - 1.06.
pub static COMPACT_RECORD_TABLE: LegacyTable = LegacyTable {
    name: "1.04 compact record",
    families: &[
        (
            0x31,
            &[
                (0x40, *b"gcv"),
                (0x41, *b"gcy"),
                (0x42, *b"gcb"),
                (0x43, *b"gcg"),
                (0x44, *b"gcr"),
                (0x45, *b"gcw"),
                (0x48, *b"gfv"),
                (0x49, *b"gfy"),
                (0x4A, *b"gfb"),
                (0x4B, *b"gfg"),
                (0x4C, *b"gfr"),
                (0x4D, *b"gfw"),
            ],
        ),
        (
            0x32,
            &[
                (0x40, *b"gsv"),
                (0x41, *b"gsy"),
                (0x42, *b"gsb"),
                (0x43, *b"gsg"),
                (0x44, *b"gsr"),
                (0x45, *b"gsw"),
                (0x50, *b"gzv"),
                (0x51, *b"gly"),
                (0x52, *b"glb"),
                (0x53, *b"glg"),
                (0x54, *b"glr"),
                (0x55, *b"glw"),
            ],
        ),
        (
            0x33,
            &[
                (0x40, *b"gpv"),
                (0x41, *b"gpy"),
                (0x42, *b"gpb"),
                (0x43, *b"gpg"),
                (0x44, *b"gpr"),
                (0x45, *b"gpw"),
                (0x60, *b"skc"),
                (0x61, *b"skf"),
                (0x62, *b"sku"),
                (0x63, *b"skl"),
                (0x64, *b"skz"),
            ],
        ),
        (
            0x38,
            &[
                (0x10, *b"hp1"),
                (0x11, *b"hp2"),
                (0x12, *b"hp3"),
                (0x13, *b"hp4"),
                (0x14, *b"hp5"),
                (0x20, *b"mp1"),
                (0x21, *b"mp2"),
                (0x22, *b"mp3"),
                (0x23, *b"mp4"),
                (0x24, *b"mp5"),
                (0x30, *b"rvs"),
                (0x31, *b"rvl"),
                (0x40, *b"yps"),
                (0x41, *b"vps"),
                (0x42, *b"wms"),
            ],
        ),
    ],
    socketable_families: &[0x31, 0x32, 0x33],
};

#[cfg(test)]
mod tests {
    use super::{COMPACT_RECORD_TABLE, FULL_RECORD_TABLE, LegacyTable};
    use crate::gps::{GpsCode, codes};

    fn code(s: &str) -> GpsCode {
        GpsCode::parse(s).unwrap()
    }

    fn assert_bijective(table: &LegacyTable) {
        for c in table.codes() {
            let (family, variant) = table.identity(c).unwrap();
            assert_eq!(table.lookup(family, variant), Some(c), "{} {c}", table.name);
        }
    }

    #[test]
    fn tables_are_bijective() {
        assert_bijective(&FULL_RECORD_TABLE);
        assert_bijective(&COMPACT_RECORD_TABLE);
    }

    #[test]
    fn every_non_rune_code_has_an_identity_in_both_formats() {
        for c in codes::all_codes() {
            let rune = c.triple()[0] == b'r' && c.triple()[1].is_ascii_digit();
            assert_eq!(FULL_RECORD_TABLE.identity(c).is_some(), !rune, "{c}");
            assert_eq!(COMPACT_RECORD_TABLE.identity(c).is_some(), !rune, "{c}");
        }
    }

    #[test]
    fn formats_disagree_on_bytes() {
        assert_eq!(FULL_RECORD_TABLE.identity(code("gpr")), Some((0x15, 0x1C)));
        assert_eq!(COMPACT_RECORD_TABLE.identity(code("gpr")), Some((0x33, 0x44)));
        assert_eq!(FULL_RECORD_TABLE.lookup(0x33, 0x44), None);
        assert_eq!(COMPACT_RECORD_TABLE.lookup(0x31, 0x46), None);
    }

    #[test]
    fn socketable_families_match_any_listed_family() {
        assert!(FULL_RECORD_TABLE.is_socketable_family(0x11));
        assert!(FULL_RECORD_TABLE.is_socketable_family(0x14));
        assert!(FULL_RECORD_TABLE.is_socketable_family(0x16));
        assert!(!FULL_RECORD_TABLE.is_socketable_family(0x20));
        assert!(COMPACT_RECORD_TABLE.is_socketable_family(0x32));
        assert!(!COMPACT_RECORD_TABLE.is_socketable_family(0x38));
    }
}

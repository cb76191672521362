use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use super::types::{ATTRIBUTE_MARKER, read_u16_le};
use crate::bitstream::{BitReader, BitWriter, mask};
use crate::checksum::read_u32_le;
use crate::class::CharacterClass;
use crate::version::AttributeCodec;

pub const ATTRIBUTE_COUNT: usize = 16;
const STAT_ID_BITS: u32 = 9;
const STAT_TERMINATOR: u64 = 0x1FF;
const FIXED_POINT_SHIFT: u32 = 8;
/// Class gains are quarter points; 64 / 256 of a unit is one quarter.
const QUARTER_POINT_RAW: i64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Strength,
    Energy,
    Dexterity,
    Vitality,
    StatPointsLeft,
    SkillChoicesLeft,
    Life,
    MaxLife,
    Mana,
    MaxMana,
    Stamina,
    MaxStamina,
    Level,
    Experience,
    Gold,
    StashGold,
}

impl Attribute {
    pub const ALL: [Attribute; ATTRIBUTE_COUNT] = [
        Self::Strength,
        Self::Energy,
        Self::Dexterity,
        Self::Vitality,
        Self::StatPointsLeft,
        Self::SkillChoicesLeft,
        Self::Life,
        Self::MaxLife,
        Self::Mana,
        Self::MaxMana,
        Self::Stamina,
        Self::MaxStamina,
        Self::Level,
        Self::Experience,
        Self::Gold,
        Self::StashGold,
    ];

    const WIDTHS: [u32; ATTRIBUTE_COUNT] = [10, 10, 10, 10, 10, 8, 21, 21, 21, 21, 21, 21, 7, 32, 25, 25];

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn id(&self) -> usize {
        *self as usize
    }

    /// Width of the value in the bit-packed stream.
    pub fn bit_width(&self) -> u32 {
        Self::WIDTHS[self.id()]
    }

    /// Life, mana and stamina carry 8 fractional bits.
    pub fn is_fixed_point(&self) -> bool {
        matches!(
            self,
            Self::Life
                | Self::MaxLife
                | Self::Mana
                | Self::MaxMana
                | Self::Stamina
                | Self::MaxStamina
        )
    }

    /// Written whether or not the value is zero.
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            Self::Strength
                | Self::Energy
                | Self::Dexterity
                | Self::Vitality
                | Self::MaxLife
                | Self::MaxMana
                | Self::MaxStamina
                | Self::Level
        )
    }

    pub fn max_raw(&self) -> u32 {
        mask(self.bit_width()) as u32
    }

    /// Largest value in whole units.
    pub fn max_value(&self) -> u32 {
        if self.is_fixed_point() {
            self.max_raw() >> FIXED_POINT_SHIFT
        } else {
            self.max_raw()
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Self::Strength => "strength",
            Self::Energy => "energy",
            Self::Dexterity => "dexterity",
            Self::Vitality => "vitality",
            Self::StatPointsLeft => "stat_points_left",
            Self::SkillChoicesLeft => "skill_choices_left",
            Self::Life => "life",
            Self::MaxLife => "max_life",
            Self::Mana => "mana",
            Self::MaxMana => "max_mana",
            Self::Stamina => "stamina",
            Self::MaxStamina => "max_stamina",
            Self::Level => "level",
            Self::Experience => "experience",
            Self::Gold => "gold",
            Self::StashGold => "stash_gold",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.name().eq_ignore_ascii_case(name))
    }

    fn pool_max(&self) -> Option<Self> {
        match *self {
            Self::Life => Some(Self::MaxLife),
            Self::Mana => Some(Self::MaxMana),
            Self::Stamina => Some(Self::MaxStamina),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeSet {
    values: [u32; ATTRIBUTE_COUNT],
    /// Bits after the bit-packed terminator, kept for re-encoding.
    padding: u8,
}

impl AttributeSet {
    pub fn raw(&self, attr: Attribute) -> u32 {
        self.values[attr.id()]
    }

    pub fn set_raw(&mut self, attr: Attribute, raw: u32) {
        self.values[attr.id()] = raw;
    }

    /// Value in whole units.
    pub fn get(&self, attr: Attribute) -> u32 {
        if attr.is_fixed_point() {
            self.raw(attr) >> FIXED_POINT_SHIFT
        } else {
            self.raw(attr)
        }
    }

    /// Store a whole-unit value clamped to the attribute's range. The
    /// fractional part of a pool value is cleared. Returns the stored value.
    pub fn set(&mut self, attr: Attribute, value: u32) -> u32 {
        let value = value.min(attr.max_value());
        let raw = if attr.is_fixed_point() {
            value << FIXED_POINT_SHIFT
        } else {
            value
        };
        self.set_raw(attr, raw);
        value
    }

    /// Like [`AttributeSet::set`] but keeps the fractional part when the whole
    /// part does not change.
    pub fn set_preserving_fraction(&mut self, attr: Attribute, value: u32) -> u32 {
        if attr.is_fixed_point() && self.get(attr) == value {
            return value;
        }
        self.set(attr, value)
    }

    pub fn padding(&self) -> u8 {
        self.padding
    }

    /// Presence mask of the fixed-field codec, recomputed from the values.
    pub fn presence_mask(&self) -> u16 {
        Attribute::ALL
            .into_iter()
            .filter(|attr| attr.is_mandatory() || self.raw(*attr) != 0)
            .fold(0u16, |mask, attr| mask | (1 << attr.id()))
    }

    /// Clamp current life, mana and stamina to their maxima.
    pub fn reconcile(&mut self) {
        for attr in [Attribute::Life, Attribute::Mana, Attribute::Stamina] {
            if let Some(max) = attr.pool_max() {
                let cap = self.raw(max);
                if self.raw(attr) > cap {
                    self.set_raw(attr, cap);
                }
            }
        }
    }

    /// Move max and current pools by the class gains for a change of level,
    /// vitality or energy from `old` to `new`, then reconcile.
    pub fn apply_growth(&mut self, class: CharacterClass, attr: Attribute, old: u32, new: u32) {
        let Some(gains) = class.gains() else {
            return;
        };
        let delta = i64::from(new) - i64::from(old);
        let steps: Vec<(Attribute, u32)> = match attr {
            Attribute::Level => vec![
                (Attribute::MaxLife, gains.life_per_level),
                (Attribute::MaxStamina, gains.stamina_per_level),
                (Attribute::MaxMana, gains.mana_per_level),
            ],
            Attribute::Vitality => vec![
                (Attribute::MaxLife, gains.life_per_vitality),
                (Attribute::MaxStamina, gains.stamina_per_vitality),
            ],
            Attribute::Energy => vec![(Attribute::MaxMana, gains.mana_per_energy)],
            _ => Vec::new(),
        };

        for (max, quarters) in steps {
            let change = delta * i64::from(quarters) * QUARTER_POINT_RAW;
            let current = match max {
                Attribute::MaxLife => Attribute::Life,
                Attribute::MaxMana => Attribute::Mana,
                _ => Attribute::Stamina,
            };
            for target in [max, current] {
                let moved = (i64::from(self.raw(target)) + change).clamp(0, i64::from(target.max_raw()));
                self.set_raw(target, moved as u32);
            }
        }
        self.reconcile();
    }
}

/// Decoded block plus the number of bytes it occupied, marker included.
pub fn decode(codec: AttributeCodec, bytes: &[u8]) -> io::Result<(AttributeSet, usize)> {
    match codec {
        AttributeCodec::FixedField => decode_fixed_field(bytes),
        AttributeCodec::BitPacked => decode_bit_packed(bytes),
    }
}

pub fn encode(codec: AttributeCodec, set: &AttributeSet) -> Vec<u8> {
    match codec {
        AttributeCodec::FixedField => encode_fixed_field(set),
        AttributeCodec::BitPacked => encode_bit_packed(set),
    }
}

fn check_marker(bytes: &[u8]) -> io::Result<()> {
    if bytes.starts_with(ATTRIBUTE_MARKER) {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "attribute block does not start with its marker",
        ))
    }
}

pub fn decode_fixed_field(bytes: &[u8]) -> io::Result<(AttributeSet, usize)> {
    check_marker(bytes)?;
    let mask = read_u16_le(bytes, ATTRIBUTE_MARKER.len()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "attribute block truncated before presence mask",
        )
    })?;

    let mut set = AttributeSet::default();
    let mut at = ATTRIBUTE_MARKER.len() + 2;
    for attr in Attribute::ALL {
        if !attr.is_mandatory() && mask & (1 << attr.id()) == 0 {
            continue;
        }
        let value = read_u32_le(bytes, at).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("attribute block truncated at {attr} (offset {at})"),
            )
        })?;
        set.set_raw(attr, value);
        at += 4;
    }
    Ok((set, at))
}

pub fn encode_fixed_field(set: &AttributeSet) -> Vec<u8> {
    let mask = set.presence_mask();
    let mut out = Vec::with_capacity(4 + ATTRIBUTE_COUNT * 4);
    out.extend_from_slice(ATTRIBUTE_MARKER);
    out.extend_from_slice(&mask.to_le_bytes());
    for attr in Attribute::ALL {
        if mask & (1 << attr.id()) != 0 {
            out.extend_from_slice(&set.raw(attr).to_le_bytes());
        }
    }
    out
}

pub fn decode_bit_packed(bytes: &[u8]) -> io::Result<(AttributeSet, usize)> {
    check_marker(bytes)?;
    let body = &bytes[ATTRIBUTE_MARKER.len()..];
    let mut reader = BitReader::new(body);
    let mut set = AttributeSet::default();

    loop {
        let id = reader.read_bits(STAT_ID_BITS)?;
        if id == STAT_TERMINATOR {
            break;
        }
        // Ids past the table end the stream the same way the terminator does.
        let Some(attr) = Attribute::from_id(id as usize) else {
            break;
        };
        let value = reader.read_u32(attr.bit_width())?;
        set.set_raw(attr, value);
    }

    let (padding, _) = reader.read_padding()?;
    set.padding = padding;
    Ok((set, ATTRIBUTE_MARKER.len() + reader.byte_len()))
}

pub fn encode_bit_packed(set: &AttributeSet) -> Vec<u8> {
    let mut writer = BitWriter::from_bytes(ATTRIBUTE_MARKER.to_vec());
    for attr in Attribute::ALL {
        let raw = set.raw(attr);
        if !attr.is_mandatory() && raw == 0 {
            continue;
        }
        writer.write_bits(attr.id() as u64, STAT_ID_BITS);
        writer.write_bits(u64::from(raw) & mask(attr.bit_width()), attr.bit_width());
    }
    writer.write_bits(STAT_TERMINATOR, STAT_ID_BITS);
    writer.pad_to_byte(set.padding);
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::{
        Attribute, AttributeSet, decode_bit_packed, decode_fixed_field, encode_bit_packed,
        encode_fixed_field,
    };
    use crate::class::CharacterClass;
    use proptest::prelude::*;

    fn sample() -> AttributeSet {
        let mut set = AttributeSet::default();
        set.set(Attribute::Strength, 30);
        set.set(Attribute::Energy, 10);
        set.set(Attribute::Dexterity, 20);
        set.set(Attribute::Vitality, 25);
        set.set(Attribute::Life, 55);
        set.set(Attribute::MaxLife, 55);
        set.set(Attribute::MaxMana, 10);
        set.set(Attribute::MaxStamina, 92);
        set.set(Attribute::Level, 10);
        set.set(Attribute::Experience, 12345);
        set
    }

    #[test]
    fn fixed_field_mask_tracks_non_zero_values() {
        let set = sample();
        let mask = set.presence_mask();
        assert_ne!(mask & (1 << 6), 0, "current life present");
        assert_eq!(mask & (1 << 8), 0, "current mana absent");
        assert_ne!(mask & (1 << 9), 0, "max mana always present");

        let blob = encode_fixed_field(&set);
        assert_eq!(&blob[..2], b"gf");
        assert_eq!(u16::from_le_bytes([blob[2], blob[3]]), mask);
        assert_eq!(blob.len(), 4 + 4 * mask.count_ones() as usize);

        let (decoded, len) = decode_fixed_field(&blob).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(len, blob.len());
    }

    #[test]
    fn bit_packed_round_trips_and_reports_length() {
        let set = sample();
        let mut blob = encode_bit_packed(&set);
        let encoded_len = blob.len();
        blob.extend_from_slice(b"if");
        let (decoded, len) = decode_bit_packed(&blob).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(len, encoded_len);
        assert_eq!(decoded.get(Attribute::Level), 10);
        assert_eq!(decoded.get(Attribute::Experience), 12345);
    }

    #[test]
    fn unknown_stat_id_ends_the_stream() {
        let mut writer = crate::bitstream::BitWriter::from_bytes(b"gf".to_vec());
        writer.write_bits(0, 9);
        writer.write_bits(15, 10);
        writer.write_bits(0x100, 9);
        writer.pad_to_byte(0);
        let blob = writer.into_bytes();
        let (set, len) = decode_bit_packed(&blob).unwrap();
        assert_eq!(set.get(Attribute::Strength), 15);
        assert_eq!(len, blob.len());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let blob = encode_bit_packed(&sample());
        assert!(decode_bit_packed(&blob[..blob.len() - 3]).is_err());
        assert!(decode_fixed_field(b"gf\x01").is_err());
    }

    #[test]
    fn oversized_raw_values_truncate_to_width() {
        let mut set = AttributeSet::default();
        set.set_raw(Attribute::Level, 0x1FF);
        set.set_raw(Attribute::Strength, 7);
        let (decoded, _) = decode_bit_packed(&encode_bit_packed(&set)).unwrap();
        assert_eq!(decoded.raw(Attribute::Level), 0x7F);
        assert_eq!(decoded.raw(Attribute::Strength), 7);
    }

    #[test]
    fn setter_clamps_to_width() {
        let mut set = AttributeSet::default();
        assert_eq!(set.set(Attribute::Level, 500), 127);
        assert_eq!(set.set(Attribute::MaxLife, 10_000), 8191);
        assert_eq!(set.raw(Attribute::MaxLife), 8191 << 8);
    }

    #[test]
    fn fraction_survives_unchanged_whole_part() {
        let mut set = AttributeSet::default();
        set.set_raw(Attribute::Life, (40 << 8) | 0x80);
        set.set_preserving_fraction(Attribute::Life, 40);
        assert_eq!(set.raw(Attribute::Life), (40 << 8) | 0x80);
        set.set_preserving_fraction(Attribute::Life, 41);
        assert_eq!(set.raw(Attribute::Life), 41 << 8);
    }

    #[test]
    fn level_growth_moves_pools_by_class_gains() {
        let mut set = sample();
        set.set(Attribute::Mana, 10);
        set.set(Attribute::Stamina, 92);
        // Barbarian: 2 life, 1 stamina, 1 mana per level
        set.apply_growth(CharacterClass::Barbarian, Attribute::Level, 10, 12);
        assert_eq!(set.get(Attribute::MaxLife), 59);
        assert_eq!(set.get(Attribute::Life), 59);
        assert_eq!(set.get(Attribute::MaxStamina), 94);
        assert_eq!(set.get(Attribute::MaxMana), 12);

        set.apply_growth(CharacterClass::Barbarian, Attribute::Vitality, 25, 20);
        assert_eq!(set.get(Attribute::MaxLife), 39);
        assert!(set.raw(Attribute::Life) <= set.raw(Attribute::MaxLife));
    }

    #[test]
    fn reconcile_clamps_current_to_max() {
        let mut set = AttributeSet::default();
        set.set(Attribute::MaxMana, 20);
        set.set(Attribute::Mana, 35);
        set.reconcile();
        assert_eq!(set.get(Attribute::Mana), 20);
    }

    proptest! {
        #[test]
        fn prop_every_stat_round_trips_within_width(id in 0usize..16, seed in any::<u32>()) {
            let attr = Attribute::from_id(id).unwrap();
            let value = seed & attr.max_raw();
            let mut set = AttributeSet::default();
            set.set_raw(attr, value);
            let (decoded, _) = decode_bit_packed(&encode_bit_packed(&set)).unwrap();
            prop_assert_eq!(decoded.raw(attr), value);
            let (decoded, _) = decode_fixed_field(&encode_fixed_field(&set)).unwrap();
            prop_assert_eq!(decoded.raw(attr), value);
        }

        #[test]
        fn prop_overflow_never_touches_neighbours(id in 0usize..16, seed in any::<u32>()) {
            let attr = Attribute::from_id(id).unwrap();
            let mut set = AttributeSet::default();
            for other in Attribute::ALL {
                set.set_raw(other, 1);
            }
            set.set_raw(attr, seed | 1);
            let (decoded, _) = decode_bit_packed(&encode_bit_packed(&set)).unwrap();
            for other in Attribute::ALL {
                let expected = if other == attr { (seed | 1) & attr.max_raw() } else { 1 };
                prop_assert_eq!(decoded.raw(other), expected);
            }
        }
    }
}

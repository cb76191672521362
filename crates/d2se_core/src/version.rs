use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = [0x55, 0xAA, 0x55, 0xAA];
pub const MAGIC_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 4;
pub const NAME_LEN: usize = 16;

/// On-disk layout generation of a character save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CharacterVersion {
    /// 1.00 - 1.03
    V100,
    /// 1.04 - 1.06
    V104,
    /// 1.07 and expansion 1.08
    V107,
    /// classic 1.08
    V108,
    V109,
    /// 1.10 and later
    V110,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeCodec {
    FixedField,
    BitPacked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemListLayout {
    /// marker scan to end of file
    Legacy,
    /// marker + u16 count header
    Counted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsEncoding {
    PackedByte,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyEncoding {
    /// one byte, difficulty and act nibbles
    Legacy,
    /// one byte per difficulty
    Modern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionLayout {
    pub name_offset: usize,
    pub status_offset: usize,
    pub title_offset: usize,
    pub class_offset: usize,
    pub level_offset: usize,
    pub difficulty_offset: usize,
    pub difficulty_encoding: DifficultyEncoding,
    pub file_size_offset: Option<usize>,
    pub checksum_offset: Option<usize>,
    pub header_len: usize,
    pub quest_header_len: usize,
    pub quest_difficulty_len: usize,
    pub has_npc_block: bool,
    pub attribute_codec: AttributeCodec,
    pub item_layout: ItemListLayout,
    pub gps_encoding: GpsEncoding,
}

impl VersionLayout {
    pub fn difficulty_len(&self) -> usize {
        match self.difficulty_encoding {
            DifficultyEncoding::Legacy => 1,
            DifficultyEncoding::Modern => 3,
        }
    }

    pub fn has_expansion_quests(&self) -> bool {
        self.quest_difficulty_len >= EXPANSION_QUEST_DIFFICULTY_LEN
    }
}

const LEGACY_QUEST_DIFFICULTY_LEN: usize = 64;
const EXPANSION_QUEST_DIFFICULTY_LEN: usize = 96;

const LEGACY_LAYOUT: VersionLayout = VersionLayout {
    name_offset: 8,
    status_offset: 24,
    title_offset: 25,
    class_offset: 34,
    level_offset: 36,
    difficulty_offset: 38,
    difficulty_encoding: DifficultyEncoding::Legacy,
    file_size_offset: None,
    checksum_offset: None,
    header_len: 176,
    quest_header_len: 6,
    quest_difficulty_len: LEGACY_QUEST_DIFFICULTY_LEN,
    has_npc_block: false,
    attribute_codec: AttributeCodec::FixedField,
    item_layout: ItemListLayout::Legacy,
    gps_encoding: GpsEncoding::PackedByte,
};

const V107_LAYOUT: VersionLayout = VersionLayout {
    name_offset: 20,
    status_offset: 36,
    title_offset: 37,
    class_offset: 40,
    level_offset: 43,
    difficulty_offset: 168,
    difficulty_encoding: DifficultyEncoding::Modern,
    file_size_offset: None,
    checksum_offset: None,
    header_len: 335,
    quest_header_len: 10,
    quest_difficulty_len: EXPANSION_QUEST_DIFFICULTY_LEN,
    has_npc_block: true,
    attribute_codec: AttributeCodec::FixedField,
    item_layout: ItemListLayout::Counted,
    gps_encoding: GpsEncoding::Code,
};

const V109_LAYOUT: VersionLayout = VersionLayout {
    file_size_offset: Some(8),
    checksum_offset: Some(12),
    ..V107_LAYOUT
};

const V110_LAYOUT: VersionLayout = VersionLayout {
    attribute_codec: AttributeCodec::BitPacked,
    ..V109_LAYOUT
};

impl CharacterVersion {
    pub const ALL: [CharacterVersion; 6] = [
        Self::V100,
        Self::V104,
        Self::V107,
        Self::V108,
        Self::V109,
        Self::V110,
    ];

    /// Raw value shared by every 1.00 - 1.06 save.
    pub const RAW_LEGACY: u32 = 71;
    pub const RAW_V107: u32 = 87;
    pub const RAW_V108: u32 = 89;
    pub const RAW_V109: u32 = 92;
    pub const RAW_V110: u32 = 96;

    /// Raw 71 maps to `V104`; callers refine it to `V100` once the item
    /// records have been sliced.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            Self::RAW_LEGACY => Some(Self::V104),
            Self::RAW_V107 => Some(Self::V107),
            Self::RAW_V108 => Some(Self::V108),
            Self::RAW_V109 => Some(Self::V109),
            Self::RAW_V110 => Some(Self::V110),
            _ => None,
        }
    }

    pub fn detect(raw: u32) -> io::Result<Self> {
        Self::from_raw(raw).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unrecognized character version {raw} (0x{raw:02x})"),
            )
        })
    }

    pub fn raw(&self) -> u32 {
        match *self {
            Self::V100 | Self::V104 => Self::RAW_LEGACY,
            Self::V107 => Self::RAW_V107,
            Self::V108 => Self::RAW_V108,
            Self::V109 => Self::RAW_V109,
            Self::V110 => Self::RAW_V110,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::V100 => "1.00-1.03",
            Self::V104 => "1.04-1.06",
            Self::V107 => "1.07",
            Self::V108 => "1.08",
            Self::V109 => "1.09",
            Self::V110 => "1.10+",
        }
    }

    pub fn layout(&self) -> &'static VersionLayout {
        match *self {
            Self::V100 | Self::V104 => &LEGACY_LAYOUT,
            Self::V107 | Self::V108 => &V107_LAYOUT,
            Self::V109 => &V109_LAYOUT,
            Self::V110 => &V110_LAYOUT,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::V100 | Self::V104)
    }

    pub fn has_checksum(&self) -> bool {
        self.layout().checksum_offset.is_some()
    }
}

impl fmt::Display for CharacterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn check_magic(bytes: &[u8]) -> io::Result<()> {
    match bytes.get(MAGIC_OFFSET..MAGIC_OFFSET + MAGIC.len()) {
        Some(magic) if magic == MAGIC => Ok(()),
        Some(magic) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad character save magic {magic:02x?}"),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file too short for character save magic",
        )),
    }
}

pub fn read_raw_version(bytes: &[u8]) -> io::Result<u32> {
    crate::checksum::read_u32_le(bytes, VERSION_OFFSET).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file too short for character version",
        )
    })
}

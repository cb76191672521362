use std::fmt;
use std::io;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::types::{ITEM_MARKER, marker_hits, read_u16_le};
use crate::bitstream::{read_bits_at, write_bits_at};
use crate::version::ItemListLayout;

const ITEM_HEADER_LEN: usize = ITEM_MARKER.len() + 2;

// Bit positions of 1.07+ records, counted from the first marker byte.
const BIT_IDENTIFIED: usize = 20;
const BIT_SOCKETED: usize = 27;
const BIT_EAR: usize = 32;
const BIT_SIMPLE: usize = 37;
const BIT_LOCATION: usize = 58;
const BIT_EQUIPPED_SLOT: usize = 61;
const BIT_COLUMN: usize = 65;
const BIT_ROW: usize = 69;
const BIT_PANEL: usize = 73;
const BIT_CODE: usize = 76;
const BIT_CODE_GLUED: usize = 73;
const CODE_BITS: u32 = 32;
const FILLED_SOCKET_BITS: u32 = 3;

// Legacy records.
pub const LEGACY_FULL_LEN: usize = 27;
pub const LEGACY_COMPACT_LEN: usize = 15;
const LEGACY_FLAGS_OFFSET: usize = 2;
const LEGACY_PLACEMENT_OFFSET: usize = 6;
const LEGACY_POSITION_OFFSET: usize = 7;
const LEGACY_SOCKETS_OFFSET: usize = 8;
const LEGACY_FLAG_IDENTIFIED: u32 = 1 << 4;
const LEGACY_FLAG_SOCKETED: u32 = 1 << 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemFormat {
    /// 1.07+ bit-packed record
    Modern,
    /// 27-byte 1.00 record
    LegacyFull,
    /// 15-byte 1.04 record
    LegacyCompact,
    /// legacy record of any other size, kept opaque
    LegacyOther,
}

impl ItemFormat {
    pub fn legacy_for_len(len: usize) -> Self {
        match len {
            LEGACY_FULL_LEN => Self::LegacyFull,
            LEGACY_COMPACT_LEN => Self::LegacyCompact,
            _ => Self::LegacyOther,
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, Self::Modern)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemLocation {
    Stored,
    Equipped,
    Belt,
    Cursor,
    Socketed,
    Unknown(u8),
}

impl ItemLocation {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Stored,
            1 => Self::Equipped,
            2 => Self::Belt,
            4 => Self::Cursor,
            6 => Self::Socketed,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match *self {
            Self::Stored => 0,
            Self::Equipped => 1,
            Self::Belt => 2,
            Self::Cursor => 4,
            Self::Socketed => 6,
            Self::Unknown(other) => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Stored => "stored",
            Self::Equipped => "equipped",
            Self::Belt => "belt",
            Self::Cursor => "cursor",
            Self::Socketed => "socketed",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ItemLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unknown(v) => write!(f, "unknown ({v})"),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// One marker-delimited item record. The bytes are kept verbatim; flags are
/// read from them on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    bytes: Vec<u8>,
    format: ItemFormat,
    /// index of the item this one is socketed into
    parent: Option<usize>,
}

impl Item {
    pub fn new(bytes: Vec<u8>, format: ItemFormat) -> Self {
        Self {
            bytes,
            format,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<usize>) -> Self {
        self.parent = parent;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> ItemFormat {
        self.format
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn is_identified(&self) -> bool {
        match self.format {
            ItemFormat::Modern => self.bit(BIT_IDENTIFIED),
            _ => self.legacy_flags() & LEGACY_FLAG_IDENTIFIED != 0,
        }
    }

    pub fn is_socketed(&self) -> bool {
        match self.format {
            ItemFormat::Modern => self.bit(BIT_SOCKETED),
            _ => self.legacy_flags() & LEGACY_FLAG_SOCKETED != 0,
        }
    }

    pub fn is_ear(&self) -> bool {
        self.format == ItemFormat::Modern && self.bit(BIT_EAR)
    }

    pub fn is_simple(&self) -> bool {
        self.format == ItemFormat::Modern && self.bit(BIT_SIMPLE)
    }

    pub fn location(&self) -> ItemLocation {
        let raw = match self.format {
            ItemFormat::Modern => self.bits(BIT_LOCATION, 3).unwrap_or(0) as u8,
            _ => self.bytes.get(LEGACY_PLACEMENT_OFFSET).map_or(0, |b| b & 0x0F),
        };
        ItemLocation::from_raw(raw)
    }

    /// Socketed into another item; such records omit the panel field.
    pub fn is_glued(&self) -> bool {
        self.location() == ItemLocation::Socketed
    }

    pub fn panel(&self) -> Option<u8> {
        match self.format {
            ItemFormat::Modern if self.is_glued() => None,
            ItemFormat::Modern => self.bits(BIT_PANEL, 3).map(|v| v as u8),
            _ => self.bytes.get(LEGACY_PLACEMENT_OFFSET).map(|b| b >> 4),
        }
    }

    pub fn equipped_slot(&self) -> Option<u8> {
        match self.format {
            ItemFormat::Modern => self.bits(BIT_EQUIPPED_SLOT, 4).map(|v| v as u8),
            _ => None,
        }
    }

    /// `(column, row)` inside the panel.
    pub fn position(&self) -> Option<(u8, u8)> {
        match self.format {
            ItemFormat::Modern => {
                let column = self.bits(BIT_COLUMN, 4)? as u8;
                let row = self.bits(BIT_ROW, 4)? as u8;
                Some((column, row))
            }
            _ => self
                .bytes
                .get(LEGACY_POSITION_OFFSET)
                .map(|b| (b & 0x0F, b >> 4)),
        }
    }

    /// Bit offset of the 4-byte type code in a 1.07+ record.
    pub fn code_bit_offset(&self) -> Option<usize> {
        if self.format != ItemFormat::Modern || self.is_ear() {
            return None;
        }
        Some(if self.is_glued() { BIT_CODE_GLUED } else { BIT_CODE })
    }

    /// Raw type code of a 1.07+ record, e.g. `b"gpr "`.
    pub fn type_code(&self) -> Option<[u8; 4]> {
        let offset = self.code_bit_offset()?;
        let raw = read_bits_at(&self.bytes, offset, CODE_BITS).ok()? as u32;
        Some(raw.to_le_bytes())
    }

    pub fn set_type_code(&mut self, code: [u8; 4]) -> io::Result<()> {
        let offset = self.code_bit_offset().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "item record carries no type code",
            )
        })?;
        write_bits_at(
            &mut self.bytes,
            offset,
            u64::from(u32::from_le_bytes(code)),
            CODE_BITS,
        )
    }

    /// Number of items socketed into this one.
    pub fn filled_sockets(&self) -> u8 {
        match self.format {
            ItemFormat::Modern => {
                if !self.is_socketed() || self.is_simple() || self.is_glued() {
                    return 0;
                }
                self.code_bit_offset()
                    .and_then(|offset| self.bits(offset + CODE_BITS as usize, FILLED_SOCKET_BITS))
                    .map_or(0, |v| v as u8)
            }
            ItemFormat::LegacyFull if self.is_socketed() => self
                .bytes
                .get(LEGACY_SOCKETS_OFFSET)
                .map_or(0, |b| b & 0x07),
            _ => 0,
        }
    }

    /// Byte pair carrying the identity of a legacy consumable.
    pub fn legacy_identity_offset(&self) -> Option<usize> {
        match self.format {
            ItemFormat::LegacyFull => Some(12),
            ItemFormat::LegacyCompact => Some(9),
            _ => None,
        }
    }

    pub fn legacy_identity(&self) -> Option<(u8, u8)> {
        let at = self.legacy_identity_offset()?;
        Some((*self.bytes.get(at)?, *self.bytes.get(at + 1)?))
    }

    pub fn set_legacy_identity(&mut self, family: u8, variant: u8) -> io::Result<()> {
        let at = self.legacy_identity_offset().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "item record carries no legacy identity bytes",
            )
        })?;
        let len = self.bytes.len();
        let slot = self.bytes.get_mut(at..at + 2).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("legacy item too short for identity patch: len={len}"),
            )
        })?;
        slot.copy_from_slice(&[family, variant]);
        Ok(())
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(hex: &str, format: ItemFormat) -> io::Result<Self> {
        if hex.len() % 2 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("item hex has odd length {}", hex.len()),
            ));
        }
        let bytes = hex
            .as_bytes()
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| match (hex_digit(pair[0]), hex_digit(pair[1])) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid item hex at byte {}", i * 2),
                )),
            })
            .collect::<io::Result<Vec<u8>>>()?;
        Ok(Self::new(bytes, format))
    }

    fn bit(&self, pos: usize) -> bool {
        self.bits(pos, 1).is_some_and(|v| v != 0)
    }

    fn bits(&self, pos: usize, n: u32) -> Option<u64> {
        read_bits_at(&self.bytes, pos, n).ok()
    }

    fn legacy_flags(&self) -> u32 {
        crate::checksum::read_u32_le(&self.bytes, LEGACY_FLAGS_OFFSET).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemList {
    pub layout: ItemListLayout,
    /// bytes between the skill block and the first record, kept verbatim
    pub prefix: Vec<u8>,
    /// whether the `JM` + count header was present (counted layout only)
    pub has_header: bool,
    pub items: Vec<Item>,
}

impl ItemList {
    pub fn empty(layout: ItemListLayout) -> Self {
        Self {
            layout,
            prefix: Vec::new(),
            has_header: layout == ItemListLayout::Counted,
            items: Vec::new(),
        }
    }

    /// Items that are not socketed into another item.
    pub fn top_level_count(&self) -> usize {
        self.items.iter().filter(|item| item.parent.is_none()).count()
    }

    pub fn encoded_len(&self) -> usize {
        let header = if self.layout == ItemListLayout::Counted && self.has_header {
            ITEM_HEADER_LEN
        } else {
            0
        };
        self.prefix.len() + header + self.items.iter().map(Item::len).sum::<usize>()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.prefix);
        if self.layout == ItemListLayout::Counted && self.has_header {
            out.extend_from_slice(ITEM_MARKER);
            out.extend_from_slice(&(self.top_level_count() as u16).to_le_bytes());
        }
        for item in &self.items {
            out.extend_from_slice(&item.bytes);
        }
        out
    }
}

/// Slice `bytes[start..]` at every marker hit. Each record runs to the next
/// hit, the last one to the end of the buffer.
pub fn slice_by_markers(bytes: &[u8], start: usize) -> Vec<Range<usize>> {
    let hits = marker_hits(bytes, ITEM_MARKER, start);
    hits.iter()
        .enumerate()
        .map(|(idx, &hit)| hit..hits.get(idx + 1).copied().unwrap_or(bytes.len()))
        .collect()
}

/// Legacy list: every record from `start` to the end of the file.
pub fn parse_legacy(bytes: &[u8], start: usize) -> ItemList {
    let ranges = slice_by_markers(bytes, start);
    let first = ranges.first().map_or(bytes.len(), |r| r.start);
    ItemList {
        layout: ItemListLayout::Legacy,
        prefix: bytes[start.min(bytes.len())..first].to_vec(),
        has_header: false,
        items: ranges
            .into_iter()
            .map(|r| Item::new(bytes[r.clone()].to_vec(), ItemFormat::legacy_for_len(r.len())))
            .collect(),
    }
}

/// Counted list starting at `start`. Returns the list and the offset where
/// the records end; whatever follows belongs to the caller.
pub fn parse_counted(bytes: &[u8], start: usize) -> io::Result<(ItemList, usize)> {
    let hits = marker_hits(bytes, ITEM_MARKER, start);
    let Some(&header_at) = hits.first() else {
        return Ok((
            ItemList {
                layout: ItemListLayout::Counted,
                prefix: Vec::new(),
                has_header: false,
                items: Vec::new(),
            },
            start,
        ));
    };

    let count = read_u16_le(bytes, header_at + ITEM_MARKER.len()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "item list truncated before its count",
        )
    })?;

    let records: Vec<usize> = hits
        .iter()
        .copied()
        .filter(|&hit| hit >= header_at + ITEM_HEADER_LEN)
        .collect();
    if count > 0 && records.first() != Some(&(header_at + ITEM_HEADER_LEN)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "first item record does not follow the item list header",
        ));
    }
    let record_end = |idx: usize| records.get(idx + 1).copied().unwrap_or(bytes.len());

    let mut items = Vec::new();
    let mut next = 0usize;
    let mut take = |parent: Option<usize>, items: &mut Vec<Item>| -> io::Result<Item> {
        let Some(&at) = records.get(next) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "item list declares {count} items but markers ran out after {}",
                    items.len()
                ),
            ));
        };
        let item = Item::new(bytes[at..record_end(next)].to_vec(), ItemFormat::Modern)
            .with_parent(parent);
        next += 1;
        Ok(item)
    };

    for _ in 0..count {
        let parent = take(None, &mut items)?;
        let children = parent.filled_sockets();
        let parent_index = items.len();
        items.push(parent);
        for _ in 0..children {
            let child = take(Some(parent_index), &mut items)?;
            items.push(child);
        }
    }

    let end = if count == 0 {
        header_at + ITEM_HEADER_LEN
    } else {
        records.get(next).copied().unwrap_or(bytes.len())
    };

    Ok((
        ItemList {
            layout: ItemListLayout::Counted,
            prefix: bytes[start..header_at].to_vec(),
            has_header: true,
            items,
        },
        end,
    ))
}

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

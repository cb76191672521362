use std::io;

use crate::class::CharacterClass;
use crate::status::{CharacterStatus, DifficultyState};
use crate::version::{
    CharacterVersion, DifficultyEncoding, MAGIC, NAME_LEN, VERSION_OFFSET, VersionLayout,
};

const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = NAME_LEN - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicInfo {
    pub name: String,
    pub status: CharacterStatus,
    pub title: u8,
    pub class: CharacterClass,
    pub display_level: u8,
    pub difficulty: DifficultyState,
}

pub fn parse_basic_info(bytes: &[u8], layout: &VersionLayout) -> io::Result<BasicInfo> {
    let fixed_end = layout.difficulty_offset + layout.difficulty_len();
    if bytes.len() < fixed_end {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "header truncated: need {fixed_end} bytes, have {}",
                bytes.len()
            ),
        ));
    }

    let name = read_name(&bytes[layout.name_offset..layout.name_offset + NAME_LEN])?;
    let difficulty = match layout.difficulty_encoding {
        DifficultyEncoding::Legacy => DifficultyState::from_legacy(bytes[layout.difficulty_offset]),
        DifficultyEncoding::Modern => {
            let at = layout.difficulty_offset;
            DifficultyState::from_modern([bytes[at], bytes[at + 1], bytes[at + 2]])
        }
    };

    Ok(BasicInfo {
        name,
        status: CharacterStatus::from_bits_retain(bytes[layout.status_offset]),
        title: bytes[layout.title_offset],
        class: CharacterClass::from_raw(bytes[layout.class_offset]),
        display_level: bytes[layout.level_offset],
        difficulty,
    })
}

fn read_name(field: &[u8]) -> io::Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8(field[..end].to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Game naming rules: 2-15 letters with at most one '-' or '_' that is
/// neither first nor last.
pub fn validate_name(name: &str) -> io::Result<()> {
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid name length {len}, expected {NAME_MIN_LEN}..{NAME_MAX_LEN}"),
        ));
    }

    let mut separators = 0;
    for (idx, c) in name.chars().enumerate() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '-' | '_' if idx != 0 && idx != len - 1 => separators += 1,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid character {other:?} in name {name:?}"),
                ));
            }
        }
    }
    if separators > 1 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("name {name:?} has more than one separator"),
        ));
    }
    Ok(())
}

fn field_mut<'a>(blob: &'a mut [u8], offset: usize, len: usize, label: &str) -> io::Result<&'a mut [u8]> {
    let blob_len = blob.len();
    blob.get_mut(offset..offset + len).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "header too short for {label} patch: len={blob_len}, need at least {}",
                offset + len
            ),
        )
    })
}

pub fn patch_name(blob: &mut [u8], layout: &VersionLayout, name: &str) -> io::Result<()> {
    validate_name(name)?;
    let field = field_mut(blob, layout.name_offset, NAME_LEN, "name")?;
    field.fill(0);
    field[..name.len()].copy_from_slice(name.as_bytes());
    Ok(())
}

pub fn patch_status(blob: &mut [u8], layout: &VersionLayout, status: CharacterStatus) -> io::Result<()> {
    field_mut(blob, layout.status_offset, 1, "status")?[0] = status.bits();
    Ok(())
}

pub fn patch_title(blob: &mut [u8], layout: &VersionLayout, title: u8) -> io::Result<()> {
    field_mut(blob, layout.title_offset, 1, "title")?[0] = title;
    Ok(())
}

pub fn patch_class(blob: &mut [u8], layout: &VersionLayout, class: CharacterClass) -> io::Result<()> {
    field_mut(blob, layout.class_offset, 1, "class")?[0] = class.raw();
    Ok(())
}

pub fn patch_display_level(blob: &mut [u8], layout: &VersionLayout, level: u8) -> io::Result<()> {
    field_mut(blob, layout.level_offset, 1, "display level")?[0] = level;
    Ok(())
}

pub fn patch_difficulty(
    blob: &mut [u8],
    layout: &VersionLayout,
    difficulty: DifficultyState,
) -> io::Result<()> {
    let field = field_mut(
        blob,
        layout.difficulty_offset,
        layout.difficulty_len(),
        "difficulty",
    )?;
    match layout.difficulty_encoding {
        DifficultyEncoding::Legacy => field[0] = difficulty.to_legacy(),
        DifficultyEncoding::Modern => field.copy_from_slice(&difficulty.to_modern()),
    }
    Ok(())
}

pub fn patch_u32(blob: &mut [u8], offset: usize, value: u32, label: &str) -> io::Result<()> {
    field_mut(blob, offset, 4, label)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// A zero-filled header of the generation's length with every known field set.
pub fn synthesize_header(version: CharacterVersion, info: &BasicInfo) -> io::Result<Vec<u8>> {
    let layout = version.layout();
    let mut blob = vec![0u8; layout.header_len];
    blob[..MAGIC.len()].copy_from_slice(&MAGIC);
    patch_u32(&mut blob, VERSION_OFFSET, version.raw(), "version")?;
    patch_name(&mut blob, layout, &info.name)?;
    patch_status(&mut blob, layout, info.status)?;
    patch_title(&mut blob, layout, info.title)?;
    patch_class(&mut blob, layout, info.class)?;
    patch_display_level(&mut blob, layout, info.display_level)?;
    patch_difficulty(&mut blob, layout, info.difficulty)?;
    Ok(blob)
}

use std::io;

use super::types::SKILL_MARKER;

pub const SKILL_COUNT: usize = 30;
pub const MAX_SKILL_LEVEL: u8 = 20;
pub const SKILL_BLOCK_LEN: usize = SKILL_MARKER.len() + SKILL_COUNT;

pub fn parse_skill_block(bytes: &[u8]) -> io::Result<[u8; SKILL_COUNT]> {
    if !bytes.starts_with(SKILL_MARKER) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "skill block does not start with its marker",
        ));
    }
    let body = bytes
        .get(SKILL_MARKER.len()..SKILL_BLOCK_LEN)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "skill block truncated: need {SKILL_BLOCK_LEN} bytes, have {}",
                    bytes.len()
                ),
            )
        })?;

    let mut levels = [0u8; SKILL_COUNT];
    levels.copy_from_slice(body);
    Ok(levels)
}

pub fn encode_skill_block(levels: &[u8; SKILL_COUNT]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SKILL_BLOCK_LEN);
    out.extend_from_slice(SKILL_MARKER);
    out.extend(levels.iter().map(|&level| clamp_level(level)));
    out
}

/// Patch one level in an existing block, clamped to the game's maximum.
pub fn patch_skill(blob: &mut [u8], index: usize, level: u8) -> io::Result<u8> {
    if index >= SKILL_COUNT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid skill index {index}, expected 0..{}", SKILL_COUNT - 1),
        ));
    }
    let at = SKILL_MARKER.len() + index;
    let blob_len = blob.len();
    let slot = blob.get_mut(at).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("skill block too short for patch: len={blob_len}, need at least {}", at + 1),
        )
    })?;
    let level = clamp_level(level);
    *slot = level;
    Ok(level)
}

pub fn clamp_level(level: u8) -> u8 {
    level.min(MAX_SKILL_LEVEL)
}

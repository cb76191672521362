pub const QUEST_MARKER: &[u8; 4] = b"Woo!";
pub const WAYPOINT_MARKER: &[u8; 2] = b"WS";
pub const NPC_MARKER: &[u8; 2] = b"w4";
pub const ATTRIBUTE_MARKER: &[u8; 2] = b"gf";
pub const SKILL_MARKER: &[u8; 2] = b"if";
pub const ITEM_MARKER: &[u8; 2] = b"JM";

pub const DIFFICULTY_COUNT: usize = 3;

/// `w4` + u16 total length + intro flags.
pub const NPC_BLOCK_LEN: usize = 52;
pub const NPC_HEADER_LEN: usize = 4;

pub const MODERN_QUEST_VERSION: u32 = 6;

/// First offset at or after `from` where `marker` starts.
pub fn find_marker(bytes: &[u8], marker: &[u8], from: usize) -> Option<usize> {
    if marker.is_empty() || from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|idx| from + idx)
}

/// Every offset at or after `from` where `marker` starts, non-overlapping.
pub fn marker_hits(bytes: &[u8], marker: &[u8], from: usize) -> Vec<usize> {
    let mut hits = Vec::new();
    let mut at = from;
    while let Some(hit) = find_marker(bytes, marker, at) {
        hits.push(hit);
        at = hit + marker.len();
    }
    hits
}

pub fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

#[cfg(test)]
mod tests {
    use super::{find_marker, marker_hits};

    #[test]
    fn finds_first_marker_after_offset() {
        let bytes = b"xxJMyyJMzz";
        assert_eq!(find_marker(bytes, b"JM", 0), Some(2));
        assert_eq!(find_marker(bytes, b"JM", 3), Some(6));
        assert_eq!(find_marker(bytes, b"JM", 7), None);
        assert_eq!(find_marker(bytes, b"JM", 40), None);
    }

    #[test]
    fn hits_do_not_overlap() {
        assert_eq!(marker_hits(b"JMJMxJM", b"JM", 0), vec![0, 2, 5]);
        assert!(marker_hits(b"abc", b"JM", 0).is_empty());
    }
}

use std::io;

use super::quests::ActProgress;
use super::types::{DIFFICULTY_COUNT, WAYPOINT_MARKER};

pub const WAYPOINT_COUNT: usize = 39;
pub const WAYPOINT_RECORD_LEN: usize = 24;
pub const WAYPOINT_BLOCK_LEN: usize = WAYPOINT_HEADER_LEN + DIFFICULTY_COUNT * WAYPOINT_RECORD_LEN;

const WAYPOINT_HEADER_LEN: usize = 8;
const WAYPOINT_BLOCK_VERSION: u32 = 1;
const RECORD_PREFIX: [u8; 2] = [0x02, 0x01];
const BITS_OFFSET: usize = 2;

/// `(first index, count)` per act.
const ACT_WAYPOINTS: [(usize, usize); 5] = [(0, 9), (9, 9), (18, 9), (27, 3), (30, 9)];
const EXPANSION_ACT: usize = 4;

/// Stored waypoint bits of one difficulty. Reads through [`WaypointSet::is_active`]
/// always see the repaired view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaypointSet {
    raw: [u8; WAYPOINT_RECORD_LEN],
}

impl Default for WaypointSet {
    fn default() -> Self {
        let mut raw = [0u8; WAYPOINT_RECORD_LEN];
        raw[..2].copy_from_slice(&RECORD_PREFIX);
        Self { raw }
    }
}

impl WaypointSet {
    pub fn from_record(raw: [u8; WAYPOINT_RECORD_LEN]) -> Self {
        Self { raw }
    }

    pub fn record(&self) -> &[u8; WAYPOINT_RECORD_LEN] {
        &self.raw
    }

    /// `(act, slot)` of a waypoint index.
    pub fn locate(index: usize) -> Option<(usize, usize)> {
        ACT_WAYPOINTS
            .iter()
            .enumerate()
            .find(|(_, (first, count))| (*first..first + count).contains(&index))
            .map(|(act, (first, _))| (act, index - first))
    }

    pub fn act_range(act: usize) -> Option<std::ops::Range<usize>> {
        ACT_WAYPOINTS
            .get(act)
            .map(|&(first, count)| first..first + count)
    }

    pub fn stored(&self, index: usize) -> bool {
        if index >= WAYPOINT_COUNT {
            return false;
        }
        self.raw[BITS_OFFSET + index / 8] & (1 << (index % 8)) != 0
    }

    pub fn set_stored(&mut self, index: usize, value: bool) -> io::Result<()> {
        if index >= WAYPOINT_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid waypoint {index}, expected 0..{}", WAYPOINT_COUNT - 1),
            ));
        }
        let byte = &mut self.raw[BITS_OFFSET + index / 8];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
        Ok(())
    }

    /// Effective state of a waypoint given the same difficulty's quest record.
    pub fn is_active(&self, index: usize, progress: &ActProgress, expansion: bool) -> bool {
        let Some((act, slot)) = Self::locate(index) else {
            return false;
        };
        if act == 0 && slot == 0 {
            return true;
        }
        if act > 0 {
            let reachable = progress.is_act_completed(act - 1)
                && (act != EXPANSION_ACT || expansion);
            if !reachable {
                return false;
            }
            if slot == 0 {
                return true;
            }
        }
        self.stored(index)
    }

    /// The same record with every stored bit replaced by its effective value.
    pub fn repaired(&self, progress: &ActProgress, expansion: bool) -> Self {
        let mut out = *self;
        for index in 0..WAYPOINT_COUNT {
            let active = self.is_active(index, progress, expansion);
            let byte = &mut out.raw[BITS_OFFSET + index / 8];
            if active {
                *byte |= 1 << (index % 8);
            } else {
                *byte &= !(1 << (index % 8));
            }
        }
        out
    }

    pub fn active_count(&self, progress: &ActProgress, expansion: bool) -> usize {
        (0..WAYPOINT_COUNT)
            .filter(|&index| self.is_active(index, progress, expansion))
            .count()
    }
}

pub fn parse_waypoint_block(bytes: &[u8]) -> io::Result<[WaypointSet; DIFFICULTY_COUNT]> {
    if !bytes.starts_with(WAYPOINT_MARKER) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "waypoint block does not start with its marker",
        ));
    }
    if bytes.len() < WAYPOINT_BLOCK_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "waypoint block truncated: need {WAYPOINT_BLOCK_LEN} bytes, have {}",
                bytes.len()
            ),
        ));
    }

    Ok(std::array::from_fn(|difficulty| {
        let start = WAYPOINT_HEADER_LEN + difficulty * WAYPOINT_RECORD_LEN;
        let mut raw = [0u8; WAYPOINT_RECORD_LEN];
        raw.copy_from_slice(&bytes[start..start + WAYPOINT_RECORD_LEN]);
        WaypointSet::from_record(raw)
    }))
}

pub fn encode_waypoint_block(sets: &[WaypointSet; DIFFICULTY_COUNT]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WAYPOINT_BLOCK_LEN);
    out.extend_from_slice(WAYPOINT_MARKER);
    out.extend_from_slice(&WAYPOINT_BLOCK_VERSION.to_le_bytes());
    out.extend_from_slice(&(WAYPOINT_BLOCK_LEN as u16).to_le_bytes());
    for set in sets {
        out.extend_from_slice(set.record());
    }
    out
}

/// Overwrite one difficulty record inside an existing waypoint blob.
pub fn patch_waypoint_record(blob: &mut [u8], difficulty: usize, set: &WaypointSet) -> io::Result<()> {
    let start = WAYPOINT_HEADER_LEN + difficulty * WAYPOINT_RECORD_LEN;
    let end = start + WAYPOINT_RECORD_LEN;
    if difficulty >= DIFFICULTY_COUNT || blob.len() < end {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "waypoint block too short for difficulty {difficulty}: len={}",
                blob.len()
            ),
        ));
    }
    blob[start..end].copy_from_slice(set.record());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{WAYPOINT_BLOCK_LEN, WaypointSet, encode_waypoint_block, parse_waypoint_block};
    use crate::d2s::quests::ActProgress;

    #[test]
    fn act_one_town_is_always_active() {
        let set = WaypointSet::default();
        let progress = ActProgress::new(48);
        assert!(!set.stored(0));
        assert!(set.is_active(0, &progress, true));
    }

    #[test]
    fn entry_follows_prior_act_completion() {
        let mut set = WaypointSet::default();
        let mut progress = ActProgress::new(48);
        set.set_stored(9, false).unwrap();
        set.set_stored(10, true).unwrap();

        assert!(!set.is_active(9, &progress, true));
        assert!(!set.is_active(10, &progress, true));

        progress.set_act_completed(0, true).unwrap();
        assert!(set.is_active(9, &progress, true));
        assert!(set.is_active(10, &progress, true));
        assert!(!set.is_active(11, &progress, true));
    }

    #[test]
    fn act_five_requires_expansion() {
        let mut set = WaypointSet::default();
        let mut progress = ActProgress::new(48);
        progress.set_act_completed(3, true).unwrap();
        set.set_stored(31, true).unwrap();
        assert!(!set.is_active(30, &progress, false));
        assert!(!set.is_active(31, &progress, false));
        assert!(set.is_active(30, &progress, true));
        assert!(set.is_active(31, &progress, true));
    }

    #[test]
    fn repair_persists_effective_view() {
        let mut set = WaypointSet::default();
        set.set_stored(20, true).unwrap();
        let progress = ActProgress::new(48);
        let repaired = set.repaired(&progress, true);
        assert!(repaired.stored(0));
        assert!(!repaired.stored(20));
        assert_eq!(repaired.record()[..2], [0x02, 0x01]);
    }

    #[test]
    fn block_round_trips() {
        let mut sets = [WaypointSet::default(); 3];
        sets[1].set_stored(5, true).unwrap();
        let blob = encode_waypoint_block(&sets);
        assert_eq!(blob.len(), WAYPOINT_BLOCK_LEN);
        assert_eq!(&blob[..2], b"WS");
        assert_eq!(parse_waypoint_block(&blob).unwrap(), sets);
    }

    #[test]
    fn locate_maps_indices_to_acts() {
        assert_eq!(WaypointSet::locate(0), Some((0, 0)));
        assert_eq!(WaypointSet::locate(27), Some((3, 0)));
        assert_eq!(WaypointSet::locate(29), Some((3, 2)));
        assert_eq!(WaypointSet::locate(38), Some((4, 8)));
        assert_eq!(WaypointSet::locate(39), None);
    }
}

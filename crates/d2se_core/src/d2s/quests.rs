use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use super::types::{DIFFICULTY_COUNT, MODERN_QUEST_VERSION, QUEST_MARKER};
use crate::status::ACT_COUNT;
use crate::version::VersionLayout;

const BIT_COMPLETED: u16 = 1 << 0;
const BIT_REQUIREMENTS_MET: u16 = 1 << 1;
const BIT_STARTED: u16 = 1 << 2;
const BIT_CLOSING: u16 = 1 << 12;
const STATE_BITS: u16 = BIT_COMPLETED | BIT_REQUIREMENTS_MET | BIT_STARTED | BIT_CLOSING;

const CLASSIC_FLAGS_WORD: usize = 29;
const ACT_V_FLAGS_WORD: usize = 40;
const FLAG_STATS_RESET: u16 = 1 << 0;
const FLAG_SECRET_LEVEL: u16 = 1 << 1;

#[derive(Debug, Clone, Copy)]
struct ActWords {
    intro: usize,
    first_quest: usize,
    quest_count: usize,
    completed: usize,
}

const ACT_WORDS: [ActWords; ACT_COUNT] = [
    ActWords { intro: 0, first_quest: 1, quest_count: 6, completed: 7 },
    ActWords { intro: 8, first_quest: 9, quest_count: 6, completed: 15 },
    ActWords { intro: 16, first_quest: 17, quest_count: 6, completed: 23 },
    ActWords { intro: 24, first_quest: 25, quest_count: 3, completed: 28 },
    ActWords { intro: 32, first_quest: 33, quest_count: 6, completed: 39 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestState {
    NotStarted,
    Started,
    JustCompleted,
    Completed,
}

impl QuestState {
    pub fn from_word(word: u16) -> Self {
        if word & BIT_COMPLETED != 0 {
            Self::Completed
        } else if word & BIT_REQUIREMENTS_MET != 0 {
            Self::JustCompleted
        } else if word & BIT_STARTED != 0 {
            Self::Started
        } else {
            Self::NotStarted
        }
    }

    fn pattern(&self) -> u16 {
        match *self {
            Self::NotStarted => 0,
            Self::Started => BIT_STARTED,
            Self::JustCompleted => BIT_STARTED | BIT_REQUIREMENTS_MET,
            Self::Completed => BIT_CLOSING | BIT_COMPLETED,
        }
    }

    /// Rewrite the state bits of `word`, leaving the others alone.
    pub fn apply(&self, word: u16) -> u16 {
        (word & !STATE_BITS) | self.pattern()
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::NotStarted => "not started",
            Self::Started => "started",
            Self::JustCompleted => "just completed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for QuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quest words of one difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActProgress {
    words: Vec<u16>,
}

impl ActProgress {
    pub fn new(word_count: usize) -> Self {
        Self {
            words: vec![0; word_count],
        }
    }

    pub fn from_words(words: Vec<u16>) -> Self {
        Self { words }
    }

    pub fn parse(bytes: &[u8]) -> Self {
        Self {
            words: bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Pad with zero words or truncate to `word_count`.
    pub fn resize(&mut self, word_count: usize) {
        self.words.resize(word_count, 0);
    }

    pub fn has_act(&self, act: usize) -> bool {
        match act {
            0..=3 => self.words.len() > CLASSIC_FLAGS_WORD,
            4 => self.words.len() > ACT_V_FLAGS_WORD,
            _ => false,
        }
    }

    pub fn quest_count(act: usize) -> usize {
        ACT_WORDS.get(act).map_or(0, |a| a.quest_count)
    }

    pub fn is_act_introduced(&self, act: usize) -> bool {
        self.act(act)
            .is_some_and(|a| self.words[a.intro] & BIT_COMPLETED != 0)
    }

    pub fn is_act_completed(&self, act: usize) -> bool {
        self.act(act)
            .is_some_and(|a| self.words[a.completed] & BIT_COMPLETED != 0)
    }

    pub fn quest_state(&self, act: usize, quest: usize) -> Option<QuestState> {
        let index = self.quest_word(act, quest)?;
        Some(QuestState::from_word(self.words[index]))
    }

    pub fn set_act_introduced(&mut self, act: usize, introduced: bool) -> io::Result<()> {
        let index = self.require_act(act)?.intro;
        set_bit(&mut self.words[index], BIT_COMPLETED, introduced);
        Ok(())
    }

    pub fn set_act_completed(&mut self, act: usize, completed: bool) -> io::Result<()> {
        let index = self.require_act(act)?.completed;
        set_bit(&mut self.words[index], BIT_COMPLETED, completed);
        Ok(())
    }

    pub fn set_quest_state(&mut self, act: usize, quest: usize, state: QuestState) -> io::Result<()> {
        self.require_act(act)?;
        let index = self.quest_word(act, quest).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "invalid quest {quest} for act {}, expected 0..{}",
                    act + 1,
                    Self::quest_count(act).saturating_sub(1)
                ),
            )
        })?;
        self.words[index] = state.apply(self.words[index]);
        Ok(())
    }

    pub fn stats_reset_used(&self, act: usize) -> bool {
        self.flag(act, FLAG_STATS_RESET)
    }

    pub fn secret_level_completed(&self, act: usize) -> bool {
        self.flag(act, FLAG_SECRET_LEVEL)
    }

    pub fn set_stats_reset_used(&mut self, act: usize, used: bool) -> io::Result<()> {
        self.set_flag(act, FLAG_STATS_RESET, used)
    }

    pub fn set_secret_level_completed(&mut self, act: usize, done: bool) -> io::Result<()> {
        self.set_flag(act, FLAG_SECRET_LEVEL, done)
    }

    fn act(&self, act: usize) -> Option<&'static ActWords> {
        if self.has_act(act) {
            ACT_WORDS.get(act)
        } else {
            None
        }
    }

    fn require_act(&self, act: usize) -> io::Result<&'static ActWords> {
        self.act(act).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "act {} is not present in a {}-word quest record",
                    act + 1,
                    self.words.len()
                ),
            )
        })
    }

    fn quest_word(&self, act: usize, quest: usize) -> Option<usize> {
        let words = self.act(act)?;
        (quest < words.quest_count).then_some(words.first_quest + quest)
    }

    fn flag_location(&self, act: usize, flag: u16) -> Option<(usize, u16)> {
        self.act(act)?;
        if act < 4 {
            Some((CLASSIC_FLAGS_WORD, flag << (2 * act)))
        } else {
            Some((ACT_V_FLAGS_WORD, flag))
        }
    }

    fn flag(&self, act: usize, flag: u16) -> bool {
        self.flag_location(act, flag)
            .is_some_and(|(index, bit)| self.words[index] & bit != 0)
    }

    fn set_flag(&mut self, act: usize, flag: u16, value: bool) -> io::Result<()> {
        self.require_act(act)?;
        if let Some((index, bit)) = self.flag_location(act, flag) {
            set_bit(&mut self.words[index], bit, value);
        }
        Ok(())
    }
}

fn set_bit(word: &mut u16, bit: u16, value: bool) {
    if value {
        *word |= bit;
    } else {
        *word &= !bit;
    }
}

pub fn quest_block_len(layout: &VersionLayout) -> usize {
    layout.quest_header_len + DIFFICULTY_COUNT * layout.quest_difficulty_len
}

pub fn parse_quest_block(
    bytes: &[u8],
    layout: &VersionLayout,
) -> io::Result<[ActProgress; DIFFICULTY_COUNT]> {
    if !bytes.starts_with(QUEST_MARKER) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "quest block does not start with its marker",
        ));
    }
    let needed = quest_block_len(layout);
    if bytes.len() < needed {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("quest block truncated: need {needed} bytes, have {}", bytes.len()),
        ));
    }

    Ok(std::array::from_fn(|difficulty| {
        let start = difficulty_offset(layout, difficulty);
        ActProgress::parse(&bytes[start..start + layout.quest_difficulty_len])
    }))
}

pub fn encode_quest_block(layout: &VersionLayout, progress: &[ActProgress; DIFFICULTY_COUNT]) -> Vec<u8> {
    let total = quest_block_len(layout);
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(QUEST_MARKER);
    if layout.quest_header_len > QUEST_MARKER.len() + 2 {
        out.extend_from_slice(&MODERN_QUEST_VERSION.to_le_bytes());
    }
    out.extend_from_slice(&(total as u16).to_le_bytes());

    let words = layout.quest_difficulty_len / 2;
    for difficulty in progress {
        let mut difficulty = difficulty.clone();
        difficulty.resize(words);
        out.extend_from_slice(&difficulty.to_bytes());
    }
    out
}

/// Overwrite one difficulty's words inside an existing quest blob.
pub fn patch_difficulty(
    blob: &mut [u8],
    layout: &VersionLayout,
    difficulty: usize,
    progress: &ActProgress,
) -> io::Result<()> {
    let start = difficulty_offset(layout, difficulty);
    let end = start + layout.quest_difficulty_len;
    let bytes = progress.to_bytes();
    if bytes.len() != layout.quest_difficulty_len || blob.len() < end {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "quest patch mismatch: record={} bytes, slot={}, blob len={}",
                bytes.len(),
                layout.quest_difficulty_len,
                blob.len()
            ),
        ));
    }
    blob[start..end].copy_from_slice(&bytes);
    Ok(())
}

fn difficulty_offset(layout: &VersionLayout, difficulty: usize) -> usize {
    layout.quest_header_len + difficulty * layout.quest_difficulty_len
}

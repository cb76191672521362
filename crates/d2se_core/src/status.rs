use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Character status byte. Bits without a name are kept as read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharacterStatus: u8 {
        const HARDCORE = 1 << 2;
        /// died at least once
        const RESURRECTED = 1 << 3;
        const EXPANSION = 1 << 5;
        const LADDER = 1 << 6;
    }
}

impl CharacterStatus {
    pub fn is_hardcore(&self) -> bool {
        self.contains(Self::HARDCORE)
    }

    pub fn is_expansion(&self) -> bool {
        self.contains(Self::EXPANSION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Normal,
    Nightmare,
    Hell,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Normal, Self::Nightmare, Self::Hell];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        match *self {
            Self::Normal => 0,
            Self::Nightmare => 1,
            Self::Hell => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Normal => "Normal",
            Self::Nightmare => "Nightmare",
            Self::Hell => "Hell",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ACT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub last_played: Difficulty,
    /// zero based
    pub starting_act: u8,
}

impl Default for DifficultyState {
    fn default() -> Self {
        Self {
            last_played: Difficulty::Normal,
            starting_act: 0,
        }
    }
}

impl DifficultyState {
    const ACTIVE_BIT: u8 = 0x80;
    const ACT_MASK: u8 = 0x07;

    /// One byte per difficulty; the active one has bit 7 set.
    pub fn from_modern(bytes: [u8; 3]) -> Self {
        let active = bytes.iter().position(|b| b & Self::ACTIVE_BIT != 0);
        let index = active.unwrap_or(0);
        Self {
            last_played: Difficulty::ALL[index],
            starting_act: bytes[index] & Self::ACT_MASK,
        }
    }

    pub fn to_modern(&self) -> [u8; 3] {
        let mut out = [0u8; 3];
        out[self.last_played.index()] = Self::ACTIVE_BIT | (self.starting_act & Self::ACT_MASK);
        out
    }

    /// High nibble difficulty, low nibble act.
    pub fn from_legacy(byte: u8) -> Self {
        let index = usize::from(byte >> 4).min(Difficulty::ALL.len() - 1);
        Self {
            last_played: Difficulty::ALL[index],
            starting_act: byte & 0x0F,
        }
    }

    pub fn to_legacy(&self) -> u8 {
        ((self.last_played.index() as u8) << 4) | (self.starting_act & 0x0F)
    }
}

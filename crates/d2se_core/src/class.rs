use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterClass {
    Amazon,
    Sorceress,
    Necromancer,
    Paladin,
    Barbarian,
    Druid,
    Assassin,
    #[serde(rename = "unknown")]
    Unknown(u8),
}

/// Per-point gains in quarter units, as the game tables store them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassGains {
    pub life_per_level: u32,
    pub stamina_per_level: u32,
    pub mana_per_level: u32,
    pub life_per_vitality: u32,
    pub stamina_per_vitality: u32,
    pub mana_per_energy: u32,
}

/// Starting attributes of a fresh level 1 character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassBase {
    pub strength: u32,
    pub dexterity: u32,
    pub energy: u32,
    pub vitality: u32,
    pub life: u32,
    pub mana: u32,
    pub stamina: u32,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 7] = [
        Self::Amazon,
        Self::Sorceress,
        Self::Necromancer,
        Self::Paladin,
        Self::Barbarian,
        Self::Druid,
        Self::Assassin,
    ];

    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Amazon,
            1 => Self::Sorceress,
            2 => Self::Necromancer,
            3 => Self::Paladin,
            4 => Self::Barbarian,
            5 => Self::Druid,
            6 => Self::Assassin,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match *self {
            Self::Amazon => 0,
            Self::Sorceress => 1,
            Self::Necromancer => 2,
            Self::Paladin => 3,
            Self::Barbarian => 4,
            Self::Druid => 5,
            Self::Assassin => 6,
            Self::Unknown(other) => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Amazon => "Amazon",
            Self::Sorceress => "Sorceress",
            Self::Necromancer => "Necromancer",
            Self::Paladin => "Paladin",
            Self::Barbarian => "Barbarian",
            Self::Druid => "Druid",
            Self::Assassin => "Assassin",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(name))
    }

    pub fn is_expansion_only(&self) -> bool {
        matches!(self, Self::Druid | Self::Assassin)
    }

    pub fn gains(&self) -> Option<ClassGains> {
        let (life_lvl, stam_lvl, mana_lvl, life_vit, stam_vit, mana_nrg) = match *self {
            Self::Amazon => (8, 4, 6, 12, 4, 6),
            Self::Sorceress => (4, 4, 8, 8, 4, 8),
            Self::Necromancer => (6, 4, 8, 8, 4, 8),
            Self::Paladin => (8, 4, 6, 12, 4, 6),
            Self::Barbarian => (8, 4, 4, 16, 4, 4),
            Self::Druid => (6, 4, 8, 8, 4, 8),
            Self::Assassin => (8, 5, 6, 12, 5, 7),
            Self::Unknown(_) => return None,
        };
        Some(ClassGains {
            life_per_level: life_lvl,
            stamina_per_level: stam_lvl,
            mana_per_level: mana_lvl,
            life_per_vitality: life_vit,
            stamina_per_vitality: stam_vit,
            mana_per_energy: mana_nrg,
        })
    }

    pub fn base(&self) -> Option<ClassBase> {
        let (strength, dexterity, energy, vitality, stamina) = match *self {
            Self::Amazon => (20, 25, 15, 20, 84),
            Self::Sorceress => (10, 25, 35, 10, 74),
            Self::Necromancer => (15, 25, 25, 15, 79),
            Self::Paladin => (25, 20, 15, 25, 89),
            Self::Barbarian => (30, 20, 10, 25, 92),
            Self::Druid => (15, 20, 20, 25, 84),
            Self::Assassin => (20, 20, 25, 20, 95),
            Self::Unknown(_) => return None,
        };
        Some(ClassBase {
            strength,
            dexterity,
            energy,
            vitality,
            life: vitality + 30,
            mana: energy,
            stamina,
        })
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unknown(v) => write!(f, "Unknown ({})", v),
            _ => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CharacterClass;

    #[test]
    fn raw_values_round_trip() {
        for raw in 0..=10u8 {
            assert_eq!(CharacterClass::from_raw(raw).raw(), raw);
        }
        assert_eq!(CharacterClass::from_raw(9), CharacterClass::Unknown(9));
    }

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(
            CharacterClass::from_name("sorceress"),
            Some(CharacterClass::Sorceress)
        );
        assert_eq!(CharacterClass::from_name("Warlock"), None);
        assert_eq!(CharacterClass::Unknown(12).to_string(), "Unknown (12)");
    }

    #[test]
    fn starting_life_is_vitality_plus_thirty() {
        let base = CharacterClass::Barbarian.base().unwrap();
        assert_eq!(base.life, 55);
        assert!(CharacterClass::Unknown(7).base().is_none());
    }
}

use super::{GpsCategory, GpsCode};

/// Gem colours in table order: amethyst, topaz, sapphire, emerald, ruby, diamond.
pub const GEM_COLOURS: [u8; 6] = *b"vybgrw";

/// Gem quality prefixes from chipped to perfect. Flawless amethyst is the
/// odd one out and uses `gzv`.
pub const GEM_QUALITIES: [u8; 5] = *b"cfslp";

pub const SKULLS: [&[u8; 3]; 5] = [b"skc", b"skf", b"sku", b"skl", b"skz"];
pub const PERFECT_SKULL: &[u8; 3] = b"skz";

pub const HEALING_POTIONS: [&[u8; 3]; 5] = [b"hp1", b"hp2", b"hp3", b"hp4", b"hp5"];
pub const MANA_POTIONS: [&[u8; 3]; 5] = [b"mp1", b"mp2", b"mp3", b"mp4", b"mp5"];
pub const REJUVENATION: &[u8; 3] = b"rvs";
pub const FULL_REJUVENATION: &[u8; 3] = b"rvl";
pub const OTHER_POTIONS: [&[u8; 3]; 3] = [b"yps", b"vps", b"wms"];

pub const RUNE_COUNT: u8 = 33;

pub fn gem(quality: u8, colour: u8) -> GpsCode {
    if quality == b'l' && colour == b'v' {
        return GpsCode::from_triple(*b"gzv");
    }
    GpsCode::from_triple([b'g', quality, colour])
}

pub fn perfect_gem(colour: u8) -> GpsCode {
    gem(b'p', colour)
}

pub fn rune(number: u8) -> GpsCode {
    GpsCode::from_triple([b'r', b'0' + number / 10, b'0' + number % 10])
}

/// Category of a catalogued code, `None` for everything else.
pub fn category(code: GpsCode) -> Option<GpsCategory> {
    let [a, b, c] = code.triple();
    match (a, b, c) {
        (b'g', q, colour) if GEM_QUALITIES.contains(&q) && GEM_COLOURS.contains(&colour) => {
            (gem(q, colour) == code).then_some(GpsCategory::Gem)
        }
        (b'g', b'z', b'v') => Some(GpsCategory::Gem),
        (b's', b'k', _) if SKULLS.iter().any(|s| **s == [a, b, c]) => Some(GpsCategory::Skull),
        (b'r', tens, ones) if tens.is_ascii_digit() && ones.is_ascii_digit() => {
            let n = (tens - b'0') * 10 + (ones - b'0');
            (1..=RUNE_COUNT).contains(&n).then_some(GpsCategory::Rune)
        }
        _ if is_potion(&[a, b, c]) => Some(GpsCategory::Potion),
        _ => None,
    }
}

fn is_potion(triple: &[u8; 3]) -> bool {
    HEALING_POTIONS
        .iter()
        .chain(MANA_POTIONS.iter())
        .chain(OTHER_POTIONS.iter())
        .chain([REJUVENATION, FULL_REJUVENATION].iter())
        .any(|p| *p == triple)
}

/// Every catalogued code.
pub fn all_codes() -> Vec<GpsCode> {
    let mut out = Vec::new();
    for quality in GEM_QUALITIES {
        for colour in GEM_COLOURS {
            out.push(gem(quality, colour));
        }
    }
    out.extend(SKULLS.iter().map(|s| GpsCode::from_triple(**s)));
    out.extend(
        HEALING_POTIONS
            .iter()
            .chain(MANA_POTIONS.iter())
            .chain([REJUVENATION, FULL_REJUVENATION].iter())
            .chain(OTHER_POTIONS.iter())
            .map(|p| GpsCode::from_triple(**p)),
    );
    out.extend((1..=RUNE_COUNT).map(rune));
    out
}

/// `(from, to)` pairs: every lower gem to the perfect gem of its colour and
/// every lower skull to the perfect skull.
pub fn gem_upgrades() -> Vec<(GpsCode, GpsCode)> {
    let mut out = Vec::new();
    for colour in GEM_COLOURS {
        let perfect = perfect_gem(colour);
        for &quality in &GEM_QUALITIES[..GEM_QUALITIES.len() - 1] {
            out.push((gem(quality, colour), perfect));
        }
    }
    let perfect = GpsCode::from_triple(*PERFECT_SKULL);
    for skull in &SKULLS[..SKULLS.len() - 1] {
        out.push((GpsCode::from_triple(**skull), perfect));
    }
    out
}

pub fn potion_upgrades() -> Vec<(GpsCode, GpsCode)> {
    let mut out = Vec::new();
    for family in [HEALING_POTIONS, MANA_POTIONS] {
        let best = GpsCode::from_triple(*family[family.len() - 1]);
        for lower in &family[..family.len() - 1] {
            out.push((GpsCode::from_triple(**lower), best));
        }
    }
    out.push((
        GpsCode::from_triple(*REJUVENATION),
        GpsCode::from_triple(*FULL_REJUVENATION),
    ));
    out
}

pub fn rejuvenation_upgrades() -> Vec<(GpsCode, GpsCode)> {
    let full = GpsCode::from_triple(*FULL_REJUVENATION);
    HEALING_POTIONS
        .iter()
        .chain(MANA_POTIONS.iter())
        .chain([REJUVENATION].iter())
        .map(|p| (GpsCode::from_triple(**p), full))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{all_codes, category, gem_upgrades, potion_upgrades, rejuvenation_upgrades};
    use crate::gps::{GpsCategory, GpsCode};

    fn code(s: &str) -> GpsCode {
        GpsCode::parse(s).unwrap()
    }

    #[test]
    fn catalogue_categories() {
        assert_eq!(category(code("gcv")), Some(GpsCategory::Gem));
        assert_eq!(category(code("gzv")), Some(GpsCategory::Gem));
        assert_eq!(category(code("glv")), None);
        assert_eq!(category(code("glr")), Some(GpsCategory::Gem));
        assert_eq!(category(code("skz")), Some(GpsCategory::Skull));
        assert_eq!(category(code("hp3")), Some(GpsCategory::Potion));
        assert_eq!(category(code("rvl")), Some(GpsCategory::Potion));
        assert_eq!(category(code("r33")), Some(GpsCategory::Rune));
        assert_eq!(category(code("r34")), None);
        assert_eq!(category(code("hax")), None);
    }

    #[test]
    fn catalogue_is_complete_and_unique() {
        let codes = all_codes();
        assert_eq!(codes.len(), 30 + 5 + 15 + 33);
        for c in &codes {
            assert!(category(*c).is_some(), "{c} should be catalogued");
        }
        let mut sorted: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn upgrade_targets() {
        let gems = gem_upgrades();
        assert_eq!(gems.len(), 6 * 4 + 4);
        assert!(gems.contains(&(code("gzv"), code("gpv"))));
        assert!(gems.contains(&(code("sku"), code("skz"))));
        assert!(!gems.iter().any(|(from, _)| *from == code("gpr")));

        let potions = potion_upgrades();
        assert!(potions.contains(&(code("hp2"), code("hp5"))));
        assert!(potions.contains(&(code("rvs"), code("rvl"))));
        assert!(!potions.iter().any(|(from, _)| *from == code("yps")));

        let rejuv = rejuvenation_upgrades();
        assert_eq!(rejuv.len(), 11);
        assert!(rejuv.iter().all(|(_, to)| *to == code("rvl")));
    }
}

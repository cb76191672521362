use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use d2se_core::core_api::{Character, Snapshot};
use d2se_core::d2s::attributes::Attribute;
use d2se_core::gps::GpsCode;
use d2se_core::interchange::Naming;
use log::debug;
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum NamingArg {
    Plain,
    Serialized,
}

#[derive(Debug, Parser)]
#[command(author, about, disable_version_flag = true)]
struct Cli {
    #[arg(value_name = "CHARACTER.d2s")]
    path: PathBuf,
    #[arg(long)]
    name: bool,
    #[arg(long)]
    class: bool,
    #[arg(long)]
    level: bool,
    #[arg(long)]
    xp: bool,
    #[arg(long)]
    version: bool,
    #[arg(long)]
    status: bool,
    #[arg(long)]
    gold: bool,
    #[arg(long)]
    stats: bool,
    #[arg(long)]
    skills: bool,
    #[arg(long)]
    items: bool,
    #[arg(long)]
    checksum: bool,
    #[arg(long)]
    json: bool,
    #[arg(long = "set-name")]
    set_name: Option<String>,
    #[arg(long = "set-level")]
    set_level: Option<u32>,
    #[arg(long = "set-xp")]
    set_xp: Option<u32>,
    #[arg(long = "set-strength")]
    set_strength: Option<u32>,
    #[arg(long = "set-dexterity")]
    set_dexterity: Option<u32>,
    #[arg(long = "set-vitality")]
    set_vitality: Option<u32>,
    #[arg(long = "set-energy")]
    set_energy: Option<u32>,
    #[arg(long = "set-gold")]
    set_gold: Option<u32>,
    #[arg(long = "set-stash-gold")]
    set_stash_gold: Option<u32>,
    #[arg(long = "set-stat-points")]
    set_stat_points: Option<u32>,
    #[arg(long = "set-skill-choices")]
    set_skill_choices: Option<u32>,
    #[arg(long = "upgrade-gems")]
    upgrade_gems: bool,
    #[arg(long = "upgrade-potions")]
    upgrade_potions: bool,
    #[arg(long = "upgrade-rejuvenation")]
    upgrade_rejuvenation: bool,
    #[arg(long = "convert-gps", value_name = "FROM:TO", value_parser = parse_gps_pair)]
    convert_gps: Vec<(GpsCode, GpsCode)>,
    #[arg(long = "export-json", value_name = "PATH")]
    export_json: Option<PathBuf>,
    #[arg(long = "import-json", value_name = "PATH")]
    import_json: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "serialized")]
    naming: NamingArg,
    #[arg(long, conflicts_with = "in_place")]
    output: Option<PathBuf>,
    #[arg(long = "in-place")]
    in_place: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldSelection {
    name: bool,
    class: bool,
    level: bool,
    xp: bool,
    version: bool,
    status: bool,
    gold: bool,
    stats: bool,
    skills: bool,
    items: bool,
    checksum: bool,
}

impl FieldSelection {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            name: cli.name,
            class: cli.class,
            level: cli.level,
            xp: cli.xp,
            version: cli.version,
            status: cli.status,
            gold: cli.gold,
            stats: cli.stats,
            skills: cli.skills,
            items: cli.items,
            checksum: cli.checksum,
        }
    }

    fn is_field_mode(&self) -> bool {
        self.name
            || self.class
            || self.level
            || self.xp
            || self.version
            || self.status
            || self.gold
            || self.stats
            || self.skills
            || self.items
            || self.checksum
    }

    fn selected_pairs(&self, character: &Character) -> Vec<(&'static str, String)> {
        let snapshot = character.snapshot();
        let mut out = Vec::new();

        if self.name {
            out.push(("name", snapshot.name.clone()));
        }
        if self.class {
            out.push(("class", snapshot.class.to_string()));
        }
        if self.level {
            out.push(("level", snapshot.level.to_string()));
        }
        if self.xp {
            out.push(("xp", snapshot.experience.to_string()));
        }
        if self.version {
            out.push(("version", snapshot.version.to_string()));
        }
        if self.status {
            out.push(("status", format_status(&snapshot)));
        }
        if self.gold {
            out.push(("gold", snapshot.gold.to_string()));
            out.push(("stash_gold", snapshot.stash_gold.to_string()));
        }
        if self.stats {
            for entry in &snapshot.attributes {
                out.push(("stat", format!("{}={}", entry.name, entry.value)));
            }
        }
        if self.skills {
            for (index, level) in snapshot.skills.iter().enumerate() {
                if *level > 0 {
                    out.push(("skill", format!("{index}={level}")));
                }
            }
        }
        if self.items {
            for item in &snapshot.items {
                out.push(("item", format_item(item)));
            }
        }
        if self.checksum {
            out.push(("checksum", checksum_state(character).to_string()));
        }

        out
    }

    fn selected_json(&self, character: &Character) -> JsonMap<String, JsonValue> {
        let snapshot = character.snapshot();
        let mut out = JsonMap::new();

        if self.name {
            out.insert("name".to_string(), JsonValue::String(snapshot.name.clone()));
        }
        if self.class {
            out.insert(
                "class".to_string(),
                JsonValue::String(snapshot.class.to_string()),
            );
        }
        if self.level {
            out.insert("level".to_string(), JsonValue::from(snapshot.level));
        }
        if self.xp {
            out.insert("xp".to_string(), JsonValue::from(snapshot.experience));
        }
        if self.version {
            out.insert(
                "version".to_string(),
                JsonValue::String(snapshot.version.to_string()),
            );
        }
        if self.status {
            out.insert("hardcore".to_string(), JsonValue::Bool(snapshot.hardcore));
            out.insert("expansion".to_string(), JsonValue::Bool(snapshot.expansion));
        }
        if self.gold {
            out.insert("gold".to_string(), JsonValue::from(snapshot.gold));
            out.insert("stash_gold".to_string(), JsonValue::from(snapshot.stash_gold));
        }
        if self.stats {
            out.insert("stats".to_string(), stats_to_json(&snapshot));
        }
        if self.skills {
            out.insert("skills".to_string(), JsonValue::from(snapshot.skills.clone()));
        }
        if self.items {
            out.insert("items".to_string(), items_to_json(&snapshot));
        }
        if self.checksum {
            out.insert(
                "checksum".to_string(),
                JsonValue::String(checksum_state(character).to_string()),
            );
        }

        out
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let fields = FieldSelection::from_cli(&cli);
    let naming = match cli.naming {
        NamingArg::Plain => Naming::Plain,
        NamingArg::Serialized => Naming::Serialized,
    };
    let attribute_edits: [(Attribute, Option<u32>); 10] = [
        (Attribute::Level, cli.set_level),
        (Attribute::Experience, cli.set_xp),
        (Attribute::Strength, cli.set_strength),
        (Attribute::Dexterity, cli.set_dexterity),
        (Attribute::Vitality, cli.set_vitality),
        (Attribute::Energy, cli.set_energy),
        (Attribute::Gold, cli.set_gold),
        (Attribute::StashGold, cli.set_stash_gold),
        (Attribute::StatPointsLeft, cli.set_stat_points),
        (Attribute::SkillChoicesLeft, cli.set_skill_choices),
    ];
    let has_attribute_edits = attribute_edits.iter().any(|(_, v)| v.is_some());
    let has_edits = cli.set_name.is_some()
        || has_attribute_edits
        || cli.upgrade_gems
        || cli.upgrade_potions
        || cli.upgrade_rejuvenation
        || !cli.convert_gps.is_empty()
        || cli.import_json.is_some();
    let has_destination = cli.output.is_some() || cli.in_place;

    if has_edits && !has_destination {
        eprintln!("edit flags require --output <PATH> or --in-place");
        process::exit(2);
    }
    if !has_edits && has_destination {
        eprintln!("--output/--in-place require at least one edit flag");
        process::exit(2);
    }

    let mut character = open_or_create(&cli, naming);

    if let Some(import_path) = &cli.import_json {
        if character.path().is_some() {
            let document = read_document(import_path);
            character
                .apply_document(&document, naming)
                .unwrap_or_else(|e| {
                    eprintln!("Error applying {}: {e}", import_path.display());
                    process::exit(1);
                });
        }
    }
    if let Some(name) = &cli.set_name {
        character.set_name(name).unwrap_or_else(|e| {
            eprintln!("Error applying name edit: {e}");
            process::exit(1);
        });
    }
    for &(attr, value) in &attribute_edits {
        if let Some(v) = value {
            let stored = character.set_attribute(attr, v).unwrap_or_else(|e| {
                eprintln!("Error applying {attr} edit: {e}");
                process::exit(1);
            });
            if stored != v {
                eprintln!("{attr} clamped to {stored}");
            }
        }
    }

    let mut reports: Vec<(&'static str, usize)> = Vec::new();
    if cli.upgrade_gems {
        reports.push(("upgraded_gems", or_exit(character.upgrade_gems(), "gem upgrade")));
    }
    if cli.upgrade_potions {
        reports.push((
            "upgraded_potions",
            or_exit(character.upgrade_potions(), "potion upgrade"),
        ));
    }
    if cli.upgrade_rejuvenation {
        reports.push((
            "upgraded_rejuvenation",
            or_exit(
                character.upgrade_rejuvenation_potions(),
                "rejuvenation upgrade",
            ),
        ));
    }
    for &(from, to) in &cli.convert_gps {
        reports.push((
            "converted",
            or_exit(character.convert_gps(from, to), "GPS conversion"),
        ));
    }

    if has_edits {
        let result = match &cli.output {
            Some(out_path) => character.save_as(out_path),
            None => character.save_as(&cli.path),
        };
        result.unwrap_or_else(|e| {
            eprintln!("Error writing save: {e}");
            process::exit(1);
        });
    }

    if let Some(export_path) = &cli.export_json {
        let document = character.to_document(naming).unwrap_or_else(|e| {
            eprintln!("Error exporting document: {e}");
            process::exit(1);
        });
        let rendered = serde_json::to_string_pretty(&document).unwrap_or_else(|e| {
            eprintln!("Error rendering document: {e}");
            process::exit(1);
        });
        fs::write(export_path, rendered).unwrap_or_else(|e| {
            eprintln!("Error writing {}: {e}", export_path.display());
            process::exit(1);
        });
        debug!("exported document to {}", export_path.display());
    }

    if cli.json {
        let json = if fields.is_field_mode() {
            JsonValue::Object(fields.selected_json(&character))
        } else {
            serde_json::to_value(character.snapshot()).unwrap_or_else(|e| {
                eprintln!("Error rendering JSON output: {e}");
                process::exit(1);
            })
        };
        let rendered = serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
            eprintln!("Error rendering JSON output: {e}");
            process::exit(1);
        });
        println!("{rendered}");
        return;
    }

    if fields.is_field_mode() {
        for (key, value) in fields.selected_pairs(&character) {
            println!("{key}={value}");
        }
        return;
    }

    if has_edits {
        for (key, count) in &reports {
            println!("{key}={count}");
        }
        if let Some(path) = character.path() {
            println!("Wrote edited save to {}", path.display());
        }
        return;
    }

    if cli.export_json.is_none() {
        print_character_sheet(&character);
    }
}

/// Open the save, or build one from `--import-json` when the path does not
/// exist yet.
fn open_or_create(cli: &Cli, naming: Naming) -> Character {
    if let Some(import_path) = &cli.import_json {
        if !cli.path.exists() {
            let document = read_document(import_path);
            return Character::from_document(&document, naming).unwrap_or_else(|e| {
                eprintln!("Error creating character from {}: {e}", import_path.display());
                process::exit(1);
            });
        }
    }

    Character::open(&cli.path).unwrap_or_else(|e| {
        eprintln!("Error opening save file: {}", cli.path.display());
        eprintln!("  {e}");
        process::exit(1);
    })
}

fn read_document(path: &Path) -> JsonValue {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {e}", path.display());
        process::exit(1);
    })
}

fn or_exit<T, E: std::fmt::Display>(result: Result<T, E>, label: &str) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error applying {label}: {e}");
        process::exit(1);
    })
}

fn parse_gps_pair(raw: &str) -> Result<(GpsCode, GpsCode), String> {
    let (from, to) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid conversion '{raw}', expected FROM:TO"))?;
    let parse = |code: &str| {
        GpsCode::parse(code)
            .filter(|c| c.category().is_some())
            .ok_or_else(|| format!("unknown gem/potion/skull code '{code}'"))
    };
    Ok((parse(from)?, parse(to)?))
}

fn checksum_state(character: &Character) -> &'static str {
    if !character.version().has_checksum() {
        return "none";
    }
    match character.is_checksum_valid() {
        Ok(true) => "valid",
        Ok(false) => "invalid",
        Err(_) => "unknown",
    }
}

fn format_status(snapshot: &Snapshot) -> String {
    let mut flags = Vec::new();
    if snapshot.hardcore {
        flags.push("hardcore");
    }
    if snapshot.expansion {
        flags.push("expansion");
    }
    if flags.is_empty() {
        "none".to_string()
    } else {
        flags.join(",")
    }
}

fn format_item(item: &d2se_core::core_api::ItemEntry) -> String {
    let code = item.code.as_deref().unwrap_or("-");
    match item.socketed_into {
        Some(parent) => format!("{} {} {code} in={parent}", item.index, item.location),
        None => format!("{} {} {code}", item.index, item.location),
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

fn stats_to_json(snapshot: &Snapshot) -> JsonValue {
    let mut out = JsonMap::new();
    for entry in &snapshot.attributes {
        out.insert(entry.name.clone(), JsonValue::from(entry.value));
    }
    JsonValue::Object(out)
}

fn items_to_json(snapshot: &Snapshot) -> JsonValue {
    JsonValue::Array(
        snapshot
            .items
            .iter()
            .map(|item| {
                let mut obj = JsonMap::new();
                obj.insert("index".to_string(), JsonValue::from(item.index));
                obj.insert(
                    "location".to_string(),
                    JsonValue::String(item.location.clone()),
                );
                obj.insert(
                    "code".to_string(),
                    item.code
                        .clone()
                        .map(JsonValue::String)
                        .unwrap_or(JsonValue::Null),
                );
                obj.insert(
                    "socketed_into".to_string(),
                    item.socketed_into
                        .map(JsonValue::from)
                        .unwrap_or(JsonValue::Null),
                );
                JsonValue::Object(obj)
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

fn print_character_sheet(character: &Character) {
    let snapshot = character.snapshot();
    println!("{} ({}), level {}", snapshot.name, snapshot.class, snapshot.level);
    println!("  version:    {}", snapshot.version);
    println!("  status:     {}", format_status(&snapshot));
    println!("  experience: {}", snapshot.experience);
    println!("  gold:       {} (stash {})", snapshot.gold, snapshot.stash_gold);
    println!(
        "  difficulty: {} act {}",
        snapshot.last_played,
        snapshot.starting_act + 1
    );
    println!("  checksum:   {}", checksum_state(character));
    for warning in &snapshot.warnings {
        println!("  warning:    {warning:?}");
    }

    println!();
    println!("Attributes");
    for entry in &snapshot.attributes {
        println!("  {:<20} {}", entry.name, entry.value);
    }

    let waypoints = snapshot
        .waypoints_active
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join("/");
    println!();
    println!("Waypoints active (normal/nightmare/hell): {waypoints}");

    println!();
    println!("Items ({})", snapshot.items.len());
    for item in &snapshot.items {
        println!("  {}", format_item(item));
    }
}

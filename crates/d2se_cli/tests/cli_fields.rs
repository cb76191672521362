use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use d2se_core::bitstream::write_bits_at;
use d2se_core::class::CharacterClass;
use d2se_core::core_api::Character;
use d2se_core::d2s::attributes::Attribute;
use d2se_core::d2s::items::{Item, ItemFormat, ItemList};
use d2se_core::d2s::{CharacterRecord, Document};
use d2se_core::version::CharacterVersion;
use serde_json::Value;
use tempfile::TempDir;

fn modern_item(code: &[u8; 4], location: u8, socketed: bool, filled: u8) -> Item {
    let mut bytes = vec![0u8; 16];
    bytes[..2].copy_from_slice(b"JM");
    if socketed {
        write_bits_at(&mut bytes, 27, 1, 1).unwrap();
    }
    write_bits_at(&mut bytes, 58, u64::from(location), 3).unwrap();
    let offset = if location == 6 { 73 } else { 76 };
    write_bits_at(&mut bytes, offset, u64::from(u32::from_le_bytes(*code)), 32).unwrap();
    write_bits_at(&mut bytes, offset + 32, u64::from(filled), 3).unwrap();
    Item::new(bytes, ItemFormat::Modern)
}

fn fixture_record(version: CharacterVersion) -> CharacterRecord {
    let mut record = CharacterRecord::new(version, "Tester", CharacterClass::Sorceress);
    record.attributes.set(Attribute::Level, 10);
    record.attributes.set(Attribute::Experience, 12345);
    record.attributes.set(Attribute::Gold, 500);
    record.attributes.set(Attribute::StashGold, 1000);
    record.display_level = 10;
    record.skills[0] = 3;
    record.skills[7] = 1;
    if !version.is_legacy() {
        let mut items = ItemList::empty(version.layout().item_layout);
        items.items = vec![
            modern_item(b"swd ", 1, true, 1),
            modern_item(b"gcr ", 6, false, 0).with_parent(Some(0)),
            modern_item(b"hp1 ", 2, false, 0),
            modern_item(b"gcb ", 0, false, 0),
        ];
        record.items = items;
    }
    record
}

fn write_fixture(dir: &TempDir, version: CharacterVersion) -> PathBuf {
    let bytes = Document::from_record(fixture_record(version))
        .expect("failed to synthesize save")
        .to_bytes_modified()
        .expect("failed to emit save");
    let path = dir.path().join("Tester.d2s");
    fs::write(&path, bytes).expect("failed to write fixture");
    path
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_d2se"))
        .args(args)
        .output()
        .expect("failed to run d2se CLI")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn cli_prints_requested_fields_in_fixed_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V110));
    let output = run_cli(&["--xp", "--name", "--level", "--class", &path]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec!["name=Tester", "class=Sorceress", "level=10", "xp=12345"]
    );
}

#[test]
fn cli_reports_version_status_and_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V110));
    let output = run_cli(&["--version", "--status", "--checksum", &path]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec!["version=1.10+", "status=expansion", "checksum=valid"]
    );
}

#[test]
fn cli_reports_no_checksum_for_legacy_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V104));
    let output = run_cli(&["--version", "--checksum", &path]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec!["version=1.04-1.06", "checksum=none"]
    );
}

#[test]
fn cli_flags_a_stale_checksum_but_still_reads_the_save() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let mut bytes = fs::read(&fixture).unwrap();
    // first letter of the name
    bytes[20] = b'X';
    fs::write(&fixture, bytes).unwrap();

    let output = run_cli(&["--name", "--checksum", &path_arg(&fixture)]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["name=Xester", "checksum=invalid"]);
}

#[test]
fn cli_lists_items_with_socket_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V110));
    let output = run_cli(&["--items", &path]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec![
            "item=0 equipped -",
            "item=1 socketed gcr in=0",
            "item=2 belt hp1",
            "item=3 stored gcb",
        ]
    );
}

#[test]
fn cli_lists_only_learned_skills() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V109));
    let output = run_cli(&["--skills", &path]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["skill=0=3", "skill=7=1"]);
}

#[test]
fn cli_json_with_field_flags_prints_only_selected_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V110));
    let output = run_cli(&["--json", "--level", "--gold", &path]);
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    let obj = json.as_object().expect("expected a JSON object");
    assert_eq!(obj.len(), 3);
    assert_eq!(obj["level"], 10);
    assert_eq!(obj["gold"], 500);
    assert_eq!(obj["stash_gold"], 1000);
}

#[test]
fn cli_json_without_field_flags_prints_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V107));
    let output = run_cli(&["--json", &path]);
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(json["name"], "Tester");
    assert_eq!(json["level"], 10);
    assert_eq!(json["items"].as_array().map(Vec::len), Some(4));
}

#[test]
fn cli_without_field_flags_prints_character_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_arg(&write_fixture(&dir, CharacterVersion::V110));
    let output = run_cli(&[&path]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Tester (Sorceress), level 10"));
    assert!(stdout.contains("Attributes"));
    assert!(stdout.contains("Items (4)"));
}

#[test]
fn cli_rejects_edits_without_a_destination() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let before = fs::read(&fixture).unwrap();

    let output = run_cli(&["--set-level", "20", &path_arg(&fixture)]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(fs::read(&fixture).unwrap(), before);
}

#[test]
fn cli_rejects_destination_without_edits() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let out = dir.path().join("out.d2s");

    let output = run_cli(&["--output", &path_arg(&out), &path_arg(&fixture)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!out.exists());
}

#[test]
fn cli_rejects_output_and_in_place_together() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let out = dir.path().join("out.d2s");

    let output = run_cli(&[
        "--set-gold",
        "1",
        "--output",
        &path_arg(&out),
        "--in-place",
        &path_arg(&fixture),
    ]);
    assert!(!output.status.success());
    assert!(!out.exists());
}

#[test]
fn cli_writes_attribute_edits_to_output_and_leaves_input_alone() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let before = fs::read(&fixture).unwrap();
    let out = dir.path().join("edited.d2s");

    let output = run_cli(&[
        "--set-level",
        "20",
        "--set-gold",
        "9000",
        "--set-name",
        "Renamed",
        "--output",
        &path_arg(&out),
        &path_arg(&fixture),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(fs::read(&fixture).unwrap(), before);

    let edited = Character::open(&out).expect("edited save should open");
    assert_eq!(edited.name(), "Renamed");
    assert_eq!(edited.level(), 20);
    assert_eq!(edited.attribute(Attribute::Gold), 9000);
    assert!(edited.is_checksum_valid().unwrap());
    assert!(edited.warnings().is_empty());
}

#[test]
fn cli_upgrades_gems_and_reports_the_count() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let out = dir.path().join("gems.d2s");

    let output = run_cli(&[
        "--upgrade-gems",
        "--output",
        &path_arg(&out),
        &path_arg(&fixture),
    ]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines[0], "upgraded_gems=2");
    assert!(lines[1].starts_with("Wrote edited save to "));

    let listing = run_cli(&["--items", &path_arg(&out)]);
    assert_eq!(
        stdout_lines(&listing),
        vec![
            "item=0 equipped -",
            "item=1 socketed gpr in=0",
            "item=2 belt hp1",
            "item=3 stored gpb",
        ]
    );
}

#[test]
fn cli_converts_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V109);
    let path = path_arg(&fixture);

    let output = run_cli(&["--convert-gps", "hp1:hp5", "--in-place", &path]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output)[0], "converted=1");

    let reopened = Character::open(&fixture).unwrap();
    let codes: Vec<Option<String>> = reopened
        .snapshot()
        .items
        .into_iter()
        .map(|item| item.code)
        .collect();
    assert_eq!(codes[2].as_deref(), Some("hp5"));
}

#[test]
fn cli_belt_placement_blocks_potion_to_gem_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let out = dir.path().join("out.d2s");

    let output = run_cli(&[
        "--convert-gps",
        "hp1:gpw",
        "--output",
        &path_arg(&out),
        &path_arg(&fixture),
    ]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output)[0], "converted=0");
}

#[test]
fn cli_rejects_unknown_conversion_codes() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);

    let output = run_cli(&["--convert-gps", "swd:gpw", "--in-place", &path_arg(&fixture)]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_fails_on_a_file_that_is_not_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.d2s");
    fs::write(&path, b"not a character save at all").unwrap();

    let output = run_cli(&["--name", &path_arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error opening save file"));
}

#[test]
fn cli_export_then_import_recreates_the_save() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let exported = dir.path().join("tester.json");
    let recreated = dir.path().join("recreated.d2s");

    let output = run_cli(&[
        "--export-json",
        &path_arg(&exported),
        "--naming",
        "plain",
        &path_arg(&fixture),
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let document: Value = serde_json::from_str(&fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(document["Name"], "Tester");

    let output = run_cli(&[
        "--import-json",
        &path_arg(&exported),
        "--naming",
        "plain",
        "--in-place",
        &path_arg(&recreated),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(fs::read(&recreated).unwrap(), fs::read(&fixture).unwrap());
}

#[test]
fn cli_import_applies_document_edits_to_an_existing_save() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(&dir, CharacterVersion::V110);
    let exported = dir.path().join("tester.json");
    let out = dir.path().join("imported.d2s");

    let character = Character::open(&fixture).unwrap();
    let mut document = character
        .to_document(d2se_core::interchange::Naming::Serialized)
        .unwrap();
    document["name"] = Value::String("Imported".to_string());
    fs::write(&exported, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    let output = run_cli(&[
        "--import-json",
        &path_arg(&exported),
        "--output",
        &path_arg(&out),
        &path_arg(&fixture),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(Character::open(&out).unwrap().name(), "Imported");
}

//! CLI smoke tests through the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn chansync() -> Command {
    Command::cargo_bin("chansync").expect("binary builds")
}

#[test]
fn help_lists_pipeline_commands() {
    chansync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("aliases"));
}

#[test]
fn provider_lifecycle_against_temp_db() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("chansync.sqlite");

    chansync()
        .env("CHANSYNC_DB", &db)
        .args([
            "provider",
            "add",
            "ez",
            "--url",
            "https://ez.example.com",
            "--schema",
            "flat",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("added provider 'ez'"));

    chansync()
        .env("CHANSYNC_DB", &db)
        .args(["provider", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ez"))
        .stdout(predicate::str::contains("https://ez.example.com"));

    chansync()
        .env("CHANSYNC_DB", &db)
        .args(["group", "add", "vip", "--provider", "ez", "--ratio", "0.5", "--key", "sk-vip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added group 'vip'"));

    // Key listings are masked.
    chansync()
        .env("CHANSYNC_DB", &db)
        .args(["group", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sk-v"))
        .stdout(predicate::str::contains("sk-vip").not());

    // Destructive removal requires --yes.
    chansync()
        .env("CHANSYNC_DB", &db)
        .args(["provider", "remove", "ez"])
        .assert()
        .failure()
        .code(2);

    chansync()
        .env("CHANSYNC_DB", &db)
        .args(["provider", "remove", "ez", "--yes"])
        .assert()
        .success();
}

#[test]
fn unknown_schema_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    chansync()
        .env("CHANSYNC_DB", dir.path().join("db.sqlite"))
        .args([
            "provider",
            "add",
            "ez",
            "--url",
            "https://ez.example.com",
            "--schema",
            "yaml",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown price schema"));
}

#[test]
fn sync_on_empty_db_stops_before_the_gateway() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("chansync.sqlite");

    chansync()
        .env("CHANSYNC_DB", &db)
        .env_remove("CHANSYNC_GATEWAY_URL")
        .env_remove("CHANSYNC_GATEWAY_TOKEN")
        .env("CHANSYNC_CONFIG", dir.path().join("missing-config.toml"))
        .args(["sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no channels"));
}

#[test]
fn offers_listing_is_empty_on_fresh_db() {
    let dir = tempfile::tempdir().expect("tempdir");
    chansync()
        .env("CHANSYNC_DB", dir.path().join("db.sqlite"))
        .args(["offers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no offers stored"));
}

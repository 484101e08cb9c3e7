use std::path::{Path, PathBuf};
use std::process::Command as Process;

use askdb::cli::app::{Cli, Command};
use clap::Parser;
use rusqlite::Connection;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_SCHEMA_UNAVAILABLE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn seed_database(path: &Path) {
    let connection = Connection::open(path).expect("fixture db should open");
    connection
        .execute_batch(
            "CREATE TABLE Artists (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO Artists VALUES (1, 'AC/DC');",
        )
        .expect("fixture should load");
}

fn askdb(home: &Path) -> Process {
    let mut command = Process::new(env!("CARGO_BIN_EXE_askdb"));
    command
        .arg("--home-dir")
        .arg(home)
        .arg("--cwd")
        .arg(home)
        .arg("--no-trace")
        .env_remove("ASKDB_API_KEY")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn parses_global_runtime_flags_for_chat() {
    let cli = Cli::parse_from([
        "askdb",
        "--database",
        "~/music.db",
        "--home-dir",
        "/home/tester",
        "--read-only",
        "chat",
        "--max-attempts",
        "5",
        "-v",
    ]);

    assert_eq!(cli.runtime.database, Path::new("~/music.db"));
    assert_eq!(
        cli.runtime.home_dir.as_deref(),
        Some(Path::new("/home/tester"))
    );
    assert!(cli.runtime.read_only);
    assert!(cli.runtime.verbose);
    assert!(!cli.runtime.no_trace);
    assert_eq!(cli.runtime.max_attempts, 5);
    assert!(matches!(cli.command, Command::Chat(_)));
}

#[test]
fn defaults_match_the_documented_runtime() {
    let cli = Cli::parse_from(["askdb", "schema"]);

    assert_eq!(cli.runtime.database, Path::new("data/chinook.db"));
    assert_eq!(cli.runtime.max_attempts, 3);
    assert!(!cli.runtime.read_only);
    assert!(cli.runtime.model.is_none());
    match cli.command {
        Command::Schema(args) => assert!(!args.json),
        other => panic!("expected schema command, got {other:?}"),
    }
}

#[test]
fn parses_ask_question_and_json_flag() {
    let cli = Cli::parse_from(["askdb", "ask", "How many artists?", "--json", "--model", "m1"]);

    assert_eq!(cli.runtime.model.as_deref(), Some("m1"));
    match cli.command {
        Command::Ask(args) => {
            assert_eq!(args.question, "How many artists?");
            assert!(args.json);
        }
        other => panic!("expected ask command, got {other:?}"),
    }
}

#[test]
fn zero_max_attempts_is_a_usage_error() {
    let error = Cli::try_parse_from(["askdb", "--max-attempts", "0", "chat"])
        .expect_err("zero attempts must be rejected");
    assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn missing_subcommand_exits_with_usage_code() {
    let home = unique_temp_dir("askdb-cli-usage");
    let status = askdb(&home).status().expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn schema_command_prints_the_description() {
    let home = unique_temp_dir("askdb-cli-schema");
    let database = home.join("music.db");
    seed_database(&database);

    let output = askdb(&home)
        .args(["--database", "music.db", "schema"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("askdb: starting `schema`"));
    assert!(stdout.contains("Table: Artists"));
    assert!(stdout.contains("Sample row: (1, 'AC/DC')"));
}

#[test]
fn schema_command_json_lists_tables() {
    let home = unique_temp_dir("askdb-cli-schema-json");
    let database = home.join("music.db");
    seed_database(&database);

    let output = askdb(&home)
        .arg("--database")
        .arg(&database)
        .args(["schema", "--json"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find('[').expect("json array should be printed");
    let json_end = stdout.rfind(']').expect("json array should be closed");
    let tables: serde_json::Value =
        serde_json::from_str(&stdout[json_start..=json_end]).expect("schema json should parse");
    assert_eq!(tables[0]["name"], "Artists");
    assert_eq!(tables[0]["columns"][1]["not_null"], true);
}

#[test]
fn missing_database_exits_with_schema_unavailable_code() {
    let home = unique_temp_dir("askdb-cli-missing-db");

    let output = askdb(&home)
        .args(["--database", "nowhere.db", "schema"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_SCHEMA_UNAVAILABLE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("database file does not exist"));
    assert!(!home.join("nowhere.db").exists());
}

#[test]
fn ask_without_api_key_exits_with_runtime_code() {
    let home = unique_temp_dir("askdb-cli-no-key");
    let database = home.join("music.db");
    seed_database(&database);

    let output = askdb(&home)
        .args(["--database", "music.db", "ask", "How many artists?"])
        .output()
        .expect("command should execute");

    assert_eq!(output.status.code(), Some(EXIT_RUNTIME_FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ASKDB_API_KEY"));
}

#[test]
fn database_problems_outrank_a_missing_api_key() {
    let home = unique_temp_dir("askdb-cli-db-before-key");
    std::fs::write(home.join("garbage.db"), "not a sqlite database\n".repeat(256))
        .expect("garbage file should be writable");

    for (database, command) in [
        ("nowhere.db", "ask"),
        ("garbage.db", "ask"),
        ("nowhere.db", "chat"),
    ] {
        let mut process = askdb(&home);
        process.args(["--database", database, command]);
        if command == "ask" {
            process.arg("How many artists?");
        }
        let output = process.output().expect("command should execute");

        assert_eq!(
            output.status.code(),
            Some(EXIT_SCHEMA_UNAVAILABLE),
            "{command} against {database}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(!String::from_utf8_lossy(&output.stderr).contains("ASKDB_API_KEY"));
    }
}

//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("relaylab")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Relay HTTP requests"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("relaylab")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("relaylab"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("relaylab")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success();
}

#[test]
fn test_send_subcommand_exists() {
    Command::cargo_bin("relaylab")
        .unwrap()
        .args(["send", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--url"));
}

#[test]
fn test_history_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cli.db");

    Command::cargo_bin("relaylab")
        .unwrap()
        .env_remove("RELAYLAB_CONFIG")
        .args(["history", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicates::str::contains("No test records found."));
}

#[test]
fn test_send_to_closed_port_records_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cli.db");

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    Command::cargo_bin("relaylab")
        .unwrap()
        .env_remove("RELAYLAB_CONFIG")
        .args(["send", "--json", "--url"])
        .arg(format!("http://127.0.0.1:{port}"))
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicates::str::contains("No response received from server"));

    Command::cargo_bin("relaylab")
        .unwrap()
        .env_remove("RELAYLAB_CONFIG")
        .args(["history", "--json", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicates::str::contains("NetworkError"));
}

#[test]
fn test_show_unknown_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cli.db");

    Command::cargo_bin("relaylab")
        .unwrap()
        .env_remove("RELAYLAB_CONFIG")
        .args(["show", "00000000-0000-0000-0000-000000000000", "--db"])
        .arg(&db)
        .assert()
        .failure();
}

#[test]
fn test_broken_env_config_falls_back_and_warns() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cli.db");
    let missing = dir.path().join("missing.toml");

    Command::cargo_bin("relaylab")
        .unwrap()
        .env("RELAYLAB_CONFIG", &missing)
        .env_remove("RUST_LOG")
        .args(["history", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicates::str::contains("No test records found."))
        .stderr(predicates::str::contains("could not be loaded"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("relaylab")
        .unwrap()
        .env_remove("RELAYLAB_CONFIG")
        .args(["history", "--config"])
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure();
}

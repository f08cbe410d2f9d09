//! CLI subprocess integration tests.
//!
//! These tests invoke the `minid` binary as a subprocess against a local
//! [`minid_server::TestServer`], isolating config and credentials into
//! per-test temp directories.

use minid_server::TestServer;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const TEST_TOKEN: &str = "cli-test-token";

fn minid_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_minid"))
}

/// A config dir whose tokens.json holds valid (far-future) credentials.
fn config_dir_with_login(dir: &Path) -> PathBuf {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("tokens.json"),
        format!(
            r#"{{"access_token": "{TEST_TOKEN}", "expires_at": "2099-01-01T00:00:00Z"}}"#
        ),
    )
    .unwrap();
    config_dir
}

fn run_minid(config_dir: &Path, registry: &str, args: &[&str]) -> Output {
    minid_bin()
        .args([
            "--config-dir",
            &config_dir.to_string_lossy(),
            "--registry",
            registry,
        ])
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let output = minid_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "minid --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("minid"),
        "version output must contain 'minid': {stdout}"
    );
}

#[test]
fn cli_help_lists_commands() {
    let output = minid_bin().arg("--help").output().unwrap();
    assert!(output.status.success(), "minid --help must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["login", "register", "batch-register", "check", "update"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn check_unknown_checksum_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().join("data"));
    let config_dir = dir.path().join("config");

    let output = run_minid(
        &config_dir,
        &server.url,
        &[
            "check",
            "5994471abb01112afcc18159f6cc74b4f511b99806da59b3caf5a9c173cacfc5",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no identifier registered"));
}

#[test]
fn register_without_login_exits_three() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().join("data"));
    let config_dir = dir.path().join("config");
    let file = dir.path().join("data.bin");
    std::fs::write(&file, b"12345").unwrap();

    let output = run_minid(
        &config_dir,
        &server.url,
        &["register", &file.to_string_lossy()],
    );

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not logged in"), "stderr: {stderr}");
}

#[test]
fn register_then_check_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let file = dir.path().join("data.bin");
    std::fs::write(&file, b"12345").unwrap();

    let register = run_minid(
        &config_dir,
        &server.url,
        &["register", &file.to_string_lossy(), "--title", "my data"],
    );
    assert!(
        register.status.success(),
        "register must exit 0. stderr: {}",
        String::from_utf8_lossy(&register.stderr)
    );
    let stdout = String::from_utf8_lossy(&register.stdout);
    assert!(stdout.contains("minid:000001"), "stdout: {stdout}");

    let check = run_minid(&config_dir, &server.url, &["check", &file.to_string_lossy()]);
    assert!(check.status.success());
    let stdout = String::from_utf8_lossy(&check.stdout);
    assert!(stdout.contains("minid:000001"));
    assert!(stdout.contains("my data"));
}

#[test]
fn register_twice_dedupes() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let file = dir.path().join("data.bin");
    std::fs::write(&file, b"same content").unwrap();

    let args = ["register", &*file.to_string_lossy()];
    let first = run_minid(&config_dir, &server.url, &args);
    let second = run_minid(&config_dir, &server.url, &args);

    assert!(first.status.success() && second.status.success());
    let second_out = String::from_utf8_lossy(&second.stdout);
    assert!(
        second_out.contains("already registered"),
        "stdout: {second_out}"
    );
}

#[test]
fn batch_register_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        concat!(
            r#"{"filename": "a.txt", "sha256": "aaa111"}"#,
            "\n",
            r#"{"filename": "b.txt", "sha256": "bbb222"}"#,
            "\n",
        ),
    )
    .unwrap();

    let first = run_minid(
        &config_dir,
        &server.url,
        &["batch-register", &manifest.to_string_lossy()],
    );
    assert!(
        first.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    assert!(String::from_utf8_lossy(&first.stdout).contains("2 created, 0 matched, 0 failed"));

    let second = run_minid(
        &config_dir,
        &server.url,
        &["batch-register", &manifest.to_string_lossy()],
    );
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("0 created, 2 matched, 0 failed"));
}

#[test]
fn malformed_manifest_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let manifest = dir.path().join("broken.json");
    std::fs::write(
        &manifest,
        concat!(
            r#"{"filename": "a.txt", "sha256": "aaa111"}"#,
            "\n",
            "{not json\n",
        ),
    )
    .unwrap();

    let output = run_minid(
        &config_dir,
        &server.url,
        &["batch-register", &manifest.to_string_lossy()],
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("manifest"), "stderr: {stderr}");
}

#[test]
fn logout_when_not_logged_in_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().join("data"));
    let config_dir = dir.path().join("config");

    let output = run_minid(&config_dir, &server.url, &["logout"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No user logged in, no logout necessary."));
}

#[test]
fn update_replaces_title() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let file = dir.path().join("data.bin");
    std::fs::write(&file, b"update me").unwrap();

    let register = run_minid(
        &config_dir,
        &server.url,
        &["register", &file.to_string_lossy()],
    );
    assert!(register.status.success());

    let update = run_minid(
        &config_dir,
        &server.url,
        &["update", "minid:000001", "--title", "new title"],
    );
    assert!(
        update.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&update.stderr)
    );
    assert!(String::from_utf8_lossy(&update.stdout).contains("new title"));
}

#[test]
fn json_output_parses() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with_token(dir.path().join("data"), TEST_TOKEN);
    let config_dir = config_dir_with_login(dir.path());
    let file = dir.path().join("data.bin");
    std::fs::write(&file, b"json please").unwrap();

    let output = run_minid(
        &config_dir,
        &server.url,
        &["--json", "register", &file.to_string_lossy()],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find('{').expect("JSON object in stdout");
    let payload: serde_json::Value = serde_json::from_str(&stdout[json_start..]).unwrap();
    assert_eq!(payload["created"], serde_json::json!(true));
    assert_eq!(
        payload["record"]["identifier"],
        serde_json::json!("minid:000001")
    );
}

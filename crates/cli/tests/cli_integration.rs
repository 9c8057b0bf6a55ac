//! CLI integration tests for the `convenios` subcommands.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// SHA-256 of "secret".
const SECRET_DIGEST: &str = "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";

fn convenios() -> Command {
    let mut cmd = cargo_bin_cmd!("convenios");
    cmd.env_remove("CONVENIOS_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("convenios.toml");
    fs::write(&path, content).unwrap();
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    convenios()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Agreement submission and review service"));
}

#[test]
fn version_exits_0() {
    convenios()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("convenios"));
}

#[test]
fn unknown_subcommand_fails() {
    convenios().arg("frobnicate").assert().failure();
}

// ──────────────────────────────────────────────
// 2. hash-token
// ──────────────────────────────────────────────

#[test]
fn hash_token_prints_sha256_hex() {
    convenios()
        .args(["hash-token", "secret"])
        .assert()
        .success()
        .stdout(format!("{}\n", SECRET_DIGEST));
}

// ──────────────────────────────────────────────
// 3. check-config
// ──────────────────────────────────────────────

#[test]
fn check_config_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[server]
port = 9090

[[accounts]]
id = "admin-1"
token_sha256 = "{SECRET_DIGEST}"
role = "admin"
"#
        ),
    );
    convenios()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 account(s), 0 agreement type(s)"))
        .stdout(predicate::str::contains("no admin").not());
}

#[test]
fn check_config_warns_without_admin() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            "[[accounts]]\nid = \"u1\"\ntoken_sha256 = \"{SECRET_DIGEST}\"\n"
        ),
    );
    convenios()
        .env("CONVENIOS_CONFIG", &path)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("warning: no admin account configured"));
}

#[test]
fn check_config_reports_every_problem() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[notifications]
webhook_url = "ftp://example.edu"

[[accounts]]
id = "a"
token_sha256 = "short"
"#,
    );
    convenios()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("token_sha256 must be 64 hex characters"))
        .stderr(predicate::str::contains("must be an http(s) URL"));
}

#[test]
fn check_config_rejects_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[server]\nhost = \"0.0.0.0\"\n");
    convenios()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse configuration"));
}

#[test]
fn check_config_without_file_fails() {
    convenios()
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no configuration file given"));
}

#[test]
fn missing_config_file_fails() {
    convenios()
        .args(["--config", "/nonexistent/convenios.toml", "check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

// ──────────────────────────────────────────────
// 4. serve argument validation
// ──────────────────────────────────────────────

#[test]
fn serve_requires_both_tls_flags() {
    convenios()
        .args(["serve", "--tls-cert", "cert.pem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tls-cert and --tls-key must both be provided"));
}

// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{fs, path::Path};

use assert_cmd::Command;
use crypto::rsa::RSAKeyPair;
use secret::{BulkSecret, EncryptedData, Secret};
use serde_json::{json, Value};
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("secret-cli").expect("secret-cli is built");
    cmd.env_remove("VAULT_ADDR")
        .env_remove("VAULT_TOKEN")
        .env("ENC_KEY_PATH", dir.join("keys"));
    cmd
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("keys")).unwrap();
    fs::write(dir.path().join("keys").join("testing"), [7u8; 32]).unwrap();
    dir
}

fn run(dir: &Path, subcommand: &str, input: &Value, bulk: bool) -> Value {
    let file = dir.join(format!("{subcommand}.json"));
    fs::write(&file, input.to_string()).unwrap();

    let mut cmd = cli(dir);
    cmd.arg(subcommand).arg("--file").arg(&file);
    if bulk {
        cmd.arg("--bulk");
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

#[test]
fn encrypt_with_none_backend() {
    let dir = workspace();
    let output = run(
        dir.path(),
        "encrypt",
        &json!({"backend": "none", "keyName": "testing", "clearText": "hello"}),
        false,
    );

    assert_eq!(output["cipherText"], "aGVsbG8=");
    assert!(output.get("clearText").is_none());
}

#[test]
fn encrypt_then_rewrap() {
    let dir = workspace();
    let encrypted = run(
        dir.path(),
        "encrypt",
        &json!({"backend": "localkey", "keyName": "testing", "clearText": "top secret"}),
        false,
    );
    assert!(!encrypted.to_string().contains("top secret"));

    let recipient = RSAKeyPair::new().unwrap();
    let mut secret: Secret = serde_json::from_value(encrypted).unwrap();
    secret.rewrap_key = recipient.public_key_pem().unwrap();

    let rewrapped = run(
        dir.path(),
        "rewrap",
        &serde_json::to_value(&secret).unwrap(),
        false,
    );
    let rewrapped: Secret = serde_json::from_value(rewrapped).unwrap();
    assert!(rewrapped.cipher_text.is_empty());
    assert_eq!(rewrapped.encryption_algorithm, "aes256-gcm96");

    let payload = EncryptedData::from_base64(&rewrapped.rewrap_text).unwrap();
    assert_eq!(payload.open(&recipient).unwrap().as_slice(), b"top secret");
}

#[test]
fn bulk_rewrap_reports_failing_secret() {
    let dir = workspace();
    let encrypted = run(
        dir.path(),
        "encrypt",
        &json!({"data": [
            {"backend": "localkey", "keyName": "testing", "clearText": "first"},
            {"backend": "localkey", "keyName": "testing", "clearText": "second"},
            {"backend": "none", "keyName": "testing", "clearText": "third"},
        ]}),
        true,
    );

    let mut bulk: BulkSecret = serde_json::from_value(encrypted).unwrap();
    assert_eq!(bulk.data.len(), 3);
    bulk.data[1].signature = bulk.data[0].signature.clone();
    bulk.rewrap_key = RSAKeyPair::new().unwrap().public_key_pem().unwrap();

    let file = dir.path().join("rewrap.json");
    fs::write(&file, serde_json::to_vec(&bulk).unwrap()).unwrap();
    let stderr = cli(dir.path())
        .args(["rewrap", "--bulk", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&stderr).contains("secret 1 of the batch failed"));
}

#[test]
fn unconfigured_backend_fails() {
    let dir = workspace();
    let file = dir.path().join("secret.json");
    fs::write(
        &file,
        json!({"backend": "vault", "keyName": "testing", "clearText": "hello"}).to_string(),
    )
    .unwrap();

    let stderr = cli(dir.path())
        .args(["encrypt", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&stderr).contains("Backend not configured: vault"));
}

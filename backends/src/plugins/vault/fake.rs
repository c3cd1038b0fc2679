// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! In-memory stand-in for a Vault server with a Transit engine mounted.
//!
//! Ciphertexts are `vault:v1:<key>:<plaintext>` so that decrypting with
//! another key fails, and HMACs are SHA-256 digests salted with the key name.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::logical::{LogicalClient, SecretAuth, VaultSecret};
use crate::{Error, Result};

pub struct FakeLogical {
    renewable: bool,
    ttl: u64,
    storage_dir: Option<String>,
    renewals: Mutex<VecDeque<Result<VaultSecret>>>,
    renew_calls: AtomicUsize,
    random: AtomicU64,
    stored: Mutex<HashMap<String, Map<String, Value>>>,
    writes: Mutex<Vec<String>>,
}

fn response(data: Value) -> Option<VaultSecret> {
    let Value::Object(data) = data else {
        return None;
    };
    Some(VaultSecret {
        data: Some(data),
        ..Default::default()
    })
}

fn field<'a>(data: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    data.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::RemoteBackend(format!("missing `{name}`")))
}

fn hmac(key: &str, input: &str) -> String {
    format!(
        "vault:v1:{}",
        hex::encode(Sha256::digest(format!("{key}:{input}")))
    )
}

impl Default for FakeLogical {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLogical {
    pub fn new() -> Self {
        Self {
            renewable: true,
            ttl: 3600,
            storage_dir: None,
            renewals: Mutex::new(VecDeque::new()),
            renew_calls: AtomicUsize::new(0),
            random: AtomicU64::new(1),
            stored: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn non_renewable(mut self) -> Self {
        self.renewable = false;
        self
    }

    pub fn with_storage_dir(mut self, dir: &str) -> Self {
        self.storage_dir = Some(dir.to_owned());
        self
    }

    pub fn with_renewals(self, renewals: Vec<Result<VaultSecret>>) -> Self {
        *self.renewals.lock().unwrap() = renewals.into();
        self
    }

    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().keys().cloned().collect()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogicalClient for FakeLogical {
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<Option<VaultSecret>> {
        self.writes.lock().unwrap().push(path.to_owned());

        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["auth", "token", "lookup"] => {
                field(&data, "token")?;
                let meta = self
                    .storage_dir
                    .as_ref()
                    .map(|dir| json!({ "storage_dir": dir }));
                Ok(response(json!({
                    "renewable": self.renewable,
                    "ttl": self.ttl,
                    "meta": meta,
                })))
            }
            [_, "encrypt", "silent"] => Ok(Some(VaultSecret::default())),
            [_, "encrypt", key] => {
                let plaintext = field(&data, "plaintext")?;
                Ok(response(
                    json!({ "ciphertext": format!("vault:v1:{key}:{plaintext}") }),
                ))
            }
            [_, "decrypt", key] => {
                let ciphertext = field(&data, "ciphertext")?;
                let plaintext = ciphertext
                    .strip_prefix(&format!("vault:v1:{key}:"))
                    .ok_or_else(|| {
                        Error::RemoteBackend("cipher: message authentication failed".into())
                    })?;
                Ok(response(json!({ "plaintext": plaintext })))
            }
            [_, "random", "8"] => {
                let n = self.random.fetch_add(1, Ordering::SeqCst);
                Ok(response(
                    json!({ "random_bytes": STANDARD.encode(n.to_be_bytes()) }),
                ))
            }
            [_, "hmac", key] => {
                let input = field(&data, "input")?;
                Ok(response(json!({ "hmac": hmac(key, input) })))
            }
            [_, "verify", key, "sha2-256"] => {
                let input = field(&data, "input")?;
                let valid = field(&data, "hmac")? == hmac(key, input);
                Ok(response(json!({ "valid": valid })))
            }
            _ => {
                self.stored.lock().unwrap().insert(path.to_owned(), data);
                Ok(None)
            }
        }
    }

    async fn read(&self, path: &str) -> Result<Option<VaultSecret>> {
        let stored = self.stored.lock().unwrap().get(path).cloned();
        Ok(stored.and_then(|data| response(Value::Object(data))))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.stored.lock().unwrap().remove(path);
        Ok(())
    }

    async fn renew_self(&self, _increment: Duration) -> Result<VaultSecret> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.renewals.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(VaultSecret {
                auth: Some(SecretAuth {
                    lease_duration: self.ttl,
                    renewable: true,
                }),
                ..Default::default()
            })
        })
    }
}

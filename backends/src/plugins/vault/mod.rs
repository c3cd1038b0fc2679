// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Vault Transit backend
//!
//! Encryption, decryption and HMAC signing are delegated to a [Transit]
//! engine, so no key material ever enters this process. The session is
//! authenticated with a renewable token that a [`LeaseRenewer`] keeps alive.
//!
//! When the token's metadata carries a `storage_dir`, each Transit ciphertext
//! is stored in Vault under `<storage_dir>/v1-secrets/<sha256 of ciphertext>`
//! and that path is what callers get back.
//!
//! [Transit]: https://developer.hashicorp.com/vault/docs/secrets/transit

pub mod logical;
pub mod renewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    utils::{normalize_base64, validate_key_name},
    BackendConfig, EncryptorClient, Error, Result,
};

pub use logical::{HttpLogicalClient, LogicalClient, SecretAuth, VaultSecret};
pub use renewer::LeaseRenewer;

const TOKEN_LOOKUP_PATH: &str = "auth/token/lookup";

const STORAGE_SUBDIR: &str = "v1-secrets";

/// Prefix of every Transit ciphertext.
const TRANSIT_CIPHERTEXT_PREFIX: &str = "vault:";

const HMAC_ALGORITHM: &str = "sha2-256";

const RANDOM_NONCE_BYTES: usize = 8;

#[derive(Deserialize)]
struct TokenLookup {
    #[serde(default)]
    renewable: bool,

    #[serde(default)]
    ttl: u64,

    #[serde(default)]
    meta: Option<HashMap<String, String>>,
}

fn fields<const N: usize>(entries: [(&str, &str); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_owned(), json!(v)))
        .collect()
}

pub struct VaultClient {
    logical: Arc<dyn LogicalClient>,
    transit_mount: String,
    storage_dir: Option<String>,
    renewer: LeaseRenewer,
}

impl VaultClient {
    /// Open a session with the Vault named in `config`.
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let (Some(url), Some(token)) = (&config.vault_url, &config.vault_token) else {
            return Err(Error::BackendNotConfigured("vault".into()));
        };

        let logical = HttpLogicalClient::new(
            url,
            token,
            Duration::from_secs(config.vault_timeout_secs),
        )?;
        Self::new(Arc::new(logical), token, &config.vault_transit_mount).await
    }

    /// Look up `token` and start renewing it. A token that cannot be renewed
    /// is a configuration error.
    pub async fn new(
        logical: Arc<dyn LogicalClient>,
        token: &str,
        transit_mount: &str,
    ) -> Result<Self> {
        let lookup = Self::lookup_token(logical.as_ref(), token)
            .await
            .inspect_err(|e| error!("vault token lookup failed: {e}"))?;

        if !lookup.renewable {
            error!("vault token is not renewable, refusing to start the vault backend");
            return Err(Error::Configuration("vault token is not renewable".into()));
        }

        let storage_dir = lookup
            .meta
            .and_then(|mut meta| meta.remove("storage_dir"))
            .map(|dir| dir.trim_matches('/').to_owned())
            .filter(|dir| !dir.is_empty());
        match &storage_dir {
            Some(dir) => info!("vault ciphertexts are stored under `{dir}`"),
            None => info!("vault ciphertexts are returned inline"),
        }

        let renewer = LeaseRenewer::start(logical.clone(), Duration::from_secs(lookup.ttl));

        Ok(Self {
            logical,
            transit_mount: transit_mount.trim_matches('/').to_owned(),
            storage_dir,
            renewer,
        })
    }

    async fn lookup_token(logical: &dyn LogicalClient, token: &str) -> Result<TokenLookup> {
        let mut secret = logical
            .write(TOKEN_LOOKUP_PATH, fields([("token", token)]))
            .await?
            .ok_or_else(|| Error::RemoteBackend("empty token lookup response".into()))?;
        let data = secret
            .data
            .take()
            .ok_or_else(|| Error::RemoteBackend("token lookup response has no data".into()))?;

        serde_json::from_value(Value::Object(data))
            .map_err(|e| Error::RemoteBackend(format!("illegal token lookup response: {e}")))
    }

    pub fn storage_dir(&self) -> Option<&str> {
        self.storage_dir.as_deref()
    }

    pub fn renewer(&self) -> &LeaseRenewer {
        &self.renewer
    }

    pub async fn shutdown(&self) {
        self.renewer.shutdown().await;
    }

    fn transit_path(&self, operation: &str, key_name: &str) -> Result<String> {
        validate_key_name(key_name)?;
        Ok(format!("{}/{operation}/{key_name}", self.transit_mount))
    }

    async fn transit(
        &self,
        path: &str,
        data: Map<String, Value>,
        field: &str,
        failure: &str,
    ) -> Result<String> {
        self.logical
            .write(path, data)
            .await?
            .and_then(|mut secret| secret.take_str(field))
            .ok_or_else(|| Error::RemoteBackend(failure.to_owned()))
    }

    /// Check that `locator` names an entry of the storage directory.
    fn storage_locator<'a>(&self, dir: &str, locator: &'a str) -> Result<&'a str> {
        let name = locator
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_prefix(STORAGE_SUBDIR))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                Error::MalformedEnvelope(
                    "ciphertext locator is outside the storage directory".into(),
                )
            })?;

        validate_key_name(name)
            .map_err(|_| Error::MalformedEnvelope("illegal ciphertext locator".into()))?;
        Ok(locator)
    }

    async fn store_ciphertext(&self, dir: &str, ciphertext: &str) -> Result<String> {
        let digest = hex::encode(Sha256::digest(ciphertext.as_bytes()));
        let locator = format!("{dir}/{STORAGE_SUBDIR}/{digest}");
        self.logical
            .write(&locator, fields([("cipherText", ciphertext)]))
            .await?;
        debug!("stored vault ciphertext at `{locator}`");
        Ok(locator)
    }

    async fn resolve_ciphertext(&self, handle: &str) -> Result<String> {
        let Some(dir) = &self.storage_dir else {
            return Ok(handle.to_owned());
        };

        // Written before storage was enabled for this token.
        if handle.starts_with(TRANSIT_CIPHERTEXT_PREFIX) {
            return Ok(handle.to_owned());
        }

        let locator = self.storage_locator(dir, handle)?;
        self.logical
            .read(locator)
            .await?
            .and_then(|mut secret| secret.take_str("cipherText"))
            .ok_or_else(|| Error::NotFound(format!("no ciphertext stored at `{locator}`")))
    }
}

#[async_trait]
impl EncryptorClient for VaultClient {
    async fn get_encrypted_text(&self, key_name: &str, clear_text: &str) -> Result<String> {
        let path = self.transit_path("encrypt", key_name)?;
        let plaintext = normalize_base64(clear_text);
        let ciphertext = self
            .transit(
                &path,
                fields([("plaintext", plaintext.as_str())]),
                "ciphertext",
                "could not encrypt cleartext",
            )
            .await?;

        match &self.storage_dir {
            Some(dir) => self.store_ciphertext(dir, &ciphertext).await,
            None => Ok(ciphertext),
        }
    }

    /// Transit only keeps the base64 form of what was encrypted, so a clear
    /// text that was already base64 of UTF-8 text comes back decoded. For
    /// `YWJjZA==` that is `abcd`, which itself reads as base64 and so no
    /// longer normalises to the form the secret was signed over. Rewrapping
    /// such a secret fails with a signature mismatch.
    async fn get_clear_text(
        &self,
        key_name: &str,
        cipher_text: &str,
    ) -> Result<Zeroizing<String>> {
        let path = self.transit_path("decrypt", key_name)?;
        let ciphertext = self.resolve_ciphertext(cipher_text).await?;
        let plaintext = Zeroizing::new(
            self.transit(
                &path,
                fields([("ciphertext", ciphertext.as_str())]),
                "plaintext",
                "could not decrypt ciphertext",
            )
            .await?,
        );

        let bytes = Zeroizing::new(STANDARD.decode(plaintext.as_str()).map_err(|_| {
            Error::MalformedEnvelope("vault returned a plaintext that is not base64".into())
        })?);
        match std::str::from_utf8(&bytes) {
            Ok(text) => Ok(Zeroizing::new(text.to_owned())),
            Err(_) => Ok(plaintext),
        }
    }

    async fn sign(&self, key_name: &str, clear_text: &str) -> Result<String> {
        let path = self.transit_path("hmac", key_name)?;
        let nonce = self
            .transit(
                &format!("{}/random/{RANDOM_NONCE_BYTES}", self.transit_mount),
                Map::new(),
                "random_bytes",
                "could not generate signature nonce",
            )
            .await?;

        let input = normalize_base64(&format!("{nonce}:{clear_text}"));
        let hmac = self
            .transit(
                &path,
                fields([("algorithm", HMAC_ALGORITHM), ("input", input.as_str())]),
                "hmac",
                "could not sign cleartext",
            )
            .await?;

        Ok(format!("{nonce}:{hmac}"))
    }

    async fn verify_signature(
        &self,
        key_name: &str,
        signature: &str,
        message: &str,
    ) -> Result<bool> {
        let path = format!(
            "{}/{HMAC_ALGORITHM}",
            self.transit_path("verify", key_name)?
        );
        let (nonce, hmac) = signature
            .split_once(':')
            .filter(|(nonce, hmac)| !nonce.is_empty() && !hmac.is_empty())
            .ok_or_else(|| Error::MalformedSignature("missing signature nonce".into()))?;

        let input = normalize_base64(&format!("{nonce}:{message}"));
        let valid = self
            .logical
            .write(&path, fields([("input", input.as_str()), ("hmac", hmac)]))
            .await?
            .and_then(|secret| secret.data?.get("valid")?.as_bool())
            .ok_or_else(|| Error::RemoteBackend("could not verify signature".into()))?;

        Ok(valid)
    }

    async fn delete(&self, _key_name: &str, cipher_text: &str) -> Result<()> {
        let Some(dir) = &self.storage_dir else {
            return Ok(());
        };
        if cipher_text.starts_with(TRANSIT_CIPHERTEXT_PREFIX) {
            return Ok(());
        }

        let locator = self.storage_locator(dir, cipher_text)?;
        if self.logical.read(locator).await?.is_none() {
            return Err(Error::NotFound(format!("no ciphertext stored at `{locator}`")));
        }

        self.logical.delete(locator).await?;
        debug!("deleted vault ciphertext at `{locator}`");
        Ok(())
    }
}

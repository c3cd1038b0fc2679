// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! The `localkey` backend: AES-256-GCM envelopes and HMAC signatures under
//! keys read from the local file system.

pub mod key;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use crypto::{signing, Envelope};
use log::debug;
use zeroize::Zeroizing;

use crate::{EncryptorClient, Error, Result};

pub use key::{KeyFile, KeySource};

pub struct LocalKeyClient {
    keys: Arc<dyn KeySource>,
}

impl LocalKeyClient {
    /// Build a client over the key file or key directory at `key_path`.
    pub async fn new(key_path: &Path) -> Result<Self> {
        let keys = KeyFile::new(key_path).await?;
        Ok(Self::with_key_source(Arc::new(keys)))
    }

    pub fn with_key_source(keys: Arc<dyn KeySource>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl EncryptorClient for LocalKeyClient {
    async fn get_encrypted_text(&self, key_name: &str, clear_text: &str) -> Result<String> {
        let key = self.keys.key(key_name).await?;
        let envelope = Envelope::seal(&key, clear_text.as_bytes()).map_err(|e| {
            debug!("seal with key `{key_name}` failed: {e}");
            Error::Crypto("could not encrypt cleartext".into())
        })?;

        envelope
            .to_json()
            .map_err(|e| Error::Crypto(format!("serialize envelope failed: {e}")))
    }

    async fn get_clear_text(
        &self,
        key_name: &str,
        cipher_text: &str,
    ) -> Result<Zeroizing<String>> {
        let envelope =
            Envelope::from_json(cipher_text).map_err(|e| Error::MalformedEnvelope(format!("{e:#}")))?;
        let key = self.keys.key(key_name).await?;

        let plaintext = envelope.open(&key).map_err(|e| {
            debug!("open envelope with key `{key_name}` failed: {e}");
            Error::DecryptFailure
        })?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| Error::DecryptFailure)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    async fn sign(&self, key_name: &str, clear_text: &str) -> Result<String> {
        let key = self.keys.key(key_name).await?;
        signing::sign(key.as_bytes(), clear_text.as_bytes())
            .map_err(|e| Error::Crypto(format!("sign failed: {e}")))
    }

    async fn verify_signature(
        &self,
        key_name: &str,
        signature: &str,
        message: &str,
    ) -> Result<bool> {
        let key = self.keys.key(key_name).await?;
        signing::verify(key.as_bytes(), signature, message.as_bytes())
            .map_err(|e| Error::MalformedSignature(e.to_string()))
    }

    // Envelopes are handed back to the caller, nothing is stored.
    async fn delete(&self, _key_name: &str, _cipher_text: &str) -> Result<()> {
        Ok(())
    }
}

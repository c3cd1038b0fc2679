// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

pub mod bulk;
pub mod envelope;

use std::{fmt, mem};

use backends::{utils::normalize_base64, Backends, EncryptorClient};
use crypto::{rsa::RecipientKey, rsa::RSA_OAEP_HASH_ALGORITHM, AesKey};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub use bulk::BulkSecret;
use envelope::{EncryptedData, REWRAP_ENCRYPTION_ALGORITHM};

use crate::{Result, SecretError};

/// A secret as exchanged with callers.
#[derive(Serialize, Deserialize, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    /// Name of the encryption backend, one of `none`, `localkey` or `vault`.
    pub backend: String,

    pub key_name: String,

    /// Only set on input to [`Secret::encrypt`].
    #[serde(skip_serializing_if = "String::is_empty")]
    pub clear_text: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub cipher_text: String,

    /// Base64 of the JSON [`EncryptedData`] produced by [`Secret::rewrap`].
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rewrap_text: String,

    /// PEM encoded RSA public key of the rewrap recipient.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rewrap_key: String,

    pub signature: String,

    pub hash_algorithm: String,

    pub encryption_algorithm: String,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("backend", &self.backend)
            .field("key_name", &self.key_name)
            .field(
                "clear_text",
                &(!self.clear_text.is_empty()).then_some("<redacted>"),
            )
            .field("cipher_text", &self.cipher_text)
            .field("rewrap_text", &self.rewrap_text)
            .field("rewrap_key", &self.rewrap_key)
            .field("signature", &self.signature)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("encryption_algorithm", &self.encryption_algorithm)
            .finish()
    }
}

impl Secret {
    pub(crate) fn take_clear_text(&mut self) -> Zeroizing<String> {
        Zeroizing::new(mem::take(&mut self.clear_text))
    }

    /// Encrypt and sign the clear text. The backend gets the clear text as
    /// is while the signature covers its base64 form.
    pub async fn encrypt(&mut self, backends: &Backends) -> Result<()> {
        let clear_text = self.take_clear_text();
        let backend = backends.select(&self.backend)?;
        let normalized = normalize_base64(&clear_text);

        let cipher_text = backend
            .get_encrypted_text(&self.key_name, &clear_text)
            .await
            .inspect_err(|e| error!("encrypt with key `{}` failed: {e}", self.key_name))?;

        let signature = match backend.sign(&self.key_name, &normalized).await {
            Ok(signature) => signature,
            Err(e) => {
                error!("sign with key `{}` failed: {e}", self.key_name);
                if let Err(e) = backend.delete(&self.key_name, &cipher_text).await {
                    warn!("discard ciphertext of unsigned secret failed: {e}");
                }
                return Err(e.into());
            }
        };

        self.cipher_text = cipher_text;
        self.signature = signature;
        debug!("encrypted secret with key `{}`", self.key_name);
        Ok(())
    }

    /// Re-encrypt the secret for the holder of `rewrapKey` under a fresh
    /// data key.
    pub async fn rewrap(&mut self, backends: &Backends) -> Result<()> {
        self.rewrap_with(backends, &AesKey::generate()).await
    }

    /// Rewrap with the given data key. The clear text, ciphertext and rewrap
    /// key are gone afterwards whether or not the rewrap succeeds.
    pub(crate) async fn rewrap_with(&mut self, backends: &Backends, dek: &AesKey) -> Result<()> {
        let _clear_text = self.take_clear_text();
        let cipher_text = mem::take(&mut self.cipher_text);
        let rewrap_key = mem::take(&mut self.rewrap_key);

        let recipient = RecipientKey::from_pem(&rewrap_key).map_err(|e| {
            debug!("parse rewrap key failed: {e:#}");
            SecretError::InvalidRewrapKey("expect a PEM encoded RSA public key".into())
        })?;
        let backend = backends.select(&self.backend)?;

        let plaintext = backend
            .get_clear_text(&self.key_name, &cipher_text)
            .await
            .inspect_err(|e| error!("decrypt with key `{}` failed: {e}", self.key_name))?;
        let normalized = normalize_base64(&plaintext);

        match backend
            .verify_signature(&self.key_name, &self.signature, &normalized)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("signature of secret under key `{}` does not match", self.key_name);
                return Err(SecretError::SignatureMismatch);
            }
            Err(e) => {
                warn!("verify signature under key `{}` failed: {e}", self.key_name);
                return Err(SecretError::SignatureMismatch);
            }
        }

        let payload = EncryptedData::seal(&recipient, dek, plaintext.as_bytes())?;
        self.rewrap_text = payload.to_base64()?;
        self.encryption_algorithm = REWRAP_ENCRYPTION_ALGORITHM.into();
        self.hash_algorithm = RSA_OAEP_HASH_ALGORITHM.into();
        debug!("rewrapped secret under key `{}`", self.key_name);
        Ok(())
    }

    /// Drop whatever the backend keeps for the ciphertext.
    pub async fn delete(&mut self, backends: &Backends) -> Result<()> {
        let _clear_text = self.take_clear_text();
        let backend = backends.select(&self.backend)?;
        backend.delete(&self.key_name, &self.cipher_text).await?;
        Ok(())
    }
}

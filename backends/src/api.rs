// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Api definitions for encryption backends
//!
//! Every backend exposes the same capability set, [`EncryptorClient`]. The
//! caller hands over clear text and gets back an opaque string. What that
//! string is depends on the backend:
//! - `none`: the base64 of the clear text. For tests only.
//! - `localkey`: a JSON AES-GCM envelope sealed with a key read from disk.
//! - `vault`: a Vault Transit ciphertext, or the Vault path it was stored
//!   under when the token carries a storage directory.
//!
//! Clear text returned by [`EncryptorClient::get_clear_text`] is wrapped in
//! [`Zeroizing`] so that it is wiped once the caller drops it.

use crate::Result;

use async_trait::async_trait;
use zeroize::Zeroizing;

#[async_trait]
pub trait EncryptorClient: Send + Sync {
    /// Encrypt `clear_text` with the key named `key_name` and return the
    /// opaque ciphertext handle.
    async fn get_encrypted_text(&self, key_name: &str, clear_text: &str) -> Result<String>;

    /// Reverse [`EncryptorClient::get_encrypted_text`]. Authentication
    /// failures never return partial data.
    async fn get_clear_text(&self, key_name: &str, cipher_text: &str)
        -> Result<Zeroizing<String>>;

    /// Sign `clear_text` with the key named `key_name`. Genuine backends
    /// return a fresh signature on every call.
    async fn sign(&self, key_name: &str, clear_text: &str) -> Result<String>;

    /// Check `signature` against `message`. A well formed signature that
    /// does not match is `Ok(false)`; one that cannot be parsed is an error.
    async fn verify_signature(&self, key_name: &str, signature: &str, message: &str)
        -> Result<bool>;

    /// Remove whatever the backend persisted for `cipher_text`. A no-op for
    /// backends that never persist.
    async fn delete(&self, key_name: &str, cipher_text: &str) -> Result<()>;
}

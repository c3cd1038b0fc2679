// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! APIs for symmetric keys

use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use zeroize::Zeroizing;

use crate::{rand::random_bytes, rust::aes256gcm};

pub const AES_256_GCM_KEY_LENGTH: usize = 32;

pub const AES_256_GCM_NONCE_LENGTH: usize = 12;

/// Algorithm tag written into every [`Envelope`].
pub const AES_256_GCM_ALGORITHM: &str = "aes256-gcm";

/// Raw AES-256 key material. The bytes are wiped when the key is dropped
/// and never show up in `Debug` output.
#[derive(Clone)]
pub struct AesKey(Zeroizing<Vec<u8>>);

impl AesKey {
    /// Generate a fresh random key, e.g. the ephemeral key of a rewrap.
    pub fn generate() -> Self {
        Self(Zeroizing::new(random_bytes::<AES_256_GCM_KEY_LENGTH>()))
    }

    pub fn from_bytes(bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        if bytes.len() != AES_256_GCM_KEY_LENGTH {
            bail!(
                "an aes-256 key must be {AES_256_GCM_KEY_LENGTH} bytes, got {}",
                bytes.len()
            );
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// An Envelope is the self-describing serialized form of an AES-GCM
/// ciphertext. On the wire it is a JSON object
///
/// `{"IV": base64, "Algorithm": "aes256-gcm", "CipherText": base64}`
///
/// Historical payloads name the nonce `Nonce` instead of `IV`. Both are
/// accepted on deserialization and normalized into [`Envelope::nonce`];
/// serialization always writes `IV`.
#[serde_as]
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(try_from = "WireEnvelope")]
pub struct Envelope {
    #[serde(rename = "IV")]
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,

    #[serde(rename = "Algorithm")]
    pub algorithm: String,

    #[serde(rename = "CipherText")]
    #[serde_as(as = "Base64")]
    pub cipher_text: Vec<u8>,
}

#[serde_as]
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "IV")]
    #[serde_as(as = "Option<Base64>")]
    iv: Option<Vec<u8>>,

    #[serde(rename = "Nonce")]
    #[serde_as(as = "Option<Base64>")]
    nonce: Option<Vec<u8>>,

    #[serde(rename = "Algorithm", default)]
    algorithm: String,

    #[serde(rename = "CipherText")]
    #[serde_as(as = "Base64")]
    cipher_text: Vec<u8>,
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = anyhow::Error;

    fn try_from(wire: WireEnvelope) -> Result<Self> {
        let nonce = [wire.iv, wire.nonce]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .ok_or_else(|| anyhow!("envelope carries neither `IV` nor `Nonce`"))?;

        if nonce.len() != AES_256_GCM_NONCE_LENGTH {
            bail!(
                "envelope nonce must be {AES_256_GCM_NONCE_LENGTH} bytes, got {}",
                nonce.len()
            );
        }

        // Envelopes written before the tag existed are aes256-gcm as well.
        let algorithm = match wire.algorithm.as_str() {
            "" | AES_256_GCM_ALGORITHM => AES_256_GCM_ALGORITHM.to_string(),
            others => bail!("unsupported envelope algorithm {others}"),
        };

        Ok(Self {
            nonce,
            algorithm,
            cipher_text: wire.cipher_text,
        })
    }
}

impl Envelope {
    /// Seal `plaintext` under `key` with a freshly generated nonce and no
    /// additional authenticated data.
    pub fn seal(key: &AesKey, plaintext: &[u8]) -> Result<Self> {
        let nonce = random_bytes::<AES_256_GCM_NONCE_LENGTH>();
        let cipher_text = aes256gcm::encrypt(key.as_bytes(), plaintext, &nonce)?;

        Ok(Self {
            nonce,
            algorithm: AES_256_GCM_ALGORITHM.to_string(),
            cipher_text,
        })
    }

    /// Open the envelope. A wrong key and tampered data fail the same way.
    pub fn open(&self, key: &AesKey) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext = aes256gcm::decrypt(key.as_bytes(), &self.cipher_text, &self.nonce)?;
        Ok(Zeroizing::new(plaintext))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize envelope")
    }

    pub fn from_json(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).context("parse envelope")
    }
}

// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use base64::{engine::general_purpose::STANDARD, Engine};
use crypto::{
    rsa::{RSAKeyPair, RecipientKey, RSA_OAEP_ALGORITHM, RSA_OAEP_HASH_ALGORITHM},
    signing, AesKey, Envelope,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{Result, SecretError};

/// Algorithm tag of a rewrapped secret.
pub const REWRAP_ENCRYPTION_ALGORITHM: &str = "aes256-gcm96";

/// The data key of an [`EncryptedData`], encrypted for the recipient.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedKey {
    pub encryption_algorithm: String,

    /// RSA-OAEP ciphertext of the data key, base64 encoded.
    pub encrypted_text: String,

    pub hash_algorithm: String,
}

/// A secret rewrapped for a recipient by the digital envelope mechanism
///
/// {Enc(recipient RSA key, DEK), Enc(DEK, secret), HMAC(DEK, Enc(DEK, secret))}
///
/// where DEK is an ephemeral AES-256 key. A `rewrapText` is the base64 of its
/// JSON form.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedData {
    pub encryption_algorithm: String,

    /// AES-GCM envelope of the secret, as JSON.
    pub encrypted_text: String,

    pub hash_algorithm: String,

    pub encrypted_key: EncryptedKey,

    /// HMAC signature of `encrypted_text` under the DEK.
    pub signature: String,
}

impl EncryptedData {
    /// Seal `plaintext` under `dek` and wrap `dek` for `recipient`.
    pub fn seal(recipient: &RecipientKey, dek: &AesKey, plaintext: &[u8]) -> Result<Self> {
        let envelope = Envelope::seal(dek, plaintext)
            .map_err(|e| SecretError::RewrapFailed(format!("seal secret failed: {e}")))?;
        let encrypted_text = envelope
            .to_json()
            .map_err(|e| SecretError::RewrapFailed(format!("{e}")))?;

        let signature = signing::sign(dek.as_bytes(), encrypted_text.as_bytes())
            .map_err(|e| SecretError::RewrapFailed(format!("sign envelope failed: {e}")))?;

        let wrapped_key = recipient
            .encrypt(dek.as_bytes())
            .map_err(|e| SecretError::RewrapFailed(format!("wrap data key failed: {e}")))?;

        Ok(Self {
            encryption_algorithm: REWRAP_ENCRYPTION_ALGORITHM.into(),
            encrypted_text,
            hash_algorithm: String::new(),
            encrypted_key: EncryptedKey {
                encryption_algorithm: RSA_OAEP_ALGORITHM.into(),
                encrypted_text: STANDARD.encode(wrapped_key),
                hash_algorithm: RSA_OAEP_HASH_ALGORITHM.into(),
            },
            signature,
        })
    }

    /// Recover the secret with the recipient's private key. The signature
    /// is checked before anything is decrypted.
    pub fn open(&self, keypair: &RSAKeyPair) -> Result<Zeroizing<Vec<u8>>> {
        let wrapped_key = STANDARD
            .decode(&self.encrypted_key.encrypted_text)
            .map_err(|_| SecretError::ParseFailed("base64 decode encrypted key"))?;
        let dek = keypair
            .decrypt(&wrapped_key)
            .map_err(|e| SecretError::RewrapFailed(format!("unwrap data key failed: {e}")))?;
        let dek = AesKey::from_bytes(dek)
            .map_err(|e| SecretError::RewrapFailed(format!("illegal data key: {e}")))?;

        let valid = signing::verify(dek.as_bytes(), &self.signature, self.encrypted_text.as_bytes())
            .map_err(|_| SecretError::SignatureMismatch)?;
        if !valid {
            return Err(SecretError::SignatureMismatch);
        }

        let envelope = Envelope::from_json(&self.encrypted_text)
            .map_err(|_| SecretError::ParseFailed("malformed rewrapped envelope"))?;
        envelope
            .open(&dek)
            .map_err(|_| SecretError::RewrapFailed("decrypt rewrapped secret failed".into()))
    }

    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|_| SecretError::ParseFailed("JSON serialization failed"))?;
        Ok(STANDARD.encode(json))
    }

    pub fn from_base64(rewrap_text: &str) -> Result<Self> {
        let json = STANDARD
            .decode(rewrap_text)
            .map_err(|_| SecretError::ParseFailed("base64 decode rewrap text"))?;
        serde_json::from_slice(&json).map_err(|_| {
            SecretError::ParseFailed("malformed rewrap text (json deserialization failed)")
        })
    }
}

// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Passthrough backend. "Encryption" is base64 and the signature is a plain
//! SHA-256 digest, so it provides neither secrecy nor integrity.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{EncryptorClient, Error, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct NoneClient;

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[async_trait]
impl EncryptorClient for NoneClient {
    async fn get_encrypted_text(&self, _key_name: &str, clear_text: &str) -> Result<String> {
        Ok(STANDARD.encode(clear_text))
    }

    async fn get_clear_text(
        &self,
        _key_name: &str,
        cipher_text: &str,
    ) -> Result<Zeroizing<String>> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(cipher_text)
                .map_err(|e| Error::MalformedEnvelope(format!("not base64: {e}")))?,
        );
        let text = std::str::from_utf8(&bytes).map_err(|_| Error::DecryptFailure)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    async fn sign(&self, _key_name: &str, clear_text: &str) -> Result<String> {
        Ok(digest(clear_text))
    }

    async fn verify_signature(
        &self,
        _key_name: &str,
        signature: &str,
        message: &str,
    ) -> Result<bool> {
        Ok(signature == digest(message))
    }

    async fn delete(&self, _key_name: &str, _cipher_text: &str) -> Result<()> {
        Ok(())
    }
}

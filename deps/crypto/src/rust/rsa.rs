// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! RSA-OAEP-SHA256 for carrying an ephemeral key to a rewrap recipient.

use anyhow::*;
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey},
    pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding},
    rand_core::OsRng,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::asymmetric::rsa::RSA_PUBKEY_LENGTH;

/// Public key of a rewrap recipient.
#[derive(Debug, Clone)]
pub struct RecipientKey {
    public_key: RsaPublicKey,
}

impl RecipientKey {
    /// Parse a PEM encoded public key, either `PUBLIC KEY` (SPKI) or
    /// `RSA PUBLIC KEY` (PKCS#1).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| anyhow!("could not decode public key block: {e}"))?;

        Ok(Self { public_key })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| anyhow!("RSA key encrypt OAEP failed: {:?}", e))
    }
}

#[derive(Clone)]
pub struct RSAKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl RSAKeyPair {
    pub fn new() -> Result<RSAKeyPair> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_PUBKEY_LENGTH)?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(RSAKeyPair {
            private_key,
            public_key,
        })
    }

    pub fn decrypt(&self, cipher_text: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.private_key
            .decrypt(Oaep::new::<Sha256>(), cipher_text)
            .map(Zeroizing::new)
            .map_err(|e| anyhow!("RSA key decrypt OAEP failed: {:?}", e))
    }

    pub fn public_key_pem(&self) -> Result<String> {
        let res = self.public_key.to_public_key_pem(LineEnding::LF)?;
        Ok(res)
    }

    pub fn recipient(&self) -> RecipientKey {
        RecipientKey {
            public_key: self.public_key.clone(),
        }
    }

    pub fn to_pkcs1_pem(&self) -> Result<Zeroizing<String>> {
        let res = self.private_key.to_pkcs1_pem(LineEnding::default())?;
        Ok(res)
    }

    pub fn from_pkcs1_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            private_key,
            public_key,
        })
    }
}

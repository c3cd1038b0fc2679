// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! This mod implements aes-256-gcm encryption & decryption without
//! additional authenticated data.
use aes_gcm::{aead::Aead, Aes256Gcm, Key, KeyInit, Nonce};
use anyhow::*;

use crate::{AES_256_GCM_KEY_LENGTH, AES_256_GCM_NONCE_LENGTH};

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != AES_256_GCM_KEY_LENGTH {
        bail!(
            "aes-256-gcm key must be {AES_256_GCM_KEY_LENGTH} bytes, got {}",
            key.len()
        );
    }

    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
}

fn nonce(iv: &[u8]) -> Result<&Nonce<aes_gcm::aead::consts::U12>> {
    if iv.len() != AES_256_GCM_NONCE_LENGTH {
        bail!(
            "aes-256-gcm nonce must be {AES_256_GCM_NONCE_LENGTH} bytes, got {}",
            iv.len()
        );
    }

    Ok(Nonce::from_slice(iv))
}

pub fn decrypt(key: &[u8], encrypted_data: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let plain_text = cipher
        .decrypt(nonce(iv)?, encrypted_data)
        .map_err(|e| anyhow!("aes-256-gcm decrypt failed: {:?}", e))?;

    Ok(plain_text)
}

pub fn encrypt(key: &[u8], data: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let ciphertext = cipher
        .encrypt(nonce(iv)?, data)
        .map_err(|e| anyhow!("aes-256-gcm encrypt failed: {:?}", e))?;

    Ok(ciphertext)
}

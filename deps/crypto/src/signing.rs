// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Nonce-salted HMAC-SHA256 signatures.
//!
//! A signature is `base64(nonce || ":" || HMAC(key, nonce || ":" || message))`
//! where `nonce` is 12 random bytes drawn per call. Signing the same message
//! twice therefore never yields the same signature, and the verifier learns
//! the nonce from the signature itself.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::rand::random_bytes;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_NONCE_LENGTH: usize = 12;

const SEPARATOR: u8 = b':';

const MAC_LENGTH: usize = 32;

fn keyed_mac(key: &[u8], nonce: &[u8], message: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow!("initialize hmac-sha256 failed: {e}"))?;
    mac.update(nonce);
    mac.update(&[SEPARATOR]);
    mac.update(message);
    Ok(mac)
}

/// Sign `message` under `key` with a fresh nonce.
pub fn sign(key: &[u8], message: &[u8]) -> Result<String> {
    let mut signature = random_bytes::<SIGNATURE_NONCE_LENGTH>();
    let tag = keyed_mac(key, &signature, message)?.finalize().into_bytes();

    signature.push(SEPARATOR);
    signature.extend_from_slice(&tag);
    Ok(STANDARD.encode(signature))
}

/// Verify a signature produced by [`sign`]. Returns `Ok(false)` when the
/// signature is well formed but does not match, and an error when it cannot
/// be parsed at all.
pub fn verify(key: &[u8], signature: &str, message: &[u8]) -> Result<bool> {
    let raw = STANDARD
        .decode(signature)
        .context("signature is not valid base64")?;

    // The nonce is random bytes and may itself contain ':', so split by
    // position rather than by searching for the separator.
    if raw.len() != SIGNATURE_NONCE_LENGTH + 1 + MAC_LENGTH {
        bail!("invalid signature length {}", raw.len());
    }
    let (nonce, rest) = raw.split_at(SIGNATURE_NONCE_LENGTH);
    if rest[0] != SEPARATOR {
        bail!("invalid signature input");
    }

    Ok(keyed_mac(key, nonce, message)?
        .verify_slice(&rest[1..])
        .is_ok())
}

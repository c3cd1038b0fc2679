// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the encryption backends. None of the messages carry key
/// material, key file paths or Vault tokens; details of that kind are logged
/// where the error originates.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Unknown encryption backend: {0}")]
    UnknownBackend(String),

    #[error("Backend not configured: {0}")]
    BackendNotConfigured(String),

    #[error("Could not resolve encryption key: {0}")]
    KeyResolution(String),

    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    #[error("Could not decrypt ciphertext")]
    DecryptFailure,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Remote backend error: {0}")]
    RemoteBackend(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

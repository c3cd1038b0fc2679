// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecretError>;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error(transparent)]
    Backend(#[from] backends::Error),

    #[error("signature does not match the secret")]
    SignatureMismatch,

    #[error("invalid rewrap key: {0}")]
    InvalidRewrapKey(String),

    #[error("rewrap failed: {0}")]
    RewrapFailed(String),

    #[error("secret {index} of the batch failed: {source}")]
    BulkElement {
        index: usize,
        source: Box<SecretError>,
    },

    #[error("parse secret failed: {0}")]
    ParseFailed(&'static str),
}

impl SecretError {
    pub(crate) fn at(self, index: usize) -> Self {
        SecretError::BulkElement {
            index,
            source: Box::new(self),
        }
    }
}

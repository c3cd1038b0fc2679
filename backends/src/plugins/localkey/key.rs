// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Resolution of key names to AES key material for the `localkey` backend.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use crypto::AesKey;
use log::{debug, error};
use tokio::{fs, sync::RwLock};
use zeroize::Zeroizing;

use crate::{utils::validate_key_name, Error, Result};

#[async_trait]
pub trait KeySource: Send + Sync {
    /// Resolve `key_name` to its key material.
    async fn key(&self, key_name: &str) -> Result<AesKey>;
}

/// A fixed key serves every key name.
#[async_trait]
impl KeySource for AesKey {
    async fn key(&self, _key_name: &str) -> Result<AesKey> {
        Ok(self.clone())
    }
}

/// Keys read from the file system. The configured path is either a single
/// key file used for every key name, or a directory holding one file per
/// key name.
///
/// Resolved keys are cached by file path for the lifetime of the process.
/// A key changed on disk is not picked up until restart.
pub struct KeyFile {
    path: PathBuf,
    is_dir: bool,
    cache: RwLock<HashMap<PathBuf, AesKey>>,
}

impl KeyFile {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).await.map_err(|e| {
            error!("encryption key path {} is not accessible: {e}", path.display());
            Error::KeyResolution("encryption key path is not accessible".into())
        })?;

        Ok(Self {
            is_dir: metadata.is_dir(),
            path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn key_path(&self, key_name: &str) -> Result<PathBuf> {
        if !self.is_dir {
            return Ok(self.path.clone());
        }

        validate_key_name(key_name)?;
        Ok(self.path.join(key_name))
    }

    async fn read_key(path: &Path, key_name: &str) -> Result<AesKey> {
        let bytes = Zeroizing::new(fs::read(path).await.map_err(|e| {
            error!("read key file {} failed: {e}", path.display());
            Error::KeyResolution(format!("no key found for `{key_name}`"))
        })?);

        AesKey::from_bytes(bytes).map_err(|e| {
            error!("key file {} is unusable: {e}", path.display());
            Error::KeyResolution(format!("key `{key_name}` is not a valid aes-256 key"))
        })
    }
}

#[async_trait]
impl KeySource for KeyFile {
    async fn key(&self, key_name: &str) -> Result<AesKey> {
        let path = self.key_path(key_name)?;
        if let Some(key) = self.cache.read().await.get(&path) {
            return Ok(key.clone());
        }

        let key = Self::read_key(&path, key_name).await?;
        debug!("loaded encryption key `{key_name}`");

        let mut cache = self.cache.write().await;
        Ok(cache.entry(path).or_insert(key).clone())
    }
}

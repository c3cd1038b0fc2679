// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use strum::{AsRefStr, EnumString};
use zeroize::Zeroizing;

use crate::{BackendConfig, EncryptorClient, Error, Result};

pub mod localkey;
pub mod none;
pub mod vault;

use localkey::LocalKeyClient;
use none::NoneClient;
use vault::VaultClient;

/// Names accepted in the `backend` field of a secret.
#[derive(AsRefStr, EnumString, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    #[strum(serialize = "none")]
    None,

    #[strum(serialize = "localkey")]
    LocalKey,

    #[strum(serialize = "vault")]
    Vault,
}

/// A configured backend.
#[derive(Clone)]
pub enum Backend {
    None(NoneClient),
    LocalKey(Arc<LocalKeyClient>),
    Vault(Arc<VaultClient>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::None(_) => BackendKind::None,
            Backend::LocalKey(_) => BackendKind::LocalKey,
            Backend::Vault(_) => BackendKind::Vault,
        }
    }

    fn client(&self) -> &dyn EncryptorClient {
        match self {
            Backend::None(client) => client,
            Backend::LocalKey(client) => client.as_ref(),
            Backend::Vault(client) => client.as_ref(),
        }
    }
}

#[async_trait]
impl EncryptorClient for Backend {
    async fn get_encrypted_text(&self, key_name: &str, clear_text: &str) -> Result<String> {
        self.client().get_encrypted_text(key_name, clear_text).await
    }

    async fn get_clear_text(
        &self,
        key_name: &str,
        cipher_text: &str,
    ) -> Result<Zeroizing<String>> {
        self.client().get_clear_text(key_name, cipher_text).await
    }

    async fn sign(&self, key_name: &str, clear_text: &str) -> Result<String> {
        self.client().sign(key_name, clear_text).await
    }

    async fn verify_signature(
        &self,
        key_name: &str,
        signature: &str,
        message: &str,
    ) -> Result<bool> {
        self.client()
            .verify_signature(key_name, signature, message)
            .await
    }

    async fn delete(&self, key_name: &str, cipher_text: &str) -> Result<()> {
        self.client().delete(key_name, cipher_text).await
    }
}

/// The set of backends built from a [`BackendConfig`] at startup. It is
/// cheap to clone and meant to be shared by every request.
#[derive(Clone, Default)]
pub struct Backends {
    local_key: Option<Arc<LocalKeyClient>>,
    vault: Option<Arc<VaultClient>>,
}

impl Backends {
    pub fn new(local_key: Option<LocalKeyClient>, vault: Option<VaultClient>) -> Self {
        Self {
            local_key: local_key.map(Arc::new),
            vault: vault.map(Arc::new),
        }
    }

    /// Build every backend `config` has settings for. Any failure is fatal.
    pub async fn from_config(config: &BackendConfig) -> Result<Self> {
        config.validate()?;

        let local_key = match &config.encryption_key_path {
            Some(path) => Some(LocalKeyClient::new(path).await?),
            None => None,
        };

        let vault = if config.vault_configured() {
            Some(VaultClient::connect(config).await?)
        } else {
            None
        };

        info!(
            "backends ready: none{}{}",
            if local_key.is_some() { ", localkey" } else { "" },
            if vault.is_some() { ", vault" } else { "" },
        );
        Ok(Self::new(local_key, vault))
    }

    /// Look up the backend called `name`.
    pub fn select(&self, name: &str) -> Result<Backend> {
        let kind = BackendKind::try_from(name)
            .map_err(|_| Error::UnknownBackend(name.to_string()))?;

        let not_configured = || Error::BackendNotConfigured(kind.as_ref().to_string());
        match kind {
            BackendKind::None => Ok(Backend::None(NoneClient)),
            BackendKind::LocalKey => self
                .local_key
                .clone()
                .map(Backend::LocalKey)
                .ok_or_else(not_configured),
            BackendKind::Vault => self
                .vault
                .clone()
                .map(Backend::Vault)
                .ok_or_else(not_configured),
        }
    }

    /// Stop background work of the Vault session, if any.
    pub async fn shutdown(&self) {
        if let Some(vault) = &self.vault {
            vault.shutdown().await;
        }
    }
}

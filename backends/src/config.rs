// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{fmt, path::PathBuf};

use config::{Config, Environment, File};
use log::info;
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

pub const DEFAULT_TRANSIT_MOUNT: &str = "transit";

pub const DEFAULT_VAULT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "SECRETS";

/// Credentials and locations of the encryption backends. A backend whose
/// fields are absent is simply not built; selecting it later fails with
/// [`Error::BackendNotConfigured`].
#[derive(Clone, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Key file, or directory of per-key-name files, of the `localkey` backend.
    #[serde(default)]
    pub encryption_key_path: Option<PathBuf>,

    #[serde(default)]
    pub vault_url: Option<String>,

    #[serde(default)]
    pub vault_token: Option<String>,

    /// Mount path of the Transit secrets engine.
    #[serde(default = "default_transit_mount")]
    pub vault_transit_mount: String,

    /// Timeout of a single Vault HTTP request.
    #[serde(default = "default_vault_timeout_secs")]
    pub vault_timeout_secs: u64,
}

fn default_transit_mount() -> String {
    DEFAULT_TRANSIT_MOUNT.to_string()
}

fn default_vault_timeout_secs() -> u64 {
    DEFAULT_VAULT_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            encryption_key_path: None,
            vault_url: None,
            vault_token: None,
            vault_transit_mount: default_transit_mount(),
            vault_timeout_secs: default_vault_timeout_secs(),
        }
    }
}

// The token must never reach a log line.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("encryption_key_path", &self.encryption_key_path)
            .field("vault_url", &self.vault_url)
            .field("vault_token", &self.vault_token.as_ref().map(|_| "<redacted>"))
            .field("vault_transit_mount", &self.vault_transit_mount)
            .field("vault_timeout_secs", &self.vault_timeout_secs)
            .finish()
    }
}

impl BackendConfig {
    /// Load `BackendConfig` from a configuration file. Supported formats are all
    /// formats supported by the `config` crate. Environment variables prefixed
    /// with `SECRETS_` (e.g. `SECRETS_VAULT_URL`) override the file.
    pub fn from_file(config_path: &str) -> Result<Self> {
        info!("Use configuration file {config_path}");
        let c = Config::builder()
            .set_default("vault_transit_mount", DEFAULT_TRANSIT_MOUNT)
            .and_then(|b| b.set_default("vault_timeout_secs", DEFAULT_VAULT_TIMEOUT_SECS))
            .map_err(|e| Error::Configuration(format!("set config defaults failed: {e}")))?
            .add_source(File::with_name(config_path))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(|e| Error::Configuration(format!("read config failed: {e}")))?;

        let config: Self = c
            .try_deserialize()
            .map_err(|e| Error::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether both Vault fields are set.
    pub fn vault_configured(&self) -> bool {
        self.vault_url.is_some() && self.vault_token.is_some()
    }

    /// Reject configurations that could never produce a working backend.
    pub fn validate(&self) -> Result<()> {
        match (&self.vault_url, &self.vault_token) {
            (Some(_), None) => {
                return Err(Error::Configuration(
                    "vault url is set but the vault token is missing".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::Configuration(
                    "vault token is set but the vault url is missing".into(),
                ))
            }
            (Some(url), Some(_)) => {
                Url::parse(url).map_err(|e| {
                    Error::Configuration(format!("illegal vault url `{url}`: {e}"))
                })?;
            }
            (None, None) => {}
        }

        if self.vault_transit_mount.trim_matches('/').is_empty() {
            return Err(Error::Configuration(
                "vault transit mount path must not be empty".into(),
            ));
        }

        if self.vault_timeout_secs == 0 {
            return Err(Error::Configuration(
                "vault request timeout must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf};

    use rstest::rstest;
    use serial_test::serial;

    use super::BackendConfig;

    #[rstest]
    #[case(
        r#"
encryption_key_path = "/etc/secrets-api/key"
vault_url = "http://127.0.0.1:8200"
vault_token = "s.abcdef"
vault_transit_mount = "encryption"
vault_timeout_secs = 5
    "#,
        Some(BackendConfig {
            encryption_key_path: Some(PathBuf::from("/etc/secrets-api/key")),
            vault_url: Some("http://127.0.0.1:8200".into()),
            vault_token: Some("s.abcdef".into()),
            vault_transit_mount: "encryption".into(),
            vault_timeout_secs: 5,
        })
    )]
    #[case(
        r#"
encryption_key_path = "/etc/secrets-api/keys"
    "#,
        Some(BackendConfig {
            encryption_key_path: Some(PathBuf::from("/etc/secrets-api/keys")),
            ..Default::default()
        })
    )]
    #[case(
        r#"
vault_url = "http://127.0.0.1:8200"
    "#,
        None
    )]
    #[case(
        r#"
vault_token = "s.abcdef"
    "#,
        None
    )]
    #[case(
        r#"
vault_url = "not a url"
vault_token = "s.abcdef"
    "#,
        None
    )]
    #[case(
        r#"
vault_transit_mount = "/"
    "#,
        None
    )]
    #[serial]
    fn read_config(#[case] content: &str, #[case] expected: Option<BackendConfig>) {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create config file");
        file.write_all(content.as_bytes()).unwrap();

        let config = BackendConfig::from_file(file.path().to_str().unwrap());
        match expected {
            Some(expected) => assert_eq!(config.expect("config must parse"), expected),
            None => assert!(config.is_err()),
        }
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create config file");
        file.write_all(b"vault_transit_mount = \"transit\"\n").unwrap();

        std::env::set_var("SECRETS_VAULT_TRANSIT_MOUNT", "from-env");
        let config = BackendConfig::from_file(file.path().to_str().unwrap());
        std::env::remove_var("SECRETS_VAULT_TRANSIT_MOUNT");

        assert_eq!(config.unwrap().vault_transit_mount, "from-env");
    }

    #[test]
    fn debug_redacts_token() {
        let config = BackendConfig {
            vault_url: Some("http://127.0.0.1:8200".into()),
            vault_token: Some("s.very-secret".into()),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("s.very-secret"));
        assert!(printed.contains("<redacted>"));
    }
}

// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::debug;
use secret::{BackendConfig, Backends, BulkSecret, Secret};
use tokio::fs;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "secret-cli")]
#[command(bin_name = "secret-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file of the encryption backends
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Key file, or directory of key files, of the `localkey` backend
    #[arg(long, env = "ENC_KEY_PATH", global = true)]
    enc_key_path: Option<PathBuf>,

    /// Address of the Vault server
    #[arg(long, env = "VAULT_ADDR", global = true)]
    vault_url: Option<String>,

    /// Renewable Vault token
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true, global = true)]
    vault_token: Option<String>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt and sign the clear text of the given secret(s)
    Encrypt(SecretArgs),

    /// Rewrap the given secret(s) for the holder of `rewrapKey`
    Rewrap(SecretArgs),

    /// Delete what the backend stores for the given secret(s)
    Delete(SecretArgs),
}

#[derive(Args)]
struct SecretArgs {
    /// path of the JSON file holding the secret
    #[arg(short, long)]
    file: PathBuf,

    /// The file holds a batch of secrets
    #[arg(short, long)]
    bulk: bool,
}

impl Cli {
    fn backend_config(&self) -> Result<BackendConfig> {
        let mut config = match &self.config {
            Some(path) => BackendConfig::from_file(path)?,
            None => BackendConfig::default(),
        };

        if let Some(path) = &self.enc_key_path {
            config.encryption_key_path = Some(path.clone());
        }
        if let Some(url) = &self.vault_url {
            config.vault_url = Some(url.clone());
        }
        if let Some(token) = &self.vault_token {
            config.vault_token = Some(token.clone());
        }

        config.validate()?;
        debug!("backend configuration: {config:?}");
        Ok(config)
    }
}

async fn run(command: &Command, backends: &Backends) -> Result<String> {
    let (args, name) = match command {
        Command::Encrypt(args) => (args, "encrypt"),
        Command::Rewrap(args) => (args, "rewrap"),
        Command::Delete(args) => (args, "delete"),
    };

    let input = Zeroizing::new(
        fs::read(&args.file)
            .await
            .with_context(|| format!("read {}", args.file.display()))?,
    );

    let output = if args.bulk {
        let mut bulk: BulkSecret =
            serde_json::from_slice(&input).context("illegal bulk secret")?;
        match command {
            Command::Encrypt(_) => bulk.encrypt(backends).await,
            Command::Rewrap(_) => bulk.rewrap(backends).await,
            Command::Delete(_) => bulk.delete(backends).await,
        }
        .with_context(|| format!("{name} bulk secret failed"))?;
        serde_json::to_string_pretty(&bulk)?
    } else {
        let mut secret: Secret = serde_json::from_slice(&input).context("illegal secret")?;
        match command {
            Command::Encrypt(_) => secret.encrypt(backends).await,
            Command::Rewrap(_) => secret.rewrap(backends).await,
            Command::Delete(_) => secret.delete(backends).await,
        }
        .with_context(|| format!("{name} secret failed"))?;
        serde_json::to_string_pretty(&secret)?
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let config = cli.backend_config()?;
    let backends = Backends::from_config(&config)
        .await
        .context("initialize encryption backends")?;

    let res = run(&cli.command, &backends).await;
    backends.shutdown().await;

    println!("{}", res?);
    Ok(())
}

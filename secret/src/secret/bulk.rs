// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use backends::{Backends, EncryptorClient};
use crypto::AesKey;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::Secret;
use crate::{Result, SecretError};

/// An ordered batch of secrets.
///
/// Operations stop at the first secret that fails and leave the batch as it
/// was, except that clear text is removed from every secret either way.
#[derive(Serialize, Deserialize, PartialEq, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkSecret {
    pub data: Vec<Secret>,

    /// Recipient key shared by every secret of a rewrap.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rewrap_key: String,
}

impl BulkSecret {
    /// Move the secrets into a working copy, leaving only scrubbed originals
    /// behind.
    fn working_copy(&mut self) -> Vec<Secret> {
        let working = self.data.clone();
        for secret in &mut self.data {
            secret.clear_text.zeroize();
        }
        working
    }

    fn commit(&mut self, mut working: Vec<Secret>, res: Result<()>) -> Result<()> {
        match res {
            Ok(()) => {
                self.data = working;
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                for secret in &mut working {
                    secret.clear_text.zeroize();
                }
                Err(e)
            }
        }
    }

    /// Drop the ciphertexts the backends already keep for `encrypted`.
    async fn discard(backends: &Backends, encrypted: &[Secret]) {
        for secret in encrypted {
            let res = match backends.select(&secret.backend) {
                Ok(backend) => backend.delete(&secret.key_name, &secret.cipher_text).await,
                Err(e) => Err(e),
            };
            if let Err(e) = res {
                warn!(
                    "discard ciphertext of secret under key `{}` failed: {e}",
                    secret.key_name
                );
            }
        }
    }

    /// Encrypt every secret. When one fails, what the secrets before it
    /// stored in their backends is deleted again.
    pub async fn encrypt(&mut self, backends: &Backends) -> Result<()> {
        let mut working = self.working_copy();
        let mut res = Ok(());
        for (index, secret) in working.iter_mut().enumerate() {
            if let Err(e) = secret.encrypt(backends).await {
                res = Err(e.at(index));
                break;
            }
        }

        if let Err(SecretError::BulkElement { index, .. }) = &res {
            Self::discard(backends, &working[..*index]).await;
        }
        self.commit(working, res)
    }

    /// Rewrap every secret for `rewrapKey`. All secrets of the batch share
    /// one freshly generated data key.
    pub async fn rewrap(&mut self, backends: &Backends) -> Result<()> {
        let dek = AesKey::generate();
        let mut working = self.working_copy();
        let mut res = Ok(());
        for (index, secret) in working.iter_mut().enumerate() {
            secret.rewrap_key.clone_from(&self.rewrap_key);
            if let Err(e) = secret.rewrap_with(backends, &dek).await {
                res = Err(e.at(index));
                break;
            }
        }

        self.commit(working, res)?;
        self.rewrap_key.clear();
        Ok(())
    }

    pub async fn delete(&mut self, backends: &Backends) -> Result<()> {
        let mut working = self.working_copy();
        let mut res = Ok(());
        for (index, secret) in working.iter_mut().enumerate() {
            if let Err(e) = secret.delete(backends).await {
                res = Err(e.at(index));
                break;
            }
        }

        self.commit(working, res)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use backends::plugins::vault::fake::FakeLogical;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use crypto::rsa::RSAKeyPair;
    use rstest::{fixture, rstest};

    use super::BulkSecret;
    use crate::{
        secret::tests::{backends, secret, vault_backends},
        EncryptedData, SecretError,
    };

    #[fixture]
    #[once]
    fn recipient() -> RSAKeyPair {
        RSAKeyPair::new().expect("generate rsa key")
    }

    fn batch(backends: &[&str]) -> BulkSecret {
        BulkSecret {
            data: backends
                .iter()
                .enumerate()
                .map(|(i, backend)| secret(backend, &format!("secret number {i}")))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn encrypt_all() {
        let backends = backends();
        let mut bulk = batch(&["localkey", "none", "localkey"]);
        bulk.encrypt(&backends).await.unwrap();

        for secret in &bulk.data {
            assert!(secret.clear_text.is_empty());
            assert!(!secret.cipher_text.is_empty());
            assert!(!secret.signature.is_empty());
        }
    }

    #[tokio::test]
    async fn encrypt_fails_fast() {
        let backends = backends();
        let mut bulk = batch(&["localkey", "none", "vault"]);
        let mut expected = bulk.clone();
        for secret in &mut expected.data {
            secret.clear_text.clear();
        }

        let err = bulk.encrypt(&backends).await.unwrap_err();
        assert!(matches!(
            err,
            SecretError::BulkElement { index: 2, ref source }
                if matches!(**source, SecretError::Backend(backends::Error::BackendNotConfigured(_)))
        ));
        assert_eq!(bulk, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn rewrap_all_with_one_data_key(recipient: &RSAKeyPair) {
        let backends = backends();
        let mut bulk = batch(&["localkey", "localkey", "localkey"]);
        bulk.encrypt(&backends).await.unwrap();

        bulk.rewrap_key = recipient.public_key_pem().unwrap();
        bulk.rewrap(&backends).await.unwrap();
        assert!(bulk.rewrap_key.is_empty());

        let mut data_keys = HashSet::new();
        for (i, secret) in bulk.data.iter().enumerate() {
            assert!(secret.cipher_text.is_empty());
            assert!(secret.rewrap_key.is_empty());

            let payload = EncryptedData::from_base64(&secret.rewrap_text).unwrap();
            let clear_text = payload.open(recipient).unwrap();
            assert_eq!(format!("secret number {i}").as_bytes(), clear_text.as_slice());
            let wrapped_key = STANDARD
                .decode(&payload.encrypted_key.encrypted_text)
                .unwrap();
            data_keys.insert(recipient.decrypt(&wrapped_key).unwrap().to_vec());
        }
        assert_eq!(data_keys.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn rewrap_stops_at_bad_signature(recipient: &RSAKeyPair) {
        let backends = backends();
        let mut bulk = batch(&["localkey", "localkey", "localkey"]);
        bulk.encrypt(&backends).await.unwrap();
        bulk.data[1].signature = bulk.data[0].signature.clone();
        bulk.rewrap_key = recipient.public_key_pem().unwrap();
        let before = bulk.clone();

        let err = bulk.rewrap(&backends).await.unwrap_err();
        assert!(matches!(
            err,
            SecretError::BulkElement { index: 1, ref source }
                if matches!(**source, SecretError::SignatureMismatch)
        ));
        assert!(err.to_string().contains("secret 1 of the batch failed"));
        assert_eq!(bulk, before);
    }

    #[tokio::test]
    async fn failed_encrypt_discards_stored_ciphertexts() {
        let fake = Arc::new(FakeLogical::new().with_storage_dir("secret/app"));
        let backends = vault_backends(&fake).await;
        let mut bulk = batch(&["vault", "vault", "vault"]);
        bulk.data[2].key_name = "a/b".into();

        let err = bulk.encrypt(&backends).await.unwrap_err();
        assert!(matches!(
            err,
            SecretError::BulkElement { index: 2, ref source }
                if matches!(**source, SecretError::Backend(backends::Error::KeyResolution(_)))
        ));
        assert!(fake.stored().is_empty());
        assert!(bulk.data.iter().all(|secret| secret.cipher_text.is_empty()));
    }

    #[rstest]
    #[tokio::test]
    async fn vault_batch_lifecycle(recipient: &RSAKeyPair) {
        let fake = Arc::new(FakeLogical::new().with_storage_dir("secret/app"));
        let backends = vault_backends(&fake).await;

        let mut bulk = batch(&["vault", "vault"]);
        bulk.encrypt(&backends).await.unwrap();
        let mut locators: Vec<String> = bulk
            .data
            .iter()
            .map(|secret| secret.cipher_text.clone())
            .collect();
        locators.sort();
        let mut stored = fake.stored();
        stored.sort();
        assert_eq!(stored, locators);

        let mut doomed = bulk.clone();
        bulk.rewrap_key = recipient.public_key_pem().unwrap();
        bulk.rewrap(&backends).await.unwrap();
        for (i, secret) in bulk.data.iter().enumerate() {
            let payload = EncryptedData::from_base64(&secret.rewrap_text).unwrap();
            assert_eq!(
                payload.open(recipient).unwrap().as_slice(),
                format!("secret number {i}").as_bytes()
            );
        }

        doomed.delete(&backends).await.unwrap();
        assert!(fake.stored().is_empty());
    }

    #[tokio::test]
    async fn delete_all() {
        let backends = backends();
        let mut bulk = batch(&["localkey", "none"]);
        bulk.encrypt(&backends).await.unwrap();
        bulk.delete(&backends).await.unwrap();

        bulk.data.push(secret("aws", ""));
        assert!(matches!(
            bulk.delete(&backends).await,
            Err(SecretError::BulkElement { index: 2, .. })
        ));
    }
}

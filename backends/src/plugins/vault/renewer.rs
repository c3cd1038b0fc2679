// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{
    cmp,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::logical::LogicalClient;

const MIN_RENEW_INTERVAL: Duration = Duration::from_secs(1);

/// Background task keeping the Vault token alive.
///
/// The token is renewed after two thirds of its lease has elapsed. The task
/// ends on its own once Vault stops granting renewals or a renewal fails; it
/// does not try to obtain a new token. Dropping the renewer cancels the task.
pub struct LeaseRenewer {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LeaseRenewer {
    pub fn start(logical: Arc<dyn LogicalClient>, ttl: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(renew_loop(logical, ttl, cancel.clone()));
        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("lease renewer ended abnormally: {e}");
            }
        }
    }
}

impl Drop for LeaseRenewer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn renew_loop(logical: Arc<dyn LogicalClient>, mut ttl: Duration, cancel: CancellationToken) {
    loop {
        if ttl.is_zero() {
            info!("vault token does not expire, renewer returned");
            return;
        }

        let interval = cmp::max(ttl * 2 / 3, MIN_RENEW_INTERVAL);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("lease renewer cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let secret = match logical.renew_self(ttl).await {
            Ok(secret) => secret,
            Err(e) => {
                warn!("failed to renew vault token: {e}");
                warn!("renewer returned (maybe the lease expired)");
                return;
            }
        };

        for warning in secret.warnings.iter().flatten() {
            warn!("vault token renewal: {warning}");
        }

        match secret.auth {
            Some(auth) if auth.renewable => {
                debug!(
                    "successfully renewed vault token, lease {}s",
                    auth.lease_duration
                );
                ttl = Duration::from_secs(auth.lease_duration);
            }
            _ => {
                warn!("renewer returned (maybe the lease expired)");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::LeaseRenewer;
    use crate::{
        plugins::vault::{fake::FakeLogical, logical::{SecretAuth, VaultSecret}},
        Error,
    };

    fn renewal(lease_duration: u64, renewable: bool) -> crate::Result<VaultSecret> {
        Ok(VaultSecret {
            auth: Some(SecretAuth {
                lease_duration,
                renewable,
            }),
            warnings: Some(vec!["lease shortened".into()]),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn renews_until_vault_refuses() {
        let fake = Arc::new(
            FakeLogical::new().with_renewals(vec![renewal(30, true), renewal(0, false)]),
        );
        let renewer = LeaseRenewer::start(fake.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fake.renew_calls(), 0);
        assert!(renewer.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.renew_calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fake.renew_calls(), 2);
        assert!(!renewer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_error() {
        let fake = Arc::new(FakeLogical::new().with_renewals(vec![Err(Error::RemoteBackend(
            "permission denied".into(),
        ))]));
        let renewer = LeaseRenewer::start(fake.clone(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fake.renew_calls(), 1);
        assert!(!renewer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_renewal() {
        let fake = Arc::new(FakeLogical::new());
        let renewer = LeaseRenewer::start(fake.clone(), Duration::from_secs(300));
        assert!(renewer.is_running());

        renewer.shutdown().await;
        assert!(!renewer.is_running());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fake.renew_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_needs_no_renewal() {
        let fake = Arc::new(FakeLogical::new());
        let renewer = LeaseRenewer::start(fake.clone(), Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(!renewer.is_running());
        assert_eq!(fake.renew_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn short_lease_uses_minimum_interval() {
        let fake = Arc::new(FakeLogical::new().with_renewals(vec![renewal(0, false)]));
        let _renewer = LeaseRenewer::start(fake.clone(), Duration::from_millis(300));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(fake.renew_calls(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fake.renew_calls(), 1);
    }
}

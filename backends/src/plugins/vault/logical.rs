// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! The slice of the Vault HTTP API the `vault` backend needs: the generic
//! logical read/write/delete endpoints plus token self renewal.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    ClientBuilder, RequestBuilder, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::{Error, Result};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

const RENEW_SELF_PATH: &str = "auth/token/renew-self";

/// Lease information of an auth response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SecretAuth {
    #[serde(default)]
    pub lease_duration: u64,

    #[serde(default)]
    pub renewable: bool,
}

/// A Vault response body. Fields Vault leaves out are empty.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct VaultSecret {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,

    #[serde(default)]
    pub warnings: Option<Vec<String>>,

    #[serde(default)]
    pub auth: Option<SecretAuth>,

    #[serde(default)]
    pub lease_duration: u64,

    #[serde(default)]
    pub renewable: bool,
}

impl VaultSecret {
    /// Take the string field `name` out of `data`. Empty strings count as
    /// missing.
    pub fn take_str(&mut self, name: &str) -> Option<String> {
        match self.data.as_mut()?.remove(name)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

#[async_trait]
pub trait LogicalClient: Send + Sync {
    /// Write `data` to `path`. Endpoints that answer without a body give
    /// `None`.
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<Option<VaultSecret>>;

    /// Read `path`. A path holding nothing is `Ok(None)`.
    async fn read(&self, path: &str) -> Result<Option<VaultSecret>>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Renew the token this client authenticates with, asking for a new
    /// lease of `increment`.
    async fn renew_self(&self, increment: Duration) -> Result<VaultSecret>;
}

#[derive(Deserialize, Default)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

/// [`LogicalClient`] over Vault's HTTP API.
pub struct HttpLogicalClient {
    address: Url,
    http_client: reqwest::Client,
}

impl HttpLogicalClient {
    pub fn new(address: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut address = Url::parse(address)
            .map_err(|e| Error::Configuration(format!("illegal vault url `{address}`: {e}")))?;
        if !address.path().ends_with('/') {
            let path = format!("{}/", address.path());
            address.set_path(&path);
        }

        let mut token = HeaderValue::from_str(token)
            .map_err(|_| Error::Configuration("vault token is not a valid header value".into()))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(VAULT_TOKEN_HEADER, token);

        let http_client = ClientBuilder::new()
            .use_rustls_tls()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("build vault http client failed: {e}")))?;

        Ok(Self {
            address,
            http_client,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.address
            .join(&format!("v1/{}", path.trim_start_matches('/')))
            .map_err(|e| Error::RemoteBackend(format!("illegal vault path `{path}`: {e}")))
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        path: &str,
        missing_is_none: bool,
    ) -> Result<Option<VaultSecret>> {
        let response = request.send().await.map_err(|e| {
            error!("vault request to `{path}` failed: {e}");
            Error::RemoteBackend(format!("vault request to `{path}` failed"))
        })?;

        let status = response.status();
        debug!("vault answered {status} for `{path}`");
        if status == StatusCode::NOT_FOUND && missing_is_none {
            return Ok(None);
        }

        if !status.is_success() {
            let errors: VaultErrors = response.json().await.unwrap_or_default();
            return Err(Error::RemoteBackend(format!(
                "vault returned {status} for `{path}`: [{}]",
                errors.errors.join("; ")
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            Error::RemoteBackend(format!("read vault response for `{path}` failed: {e}"))
        })?;
        if body.is_empty() {
            return Ok(None);
        }

        let secret = serde_json::from_slice(&body).map_err(|e| {
            Error::RemoteBackend(format!("illegal vault response for `{path}`: {e}"))
        })?;
        Ok(Some(secret))
    }
}

#[async_trait]
impl LogicalClient for HttpLogicalClient {
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<Option<VaultSecret>> {
        let request = self.http_client.post(self.url(path)?).json(&data);
        self.execute(request, path, false).await
    }

    async fn read(&self, path: &str) -> Result<Option<VaultSecret>> {
        let request = self.http_client.get(self.url(path)?);
        self.execute(request, path, true).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.http_client.delete(self.url(path)?);
        self.execute(request, path, false).await?;
        Ok(())
    }

    async fn renew_self(&self, increment: Duration) -> Result<VaultSecret> {
        let mut data = Map::new();
        data.insert(
            "increment".into(),
            json!(format!("{}s", increment.as_secs())),
        );

        self.write(RENEW_SELF_PATH, data)
            .await?
            .ok_or_else(|| Error::RemoteBackend("empty token renewal response".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Map};
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{HttpLogicalClient, LogicalClient, SecretAuth};
    use crate::Error;

    const TOKEN: &str = "s.test-token";

    fn client(server: &MockServer) -> HttpLogicalClient {
        HttpLogicalClient::new(&server.uri(), TOKEN, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn write_posts_json_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/my-key"))
            .and(header("X-Vault-Token", TOKEN))
            .and(body_json(json!({"plaintext": "aGVsbG8="})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"ciphertext": "vault:v1:abc"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut data = Map::new();
        data.insert("plaintext".into(), json!("aGVsbG8="));
        let mut secret = client(&server)
            .write("transit/encrypt/my-key", data)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secret.take_str("ciphertext").as_deref(), Some("vault:v1:abc"));
        assert_eq!(secret.take_str("ciphertext"), None);
    }

    #[tokio::test]
    async fn read_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/app/v1-secrets/00"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;

        let res = client(&server).read("secret/app/v1-secrets/00").await.unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn error_status_carries_vault_errors_not_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .write("transit/encrypt/k", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteBackend(_)));
        let message = err.to_string();
        assert!(message.contains("permission denied"));
        assert!(message.contains("403"));
        assert!(!message.contains(TOKEN));
    }

    #[tokio::test]
    async fn delete_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/secret/app/v1-secrets/ff"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete("secret/app/v1-secrets/ff")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn renew_self_requests_increment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .and(body_json(json!({"increment": "90s"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "warnings": ["TTL of \"90s\" exceeded the effective max_ttl"],
                "auth": {"client_token": TOKEN, "lease_duration": 60, "renewable": true}
            })))
            .mount(&server)
            .await;

        let secret = client(&server)
            .renew_self(Duration::from_secs(90))
            .await
            .unwrap();
        assert_eq!(
            secret.auth,
            Some(SecretAuth {
                lease_duration: 60,
                renewable: true
            })
        );
        assert_eq!(secret.warnings.map(|w| w.len()), Some(1));
    }

    #[tokio::test]
    async fn address_with_path_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/v1/sys/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpLogicalClient::new(
            &format!("{}/proxy", server.uri()),
            TOKEN,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(client.read("sys/health").await.unwrap().is_some());
    }

    #[test]
    fn illegal_address() {
        let res = HttpLogicalClient::new("not a url", TOKEN, Duration::from_secs(5));
        assert!(matches!(res, Err(Error::Configuration(_))));
    }
}

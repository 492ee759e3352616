use std::time::Duration;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use crate::resource::{
    Account, ActiveSetting, ApiKey, ApiKeyRequest, Collection, LocalAuthConfig, Registry,
    RegistryCredentialRequest, RegistryRequest, Resource, Setting,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("code: {0}, body: {1}")]
    Deserialize(u16, String),
}

/// The calls needed to bootstrap a Rancher server, one per endpoint.
#[async_trait]
pub trait RancherApi: Send + Sync {
    /// `GET /v1/accounts`. An empty body decodes as an empty collection.
    async fn accounts(&self) -> Result<Collection<Account>, Error>;

    /// `POST /v1/projects/{env_id}/apikey`
    async fn create_api_key(&self, env_id: &str, request: ApiKeyRequest<'_>) -> Result<ApiKey, Error>;

    /// `GET /v1/settings/{name}`
    async fn setting(&self, name: &str) -> Result<Setting, Error>;

    /// `PUT <self_link>`
    async fn update_setting(&self, self_link: &str, setting: ActiveSetting<'_>) -> Result<(), Error>;

    /// `POST /v1/projects/{env_id}/registry`
    async fn create_registry(&self, env_id: &str, request: RegistryRequest<'_>) -> Result<Registry, Error>;

    /// `POST /v1/projects/{env_id}/registrycredential`
    async fn create_registry_credential(
        &self,
        env_id: &str,
        request: RegistryCredentialRequest<'_>,
    ) -> Result<(), Error>;

    /// `POST /v1/localauthconfig`
    async fn create_local_auth_config(&self, request: LocalAuthConfig<'_>) -> Result<(), Error>;
}

/// Externally reachable URL of a Rancher server given as `host[:port]`.
pub fn base_url(rancher_host: &str) -> String {
    format!("http://{rancher_host}")
}

/// JSON-over-HTTP implementation of [`RancherApi`].
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(rancher_host: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url(rancher_host),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn send(&self, method: Method, url: &str, body: Option<Resource<'_>>) -> Result<(StatusCode, Vec<u8>), Error> {
        debug!("{method} {url}");
        let mut request = self.client.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    async fn fetch<T: DeserializeOwned>(&self, method: Method, url: &str, body: Option<Resource<'_>>) -> Result<T, Error> {
        let (status, bytes) = self.send(method, url, body).await?;
        decode(status, &bytes)
    }

    /// Send a write whose response body is of no interest.
    /// Only transport failures are errors; a rejected status is logged.
    async fn submit(&self, method: Method, url: &str, body: Resource<'_>) -> Result<(), Error> {
        let (status, bytes) = self.send(method, url, Some(body)).await?;
        if !status.is_success() {
            warn!("{url} answered {status}: {}", String::from_utf8_lossy(&bytes));
        }
        Ok(())
    }
}

#[async_trait]
impl RancherApi for HttpClient {
    async fn accounts(&self) -> Result<Collection<Account>, Error> {
        let (status, bytes) = self.send(Method::GET, &self.url("accounts"), None).await?;
        decode_or_default(status, &bytes)
    }

    async fn create_api_key(&self, env_id: &str, request: ApiKeyRequest<'_>) -> Result<ApiKey, Error> {
        let url = self.url(&format!("projects/{env_id}/apikey"));
        self.fetch(Method::POST, &url, Some(Resource::ApiKey(request))).await
    }

    async fn setting(&self, name: &str) -> Result<Setting, Error> {
        self.fetch(Method::GET, &self.url(&format!("settings/{name}")), None).await
    }

    async fn update_setting(&self, self_link: &str, setting: ActiveSetting<'_>) -> Result<(), Error> {
        self.submit(Method::PUT, self_link, Resource::ActiveSetting(setting)).await
    }

    async fn create_registry(&self, env_id: &str, request: RegistryRequest<'_>) -> Result<Registry, Error> {
        let url = self.url(&format!("projects/{env_id}/registry"));
        self.fetch(Method::POST, &url, Some(Resource::Registry(request))).await
    }

    async fn create_registry_credential(
        &self,
        env_id: &str,
        request: RegistryCredentialRequest<'_>,
    ) -> Result<(), Error> {
        let url = self.url(&format!("projects/{env_id}/registrycredential"));
        self.submit(Method::POST, &url, Resource::RegistryCredential(request)).await
    }

    async fn create_local_auth_config(&self, request: LocalAuthConfig<'_>) -> Result<(), Error> {
        let url = self.url("localauthconfig");
        self.submit(Method::POST, &url, Resource::LocalAuthConfig(request)).await
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T, Error> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) => {
            let body = String::from_utf8_lossy(bytes);
            Err(Error::Deserialize(status.as_u16(), body.to_string()))
        }
    }
}

/// Like [`decode`], but a body ending before any JSON value is a default value.
fn decode_or_default<T: DeserializeOwned + Default>(status: StatusCode, bytes: &[u8]) -> Result<T, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        debug!("empty response body ({status}), nothing to decode");
        return Ok(T::default());
    }
    decode(status, bytes)
}

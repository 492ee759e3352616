//! First-time setup of a Rancher server.
//!
//! Steps run strictly in order, each feeding identifiers to the next:
//! discover the environment, issue an API key, point `api.host` at the server,
//! register the private registry, attach its credentials, enable local auth.
//! The first failing step aborts the run. Steps already applied are not rolled back.
use std::fmt::{Display, Formatter};
use std::io::Write;
use log::{info, warn};
use thiserror::Error;
use crate::client::{self, RancherApi};
use crate::config::runtime::Config;
use crate::discovery::{self, Sleeper};
use crate::resource::{
    AccessMode, ActiveSetting, ApiKeyRequest, LocalAuthConfig, RegistryCredentialRequest,
    RegistryRequest, API_HOST_SETTING,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("discover environment: {0}")]
    Discovery(#[from] discovery::Error),

    #[error("issue api key: {0}")]
    ApiKey(client::Error),

    #[error("read api.host setting: {0}")]
    ApiHost(client::Error),

    #[error("register docker registry: {0}")]
    Registry(client::Error),

    #[error("attach docker registry credentials: {0}")]
    RegistryCredential(client::Error),

    #[error("enable local auth: {0}")]
    LocalAuth(client::Error),
}

/// API key pair handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Display for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ACCESS_KEY:{} SECRET_KEY:{}", self.access_key, self.secret_key)
    }
}

/// Write the single line a provisioning pipeline captures.
pub fn print_credentials(out: &mut impl Write, credentials: &Credentials) -> std::io::Result<()> {
    writeln!(out, "{credentials}")
}

pub async fn configure(
    api: &dyn RancherApi,
    sleeper: &dyn Sleeper,
    cfg: &Config,
) -> Result<Credentials, Error> {
    let env_id = discovery::environment_id(api, sleeper, &cfg.poll).await?;
    info!("Environment ID: {env_id}");

    let credentials = issue_api_key(api, &env_id, cfg).await?;
    set_api_host(api, &cfg.rancher_host).await?;
    let registry_id = register_registry(api, &env_id, cfg).await?;
    attach_registry_credentials(api, &env_id, &registry_id, cfg).await?;
    enable_local_auth(api, cfg).await?;

    info!("Rancher configured.");
    Ok(credentials)
}

async fn issue_api_key(api: &dyn RancherApi, env_id: &str, cfg: &Config) -> Result<Credentials, Error> {
    info!("Getting API keys...");
    let key = api
        .create_api_key(env_id, ApiKeyRequest {
            account_id: env_id,
            name: &cfg.api_key_name,
            description: &cfg.api_key_description,
        })
        .await
        .map_err(Error::ApiKey)?;
    info!("API keys issued");

    Ok(Credentials {
        access_key: key.public_value,
        secret_key: key.secret_value,
    })
}

/// Only reading the setting can fail the run. Whether the update took
/// effect is not checked; a failed update is logged and skipped.
async fn set_api_host(api: &dyn RancherApi, rancher_host: &str) -> Result<(), Error> {
    let setting = api.setting(API_HOST_SETTING).await.map_err(Error::ApiHost)?;
    let value = client::base_url(rancher_host);

    let update = ActiveSetting {
        id: &setting.id,
        name: API_HOST_SETTING,
        in_db: false,
        value: value.clone(),
    };
    match api.update_setting(&setting.links.self_link, update).await {
        Ok(()) => info!("API host set to {value}"),
        Err(err) => warn!("{API_HOST_SETTING} update not confirmed, continuing: {err}"),
    }
    Ok(())
}

async fn register_registry(api: &dyn RancherApi, env_id: &str, cfg: &Config) -> Result<String, Error> {
    let registry = api
        .create_registry(env_id, RegistryRequest {
            server_address: &cfg.docker_host,
            description: &cfg.registry_description,
        })
        .await
        .map_err(Error::Registry)?;

    info!("Docker registry {} registered as {}", cfg.docker_host, registry.id);
    Ok(registry.id)
}

async fn attach_registry_credentials(
    api: &dyn RancherApi,
    env_id: &str,
    registry_id: &str,
    cfg: &Config,
) -> Result<(), Error> {
    api.create_registry_credential(env_id, RegistryCredentialRequest {
        registry_id,
        email: &cfg.email,
        public_value: &cfg.username,
        secret_value: &cfg.password,
    })
    .await
    .map_err(Error::RegistryCredential)?;

    info!("Docker registry credentials configured");
    Ok(())
}

async fn enable_local_auth(api: &dyn RancherApi, cfg: &Config) -> Result<(), Error> {
    api.create_local_auth_config(LocalAuthConfig {
        access_mode: AccessMode::Unrestricted,
        name: &cfg.username,
        enabled: true,
        username: &cfg.username,
        password: &cfg.password,
    })
    .await
    .map_err(Error::LocalAuth)?;

    info!("Rancher auth enabled");
    Ok(())
}

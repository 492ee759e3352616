//! Payloads exchanged with the Rancher v1 API.
//!
//! Only the handful of fields needed for first-time setup are modelled.
//! Request bodies are serialized through [`Resource`], which adds the
//! `type` discriminator the API expects on every write.
use serde::{Deserialize, Deserializer, Serialize};

/// Name of the account that owns every resource created during setup.
pub const DEFAULT_ACCOUNT: &str = "Default";

/// Setting holding the URL the server advertises for itself.
pub const API_HOST_SETTING: &str = "api.host";

/// A `{"data": [...]}` listing.
#[derive(Deserialize, Debug, Default)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Collection<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<T>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Account {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Rancher writes unset fields as `null`; read those as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Collection<Account> {
    /// First account carrying `name` and a usable identifier.
    pub fn find_by_name(&self, name: &str) -> Option<&Account> {
        self.data
            .iter()
            .find(|account| account.name == name && !account.id.is_empty())
    }
}

/// Request bodies, tagged with the resource kind.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum Resource<'a> {
    #[serde(rename = "apikey")]
    ApiKey(ApiKeyRequest<'a>),

    #[serde(rename = "activeSetting")]
    ActiveSetting(ActiveSetting<'a>),

    #[serde(rename = "registry")]
    Registry(RegistryRequest<'a>),

    #[serde(rename = "registryCredential")]
    RegistryCredential(RegistryCredentialRequest<'a>),

    #[serde(rename = "localAuthConfig")]
    LocalAuthConfig(LocalAuthConfig<'a>),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest<'a> {
    pub account_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
}

/// Issued key pair. The server capitalizes these fields.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiKey {
    #[serde(rename = "PublicValue", alias = "publicValue")]
    pub public_value: String,
    #[serde(rename = "SecretValue", alias = "secretValue")]
    pub secret_value: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Setting {
    pub id: String,
    pub links: Links,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
}

/// Replacement value for a setting, written to the setting's own self-link.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSetting<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub in_db: bool,
    pub value: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRequest<'a> {
    pub server_address: &'a str,
    pub description: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Registry {
    pub id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentialRequest<'a> {
    pub registry_id: &'a str,
    pub email: &'a str,
    /// Registry username.
    pub public_value: &'a str,
    /// Registry password.
    pub secret_value: &'a str,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Unrestricted,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LocalAuthConfig<'a> {
    pub access_mode: AccessMode,
    pub name: &'a str,
    pub enabled: bool,
    pub username: &'a str,
    pub password: &'a str,
}

pub mod file {
    use serde::Deserialize;
    use serde_inline_default::serde_inline_default;
    use thiserror::Error;

    const DEFAULT_CONFIG: &str = include_str!("../default.toml");

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("read {path}: {err}")]
        ReadFile {
            err: std::io::Error,
            path: String,
        },

        #[error("parse: {0}")]
        Parse(#[from] toml::de::Error),
    }

    /// A rc.toml file.
    #[derive(Deserialize, Debug)]
    pub struct File {
        pub description: Option<String>,
        pub poll: Poll,
        pub http: Http,
        pub api_key: ApiKey,
        pub registry: Registry,
    }

    impl Default for File {
        fn default() -> Self {
            // The default config is compiled into the program, so
            // make sure to test default() to catch panics compile-time.
            toml::from_str(DEFAULT_CONFIG).unwrap()
        }
    }

    impl File {
        /// Read a user config file and lay it over the built-in defaults.
        pub fn default_with_user_config_file(path: &str) -> Result<Self, Error> {
            let user_config = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
                err,
                path: path.to_string(),
            })?;
            Self::default_with_user_config(&user_config)
        }

        pub fn default_with_user_config(user_config: &str) -> Result<Self, Error> {
            let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
            merge(&mut table, toml::from_str(user_config)?);
            Ok(toml::Value::Table(table).try_into::<File>()?)
        }
    }

    /// Keys in `overlay` win; tables are merged key by key.
    fn merge(base: &mut toml::Table, overlay: toml::Table) {
        for (key, value) in overlay {
            match value {
                toml::Value::Table(overlay_table) => match base.get_mut(&key) {
                    Some(toml::Value::Table(base_table)) => merge(base_table, overlay_table),
                    _ => {
                        base.insert(key, toml::Value::Table(overlay_table));
                    }
                },
                value => {
                    base.insert(key, value);
                }
            }
        }
    }

    #[serde_inline_default]
    #[derive(Deserialize, Debug)]
    pub struct Poll {
        #[serde_inline_default(5)]
        pub interval_secs: u64,
        /// Absent or zero polls forever.
        pub max_attempts: Option<u32>,
    }

    #[serde_inline_default]
    #[derive(Deserialize, Debug)]
    pub struct Http {
        #[serde_inline_default(30)]
        pub timeout_secs: u64,
    }

    #[derive(Deserialize, Debug)]
    pub struct ApiKey {
        pub name: String,
        pub description: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Registry {
        pub description: String,
    }

}

pub mod runtime {
    use std::time::Duration;
    use thiserror::Error;
    use crate::discovery::Poll;
    use super::file;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("rancher host is empty")]
        EmptyRancherHost,
    }

    /// Values supplied by the operator, typically through the environment.
    #[derive(Default, Clone)]
    pub struct Inputs {
        pub username: String,
        pub password: String,
        pub email: String,
        /// Address of the private Docker registry.
        pub docker_host: String,
        /// `host[:port]` of the Rancher server.
        pub rancher_host: String,
        /// Overrides `poll.max_attempts` from the config file.
        pub max_attempts: Option<u32>,
    }

    /// Everything a bootstrap run needs, resolved once at startup.
    #[derive(Clone)]
    pub struct Config {
        pub username: String,
        pub password: String,
        pub email: String,
        pub docker_host: String,
        pub rancher_host: String,
        pub poll: Poll,
        pub http_timeout: Duration,
        pub api_key_name: String,
        pub api_key_description: String,
        pub registry_description: String,
    }

    impl Config {
        pub fn new(inputs: Inputs, cfg_file: &file::File) -> Result<Self, Error> {
            let rancher_host = inputs.rancher_host.trim().to_string();
            if rancher_host.is_empty() {
                return Err(Error::EmptyRancherHost);
            }

            let max_attempts = inputs
                .max_attempts
                .or(cfg_file.poll.max_attempts)
                .filter(|max| *max > 0);

            Ok(Self {
                username: inputs.username,
                password: inputs.password,
                email: inputs.email,
                docker_host: inputs.docker_host,
                rancher_host,
                poll: Poll {
                    interval: Duration::from_secs(cfg_file.poll.interval_secs),
                    max_attempts,
                },
                http_timeout: Duration::from_secs(cfg_file.http.timeout_secs),
                api_key_name: cfg_file.api_key.name.clone(),
                api_key_description: cfg_file.api_key.description.clone(),
                registry_description: cfg_file.registry.description.clone(),
            })
        }
    }

}

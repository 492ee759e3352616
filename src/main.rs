//! Rancher configurator
use clap::Parser;
use log::{debug, error, info};
use rancher_configurator::{bootstrap, client, config, discovery};
use thiserror::Error;

/// Bootstrap a freshly deployed Rancher server and print its new API key pair.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Operator username, used for local auth and the registry.
    #[arg(long, env = "USERNAME")]
    username: String,

    /// Operator password, used for local auth and the registry.
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: String,

    /// Email attached to the registry credentials.
    #[arg(long, env = "EMAIL")]
    email: String,

    /// Address of the private Docker registry.
    #[arg(long, env = "DOCKER_HOST")]
    docker_host: String,

    /// Rancher server as host[:port].
    #[arg(long, env = "RANCHER_HOST")]
    rancher_host: String,

    /// Path to a TOML file overriding the built-in defaults.
    #[arg(long)]
    config: Option<String>,

    /// Give up waiting for Rancher after this many attempts. 0 waits forever.
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file: {0}")]
    ConfigParse(#[from] config::file::Error),

    #[error("configuration: {0}")]
    Config(#[from] config::runtime::Error),

    #[error("http client: {0}")]
    Client(#[from] client::Error),

    #[error("{0}")]
    Bootstrap(#[from] bootstrap::Error),

    #[error("write credentials: {0}")]
    Output(#[from] std::io::Error),
}

/// Read the configuration file from disk and merge it with the
/// `default.toml` built-in config.
///
/// If a configuration file name is not set explicitly, use `rc.toml`
/// from the working directory when it exists.
fn read_config(args: &Cli) -> Result<config::file::File, Error> {
    const DEFAULT_CONFIG_FILE: &str = "rc.toml";

    let config_file = match &args.config {
        None => {
            if std::fs::metadata(DEFAULT_CONFIG_FILE)
                .map(|metadata| metadata.is_file())
                .unwrap_or(false)
            {
                Some(DEFAULT_CONFIG_FILE.to_string())
            } else {
                None
            }
        }
        Some(c) => Some(c.clone()),
    };

    Ok(if let Some(config_file) = config_file {
        debug!("Reading configuration from {config_file}");
        config::file::File::default_with_user_config_file(&config_file)?
    } else {
        config::file::File::default()
    })
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err.to_string());
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let cfg_file = read_config(&args)?;

    let inputs = config::runtime::Inputs {
        username: args.username,
        password: args.password,
        email: args.email,
        docker_host: args.docker_host,
        rancher_host: args.rancher_host,
        max_attempts: args.max_attempts,
    };
    let cfg = config::runtime::Config::new(inputs, &cfg_file)?;

    info!("Trying Rancher on {}...", client::base_url(&cfg.rancher_host));
    let api = client::HttpClient::new(&cfg.rancher_host, cfg.http_timeout)?;
    let credentials = bootstrap::configure(&api, &discovery::TokioSleeper, &cfg).await?;

    bootstrap::print_credentials(&mut std::io::stdout().lock(), &credentials)?;
    Ok(())
}

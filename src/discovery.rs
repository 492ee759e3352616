//! Wait for a freshly started Rancher server to come up, and find the
//! environment that everything else is created in.
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use crate::client::{self, RancherApi};
use crate::resource::DEFAULT_ACCOUNT;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no \"Default\" environment after {0} attempts")]
    Exhausted(u32),
}

/// How often, and for how long, to poll the account listing.
#[derive(Clone, Debug, PartialEq)]
pub struct Poll {
    pub interval: Duration,
    /// `None` polls until the environment shows up.
    pub max_attempts: Option<u32>,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Poll the account listing until it contains the `Default` environment,
/// and return that environment's ID.
///
/// Unreachable servers and unreadable responses are waited out, never reported.
/// The only way this fails is by running out of attempts under a bounded [`Poll`].
pub async fn environment_id(
    api: &dyn RancherApi,
    sleeper: &dyn Sleeper,
    poll: &Poll,
) -> Result<String, Error> {
    info!("Getting environment ID...");
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match api.accounts().await {
            Ok(accounts) => match accounts.find_by_name(DEFAULT_ACCOUNT) {
                Some(account) => {
                    debug!("{DEFAULT_ACCOUNT} environment found after {attempt} attempt(s)");
                    return Ok(account.id.clone());
                }
                None => info!(
                    "No {DEFAULT_ACCOUNT} environment among {} account(s) yet",
                    accounts.data.len()
                ),
            },
            Err(client::Error::Reqwest(err)) => {
                info!("Waiting for Rancher...");
                debug!("list accounts: {err}");
            }
            Err(client::Error::Deserialize(status, body)) => {
                warn!("Ignoring undecodable account listing (status {status})");
                debug!("account listing body: {body}");
            }
        }

        if poll.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(Error::Exhausted(attempt));
        }
        sleeper.sleep(poll.interval).await;
    }
}

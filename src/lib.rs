//! Rancher configurator
//!
//! Takes a freshly deployed Rancher server from first boot to usable:
//! waits for it to answer, issues an API key pair, advertises the server's own URL,
//! registers a private Docker registry with credentials, and turns on local auth.
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod discovery;
pub mod resource;

#[cfg(test)]
mod fake;

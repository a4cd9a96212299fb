pub mod config;
pub mod exec;
pub mod run;

use anyhow::{anyhow, Result};
use clap::Args;

use shellflow::{Config, RemoteConfig};

/// Environment variable consulted for a password so it need not be stored.
pub const PASSWORD_ENV: &str = "SHELLFLOW_PASSWORD";

/// Remote selection shared by the commands that connect.
#[derive(Args, Debug, Default)]
pub struct RemoteArgs {
    #[arg(short, long, help = "Name of a configured remote")]
    pub remote: Option<String>,

    #[arg(long, help = "Connect to this host instead of a configured remote")]
    pub host: Option<String>,

    #[arg(long, help = "SSH username (defaults to $USER for --host)")]
    pub user: Option<String>,

    #[arg(long, help = "SSH port")]
    pub port: Option<u16>,

    #[arg(long, help = "Path to SSH private key")]
    pub ssh_key: Option<String>,

    #[arg(long, help = "Give up on a remote command after this many seconds")]
    pub command_timeout: Option<u64>,
}

impl RemoteArgs {
    /// Resolves the remote from the flags and the configuration file.
    pub fn resolve(&self) -> Result<(String, RemoteConfig)> {
        let (name, mut remote) = match &self.host {
            Some(host) => {
                let user = self
                    .user
                    .clone()
                    .or_else(|| std::env::var("USER").ok())
                    .ok_or_else(|| anyhow!("--user is required when $USER is not set"))?;
                (host.clone(), RemoteConfig::new(host.clone(), user))
            }
            None => {
                let config = Config::load()?;
                let (name, remote) = config.resolve_remote(self.remote.as_deref())?;
                (name.clone(), remote.clone())
            }
        };

        self.apply(&mut remote);
        Ok((name, remote))
    }

    fn apply(&self, remote: &mut RemoteConfig) {
        if let Some(user) = &self.user {
            remote.user = user.clone();
        }
        if let Some(port) = self.port {
            remote.port = port;
        }
        if let Some(key) = &self.ssh_key {
            remote.ssh_key = Some(key.clone());
        }
        if let Some(timeout) = self.command_timeout {
            remote.workflow.command_timeout = Some(timeout);
        }
        apply_password_env(remote);
    }
}

/// Fills in the password from `SHELLFLOW_PASSWORD` when none is configured.
pub fn apply_password_env(remote: &mut RemoteConfig) {
    if remote.password.is_none() {
        remote.password = std::env::var(PASSWORD_ENV).ok();
    }
}

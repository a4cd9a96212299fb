//! Configuration management for Shellflow.
//!
//! This module handles loading and saving the remote host definitions and the
//! per-remote workflow settings (staging paths, interpreter, hooks).
//!
//! # Configuration File Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/shellflow/config.yml`
//! - macOS: `~/Library/Application Support/shellflow/config.yml`
//! - Windows: `C:\Users\<User>\AppData\Roaming\shellflow\config.yml`
//!
//! # Example Configuration
//!
//! ```yaml
//! defaults:
//!   remote: solver-box
//! remotes:
//!   solver-box:
//!     host: "solver.example.com"
//!     user: "alice"
//!     port: 22
//!     ssh_key: "~/.ssh/id_ed25519"
//!     workflow:
//!       interpreter: "/opt/conda/envs/opt/bin/python"
//!       pre_execution: "module load gurobi"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default SSH port
const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH connection timeout in seconds
const DEFAULT_TIMEOUT: u64 = 60;

/// Default interpreter invoked on the remote
const DEFAULT_INTERPRETER: &str = "python";

const DEFAULT_SCRIPT_PATH: &str = "/tmp/shellflow-execution.py";
const DEFAULT_UNSOLVED_PATH: &str = "/tmp/shellflow-unsolved-model.nc";
const DEFAULT_SOLVED_PATH: &str = "/tmp/shellflow-solved-model.nc";

/// Main configuration structure for Shellflow.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named remote machines
    #[serde(default)]
    pub remotes: HashMap<String, RemoteConfig>,

    /// Default settings that apply when not overridden
    #[serde(default)]
    pub defaults: DefaultSettings,
}

/// Default settings for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultSettings {
    /// Remote used when none is named on the command line
    pub remote: Option<String>,
}

/// Configuration for a remote machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Hostname or IP address of the remote machine
    pub host: String,

    /// SSH username for authentication
    pub user: String,

    /// SSH port (default: 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Path to SSH private key file (optional, the SSH agent is tried otherwise)
    pub ssh_key: Option<String>,

    /// Password for password authentication or key decryption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Staging paths and remote invocation settings
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Fixed remote paths and invocation settings reused by every workflow run.
///
/// The paths are not unique per run. Two handlers pointed at the same host
/// with the same paths overwrite each other's staged files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Where the rendered driver script is written on the remote
    #[serde(default = "default_script_path")]
    pub script_path: String,

    /// Where the unsolved artifact is uploaded
    #[serde(default = "default_unsolved_path")]
    pub unsolved_path: String,

    /// Where the remote script writes the solved artifact
    #[serde(default = "default_solved_path")]
    pub solved_path: String,

    /// Interpreter used to run the driver script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Shell snippet run before the interpreter (e.g. activating an environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_execution: Option<String>,

    /// Shell snippet run after the interpreter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_execution: Option<String>,

    /// Custom driver script template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    /// Deadline in seconds for a single remote command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_script_path() -> String {
    DEFAULT_SCRIPT_PATH.to_string()
}

fn default_unsolved_path() -> String {
    DEFAULT_UNSOLVED_PATH.to_string()
}

fn default_solved_path() -> String {
    DEFAULT_SOLVED_PATH.to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            script_path: default_script_path(),
            unsolved_path: default_unsolved_path(),
            solved_path: default_solved_path(),
            interpreter: default_interpreter(),
            pre_execution: None,
            post_execution: None,
            template: None,
            command_timeout: None,
        }
    }
}

impl Config {
    /// Returns the default configuration file path for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("shellflow").join("config.yml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns `Ok(Config::default())` if no config file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific file path.
    ///
    /// Returns `Ok(Config::default())` if the file doesn't exist.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read config file: {}\n\n\
                     File path: {}\n\n\
                     Suggestions:\n\
                     • Check file permissions: ls -la {}\n\
                     • Try recreating with: shellflow config init",
                    e,
                    path.display(),
                    path.display()
                ),
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file: {}\n\n\
                 File path: {}\n\n\
                 Suggestions:\n\
                 • Check YAML syntax in the config file\n\
                 • Verify indentation uses spaces, not tabs\n\
                 • Backup and recreate: mv {} {}.bak && shellflow config init",
                e,
                path.display(),
                path.display(),
                path.display()
            ))
        })
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> Result<()> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Err(Error::Config(
                "Could not determine config directory\n\n\
                 Suggestions:\n\
                 • Check HOME environment variable is set\n\
                 • Verify XDG_CONFIG_HOME is accessible"
                    .to_string(),
            )),
        }
    }

    /// Saves configuration to a specific file path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file {}: {}", path.display(), e),
            ))
        })?;

        Ok(())
    }

    /// Gets a remote configuration by name.
    pub fn get_remote(&self, name: &str) -> Option<&RemoteConfig> {
        self.remotes.get(name)
    }

    /// Adds or updates a remote configuration.
    pub fn set_remote(&mut self, name: String, config: RemoteConfig) {
        self.remotes.insert(name, config);
    }

    /// Removes a remote configuration.
    pub fn remove_remote(&mut self, name: &str) -> Option<RemoteConfig> {
        self.remotes.remove(name)
    }

    /// Returns true if there are no remotes configured.
    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }

    /// Lists all configured remote names, sorted.
    pub fn remote_names(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.remotes.keys().collect();
        names.sort();
        names
    }

    /// Picks the remote to use.
    ///
    /// An explicit name wins, then `defaults.remote`, then the single
    /// configured remote if there is exactly one.
    pub fn resolve_remote(&self, name: Option<&str>) -> Result<(&String, &RemoteConfig)> {
        if let Some(name) = name.or(self.defaults.remote.as_deref()) {
            return self
                .remotes
                .get_key_value(name)
                .ok_or_else(|| Error::Config(format!("Remote '{}' is not configured", name)));
        }

        let mut iter = self.remotes.iter();
        match (iter.next(), iter.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(Error::Config(
                "No remotes configured. Add one with: shellflow config add-remote".to_string(),
            )),
            _ => Err(Error::Config(
                "Several remotes configured; pick one with --remote or set defaults.remote"
                    .to_string(),
            )),
        }
    }
}

impl RemoteConfig {
    /// Creates a new remote configuration with required fields.
    pub fn new(host: String, user: String) -> Self {
        Self {
            host,
            user,
            port: DEFAULT_SSH_PORT,
            ssh_key: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            workflow: WorkflowConfig::default(),
        }
    }

    /// Builder method to set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set the SSH key path.
    pub fn with_ssh_key(mut self, key_path: String) -> Self {
        self.ssh_key = Some(key_path);
        self
    }

    /// Builder method to set the password.
    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    /// Builder method to set the timeout.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to replace the workflow settings.
    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = workflow;
        self
    }

    /// Returns the SSH connection string (user@host:port).
    pub fn connection_string(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }

    /// Expands the SSH key path, replacing ~ with the home directory.
    pub fn expanded_ssh_key(&self) -> Option<PathBuf> {
        self.ssh_key.as_ref().map(|key| {
            if let Some(stripped) = key.strip_prefix("~/") {
                if let Some(home) = dirs::home_dir() {
                    return home.join(stripped);
                }
            }
            PathBuf::from(key)
        })
    }
}

//! CLI command for managing Shellflow configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::apply_password_env;
use shellflow::{Config, RemoteConfig, RemoteHandler, WorkflowConfig};

#[derive(Args)]
#[command(about = "Manage Shellflow configuration")]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show the configuration file path
    Path,

    /// List all configured remotes
    ListRemotes,

    /// Add a new remote configuration
    AddRemote {
        /// Name for the remote (e.g., "solver-box")
        name: String,

        /// Hostname or IP address
        #[arg(long)]
        host: String,

        /// SSH username
        #[arg(long)]
        user: String,

        /// SSH port (default: 22)
        #[arg(long, default_value = "22")]
        port: u16,

        /// Path to SSH private key
        #[arg(long)]
        ssh_key: Option<String>,

        /// Connection timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Interpreter used to run the driver script
        #[arg(long, default_value = "python")]
        interpreter: String,

        /// Shell snippet run before the interpreter
        #[arg(long)]
        pre_execution: Option<String>,

        /// Shell snippet run after the interpreter
        #[arg(long)]
        post_execution: Option<String>,

        /// Make this the default remote
        #[arg(long)]
        default: bool,
    },

    /// Remove a remote configuration
    RemoveRemote {
        /// Name of the remote to remove
        name: String,
    },

    /// Show details of a specific remote
    ShowRemote {
        /// Name of the remote to show
        name: String,
    },

    /// Initialize a new configuration file with an example remote
    Init {
        /// Overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Validate connections to configured remotes by running a no-op command
    Validate {
        /// Specific remote to validate (validates all if not specified)
        name: Option<String>,
    },
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        match &self.action {
            ConfigAction::Show => self.show_config(),
            ConfigAction::Path => self.show_path(),
            ConfigAction::ListRemotes => self.list_remotes(),
            ConfigAction::AddRemote {
                name,
                host,
                user,
                port,
                ssh_key,
                timeout,
                interpreter,
                pre_execution,
                post_execution,
                default,
            } => {
                let mut remote = RemoteConfig::new(host.clone(), user.clone())
                    .with_port(*port)
                    .with_timeout(*timeout)
                    .with_workflow(WorkflowConfig {
                        interpreter: interpreter.clone(),
                        pre_execution: pre_execution.clone(),
                        post_execution: post_execution.clone(),
                        ..WorkflowConfig::default()
                    });

                if let Some(key) = ssh_key {
                    remote = remote.with_ssh_key(key.clone());
                }

                self.add_remote(name, remote, *default)
            }
            ConfigAction::RemoveRemote { name } => self.remove_remote(name),
            ConfigAction::ShowRemote { name } => self.show_remote(name),
            ConfigAction::Init { force } => self.init_config(*force),
            ConfigAction::Validate { name } => self.validate_remotes(name.as_deref()),
        }
    }

    fn show_config(&self) -> Result<()> {
        let config = Config::load()?;

        if config.is_empty() {
            println!("No configuration file found or no remotes configured.");
            println!();
            println!("To create a configuration file, run:");
            println!("  shellflow config init");
            return Ok(());
        }

        let yaml = serde_yaml::to_string(&config)?;
        println!("{}", yaml);

        Ok(())
    }

    fn show_path(&self) -> Result<()> {
        match Config::default_path() {
            Some(path) => {
                println!("Configuration file path: {}", path.display());
                if path.exists() {
                    println!("Status: File exists");
                } else {
                    println!("Status: File does not exist");
                }
            }
            None => {
                println!("Could not determine configuration directory");
            }
        }

        Ok(())
    }

    fn list_remotes(&self) -> Result<()> {
        let config = Config::load()?;

        if config.is_empty() {
            println!("No remotes configured.");
            return Ok(());
        }

        println!("Configured remotes:");
        println!();

        for name in config.remote_names() {
            let remote = &config.remotes[name];
            let marker = if config.defaults.remote.as_deref() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!(
                "  {}{} - {} (interpreter: {})",
                name,
                marker,
                remote.connection_string(),
                remote.workflow.interpreter
            );
        }

        Ok(())
    }

    fn add_remote(&self, name: &str, remote: RemoteConfig, make_default: bool) -> Result<()> {
        let mut config = Config::load()?;

        if config.get_remote(name).is_some() {
            println!("Warning: Remote '{}' already exists, updating...", name);
        }

        config.set_remote(name.to_string(), remote);
        if make_default {
            config.defaults.remote = Some(name.to_string());
        }
        config.save()?;

        println!("Added remote '{}'", name);
        if let Some(path) = Config::default_path() {
            println!("Configuration saved to: {}", path.display());
        }

        Ok(())
    }

    fn remove_remote(&self, name: &str) -> Result<()> {
        let mut config = Config::load()?;

        if config.remove_remote(name).is_some() {
            if config.defaults.remote.as_deref() == Some(name) {
                config.defaults.remote = None;
            }
            config.save()?;
            println!("Removed remote '{}'", name);
        } else {
            println!("Remote '{}' not found", name);
        }

        Ok(())
    }

    fn show_remote(&self, name: &str) -> Result<()> {
        let config = Config::load()?;

        match config.get_remote(name) {
            Some(remote) => {
                let workflow = &remote.workflow;
                println!("Remote: {}", name);
                println!("  Host: {}", remote.host);
                println!("  User: {}", remote.user);
                println!("  Port: {}", remote.port);
                println!(
                    "  SSH key: {}",
                    remote.ssh_key.as_deref().unwrap_or("(agent)")
                );
                println!("  Timeout: {}s", remote.timeout);
                println!("  Interpreter: {}", workflow.interpreter);
                println!("  Script path: {}", workflow.script_path);
                println!("  Unsolved path: {}", workflow.unsolved_path);
                println!("  Solved path: {}", workflow.solved_path);
                println!(
                    "  Pre-execution: {}",
                    workflow.pre_execution.as_deref().unwrap_or("(none)")
                );
                println!(
                    "  Post-execution: {}",
                    workflow.post_execution.as_deref().unwrap_or("(none)")
                );
                match workflow.command_timeout {
                    Some(t) => println!("  Command timeout: {}s", t),
                    None => println!("  Command timeout: (none)"),
                }
                println!();
                println!("Connection string: {}", remote.connection_string());
            }
            None => {
                println!("Remote '{}' not found", name);
            }
        }

        Ok(())
    }

    fn init_config(&self, force: bool) -> Result<()> {
        let path = Config::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine configuration directory"))?;

        if path.exists() && !force {
            println!("Configuration file already exists at: {}", path.display());
            println!("Use --force to overwrite");
            return Ok(());
        }

        let mut config = Config::default();
        config.set_remote(
            "solver-box".to_string(),
            RemoteConfig::new("solver.example.com".to_string(), "user".to_string())
                .with_ssh_key("~/.ssh/id_ed25519".to_string()),
        );
        config.defaults.remote = Some("solver-box".to_string());
        config.save()?;

        println!("Created configuration file at: {}", path.display());
        println!();
        println!("An example remote has been added. Edit the file to configure your server:");
        println!("  shellflow config show");
        println!();
        println!("Or add remotes via CLI:");
        println!("  shellflow config add-remote my-server --host example.com --user myuser");

        Ok(())
    }

    fn validate_remotes(&self, name: Option<&str>) -> Result<()> {
        let config = Config::load()?;

        if config.is_empty() {
            println!("No remotes configured to validate.");
            return Ok(());
        }

        let names: Vec<&String> = match name {
            Some(n) => match config.remotes.get_key_value(n) {
                Some((key, _)) => vec![key],
                None => {
                    println!("Remote '{}' not found", n);
                    return Ok(());
                }
            },
            None => config.remote_names(),
        };

        println!("Validating {} remote(s)...", names.len());
        println!();

        let mut success_count = 0;
        let mut failure_count = 0;

        for remote_name in names {
            let mut remote = config.remotes[remote_name].clone();
            apply_password_env(&mut remote);
            println!("  {} ({})... ", remote_name, remote.connection_string());

            let command = validation_command(&remote.workflow);
            let result = RemoteHandler::scoped(&remote, |handler| handler.execute(&command));

            match result {
                Ok(()) => {
                    println!("    ✓ Shell and interpreter OK");
                    success_count += 1;
                }
                Err(e) => {
                    println!("    ✗ {}", e);
                    failure_count += 1;
                }
            }
        }

        println!();
        println!(
            "Results: {} passed, {} failed",
            success_count, failure_count
        );

        Ok(())
    }
}

/// Checks the interpreter the way a workflow would run it, after the pre hook.
fn validation_command(workflow: &WorkflowConfig) -> String {
    let check = format!("{} --version", workflow.interpreter);
    match &workflow.pre_execution {
        Some(pre) => format!("{}\n{}", pre, check),
        None => check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_command_plain() {
        assert_eq!(
            validation_command(&WorkflowConfig::default()),
            "python --version"
        );
    }

    #[test]
    fn test_validation_command_runs_pre_hook_first() {
        let workflow = WorkflowConfig {
            interpreter: "python3".to_string(),
            pre_execution: Some("conda activate opt".to_string()),
            post_execution: Some("rm -f /tmp/run.py".to_string()),
            ..WorkflowConfig::default()
        };

        assert_eq!(
            validation_command(&workflow),
            "conda activate opt\npython3 --version"
        );
    }
}

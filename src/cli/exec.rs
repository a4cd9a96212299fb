//! Exec subcommand: run one command in the remote shell.

use anyhow::Result;
use clap::Args;

use super::RemoteArgs;
use shellflow::RemoteHandler;

#[derive(Args)]
#[command(about = "Run a shell command on the remote and stream its output")]
pub struct ExecCommand {
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "Command to run"
    )]
    pub command: Vec<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl ExecCommand {
    pub fn execute(self) -> Result<()> {
        let (_, remote) = self.remote.resolve()?;
        let command = self.command.join(" ");

        RemoteHandler::scoped(&remote, |handler| handler.execute(&command))?;
        Ok(())
    }
}

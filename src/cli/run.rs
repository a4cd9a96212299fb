//! Run subcommand: solve a local model file on the remote.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::RemoteArgs;
use shellflow::{Artifact, FileArtifact, RemoteHandler, SolveOptions};

#[derive(Args)]
#[command(about = "Upload a model, solve it on the remote, and download the result")]
pub struct RunCommand {
    #[arg(help = "Local file holding the unsolved model")]
    pub input: PathBuf,

    #[arg(short, long, help = "Where to write the solved model")]
    pub output: PathBuf,

    #[arg(
        short = 'O',
        long = "option",
        value_name = "KEY=VALUE",
        help = "Keyword option for the remote solve call (value parsed as JSON, else string)"
    )]
    pub options: Vec<String>,

    #[arg(long, help = "Interpreter to run the driver script with")]
    pub interpreter: Option<String>,

    #[arg(long, help = "Shell snippet to run before the interpreter")]
    pub pre: Option<String>,

    #[arg(long, help = "Shell snippet to run after the interpreter")]
    pub post: Option<String>,

    #[arg(long, help = "Custom driver script template")]
    pub template: Option<PathBuf>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl RunCommand {
    pub fn execute(self) -> Result<()> {
        let (name, mut remote) = self.remote.resolve()?;

        if let Some(interpreter) = self.interpreter {
            remote.workflow.interpreter = interpreter;
        }
        if self.pre.is_some() {
            remote.workflow.pre_execution = self.pre;
        }
        if self.post.is_some() {
            remote.workflow.post_execution = self.post;
        }
        if self.template.is_some() {
            remote.workflow.template = self.template;
        }

        let mut options = SolveOptions::new();
        for assignment in &self.options {
            options.parse_assignment(assignment)?;
        }

        let model = FileArtifact::load(&self.input)
            .with_context(|| format!("Failed to load model from {}", self.input.display()))?;

        println!(
            "Solving {} ({} bytes) on '{}' ({})",
            self.input.display(),
            model.len(),
            name,
            remote.connection_string()
        );

        let solved = RemoteHandler::scoped(&remote, |handler| handler.solve(&model, &options))?;

        solved
            .save(&self.output)
            .with_context(|| format!("Failed to write solved model to {}", self.output.display()))?;
        println!("Solved model written to {}", self.output.display());

        Ok(())
    }
}

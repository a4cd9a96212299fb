//! High-level orchestration of remote workflows.
//!
//! This module provides the glue between script staging, artifact transfer,
//! remote execution, and result retrieval:
//!
//! 1. render and stage the driver script
//! 2. save the artifact locally and upload it
//! 3. run the interpreter (wrapped by the optional hooks) in the shell
//! 4. download the solved artifact and load it
//!
//! Any failure aborts the run. Staged remote files are left in place and
//! overwritten by the next run, since the remote paths are fixed.

use crate::artifact::Artifact;
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::options::SolveOptions;
use crate::remote::script::{stage_script, ScriptRenderer, TemplateScript};
use crate::remote::shell::CommandRunner;
use crate::remote::transfer::FileTransfer;
use log::{debug, info};
use tempfile::{Builder, NamedTempFile};

const TEMP_PREFIX: &str = "shellflow";

/// Runs stage/execute/fetch workflows over a command runner and a file transfer.
pub struct RemoteOrchestrator<R, T> {
    workflow: WorkflowConfig,
    runner: R,
    transfer: T,
    renderer: Box<dyn ScriptRenderer>,
}

impl<R: CommandRunner, T: FileTransfer> RemoteOrchestrator<R, T> {
    /// Creates an orchestrator with the renderer named by the workflow config.
    ///
    /// Uses the template file from `workflow.template` when set, otherwise
    /// the default driver script.
    pub fn new(workflow: WorkflowConfig, runner: R, transfer: T) -> Result<Self> {
        let renderer = match &workflow.template {
            Some(path) => TemplateScript::from_file(path)?,
            None => TemplateScript::default(),
        };

        Ok(Self::with_renderer(workflow, runner, transfer, renderer))
    }

    /// Creates an orchestrator with a custom script renderer.
    pub fn with_renderer(
        workflow: WorkflowConfig,
        runner: R,
        transfer: T,
        renderer: impl ScriptRenderer + 'static,
    ) -> Self {
        Self {
            workflow,
            runner,
            transfer,
            renderer: Box::new(renderer),
        }
    }

    pub fn set_renderer(&mut self, renderer: impl ScriptRenderer + 'static) {
        self.renderer = Box::new(renderer);
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        &self.workflow
    }

    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    /// Consumes the orchestrator, returning the runner and transfer.
    pub fn into_parts(self) -> (R, T) {
        (self.runner, self.transfer)
    }

    /// Runs a shell command on the remote, streaming its output.
    pub fn execute(&mut self, command: &str) -> Result<()> {
        self.runner.execute(command)
    }

    /// Builds the command line: optional pre hook, interpreter call, optional post hook.
    pub fn build_command(&self) -> String {
        let mut command = format!("{} {}", self.workflow.interpreter, self.workflow.script_path);

        if let Some(pre) = &self.workflow.pre_execution {
            command = format!("{}\n{}", pre, command);
        }

        if let Some(post) = &self.workflow.post_execution {
            command = format!("{}\n{}", command, post);
        }

        command
    }

    /// Ships `artifact` to the remote, runs the driver script on it, and
    /// returns the artifact the script wrote back.
    pub fn run_workflow<A: Artifact>(&mut self, artifact: &A, options: &SolveOptions) -> Result<A> {
        info!("Starting remote workflow");

        self.stage_driver(options)?;
        self.stage_artifact(artifact)?;

        let command = self.build_command();
        info!("Running driver script on remote");
        self.runner.execute(&command)?;

        info!("Retrieving solved artifact from remote");
        self.fetch_artifact()
    }

    fn stage_driver(&mut self, options: &SolveOptions) -> Result<()> {
        let script = self.renderer.render(
            &self.workflow.unsolved_path,
            &self.workflow.solved_path,
            &options.to_kwargs(),
        );
        debug!("Rendered driver script:\n{}", script);

        stage_script(&script, &self.workflow.script_path, &mut self.transfer)
            .map_err(|e| e.in_stage("staging driver script"))
    }

    fn stage_artifact<A: Artifact>(&mut self, artifact: &A) -> Result<()> {
        info!(
            "Saving unsolved artifact at {} on remote",
            self.workflow.unsolved_path
        );

        // Removed when dropped, on every path out of this function.
        let local = temp_file::<A>()?;
        artifact.save(local.path())?;

        self.transfer
            .put(local.path(), &self.workflow.unsolved_path)
            .map_err(|e| e.in_stage("staging unsolved artifact"))?;
        Ok(())
    }

    fn fetch_artifact<A: Artifact>(&mut self) -> Result<A> {
        let local = temp_file::<A>()?;

        self.transfer
            .get(&self.workflow.solved_path, local.path())
            .map_err(|e| e.in_stage("fetching solved artifact"))?;

        A::load(local.path())
    }
}

fn temp_file<A: Artifact>() -> Result<NamedTempFile> {
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(A::SUFFIX)
        .tempfile()
        .map_err(Error::Io)
}

//! The remote handler: one SSH connection, one interactive shell, one SFTP
//! session, and the workflow orchestrator built on them.
//!
//! Teardown is explicit. Call [`RemoteHandler::close`] or use
//! [`RemoteHandler::scoped`]; dropping an unclosed handler falls back to the
//! same best-effort close.

use crate::artifact::Artifact;
use crate::config::{RemoteConfig, WorkflowConfig};
use crate::error::{Error, Result};
use crate::options::SolveOptions;
use crate::remote::connection::{RemoteConnection, SshShell};
use crate::remote::diagnostics::diagnose_exit_status;
use crate::remote::orchestrator::RemoteOrchestrator;
use crate::remote::script::ScriptRenderer;
use crate::remote::shell::OutputSink;
use crate::remote::transfer::SftpTransfer;
use log::{info, warn};
use ssh2::{Channel, Session};
use std::io::Write;
use std::time::Duration;

/// Runs workflows and ad-hoc commands on one remote host.
///
/// Only one command may be in flight at a time; the handler is not meant to
/// be shared between threads.
pub struct RemoteHandler {
    connection: RemoteConnection,
    channel: Option<Channel>,
    orchestrator: RemoteOrchestrator<SshShell, SftpTransfer>,
}

impl RemoteHandler {
    /// Connects to the configured remote and opens the shell and SFTP sessions.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let connection = RemoteConnection::connect(config)?;
        Self::from_connection(connection, config.workflow.clone())
    }

    /// Uses an already connected and authenticated SSH session.
    pub fn from_session(
        session: Session,
        host: impl Into<String>,
        workflow: WorkflowConfig,
    ) -> Result<Self> {
        let connection = RemoteConnection::from_session(session, host)?;
        Self::from_connection(connection, workflow)
    }

    fn from_connection(connection: RemoteConnection, workflow: WorkflowConfig) -> Result<Self> {
        let (channel, mut shell) = connection.open_shell()?;
        let transfer = connection.open_sftp()?;

        let deadline = workflow.command_timeout.map(Duration::from_secs);
        shell.set_deadline(deadline);
        connection.set_timeout(deadline);

        let orchestrator = RemoteOrchestrator::new(workflow, shell, transfer)?;

        Ok(Self {
            connection,
            channel: Some(channel),
            orchestrator,
        })
    }

    /// Connects, runs `f`, and closes the connection on every exit path.
    pub fn scoped<T, F>(config: &RemoteConfig, f: F) -> Result<T>
    where
        F: FnOnce(&mut RemoteHandler) -> Result<T>,
    {
        let mut handler = Self::connect(config)?;
        let result = f(&mut handler);

        if let Err(e) = handler.close() {
            warn!("Failed to close connection cleanly: {}", e);
        }
        result
    }

    pub fn host(&self) -> &str {
        self.connection.host()
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        self.orchestrator.workflow()
    }

    /// Replaces the driver script renderer.
    pub fn set_renderer(&mut self, renderer: impl ScriptRenderer + 'static) {
        self.orchestrator.set_renderer(renderer);
    }

    /// Sends remote output to `sink` instead of stdout.
    pub fn set_output_sink(&mut self, sink: impl OutputSink + 'static) {
        self.orchestrator.runner_mut().set_sink(sink);
    }

    /// Runs a shell command on the remote, streaming its output.
    ///
    /// Commands share one shell, so state such as an activated environment
    /// persists into later commands and workflows.
    pub fn execute(&mut self, command: &str) -> Result<()> {
        let result = self.orchestrator.execute(command);
        let program = command.split_whitespace().next().unwrap_or(command);
        self.log_hint(&result, program);
        result
    }

    /// Solves `artifact` on the remote and returns the solved artifact.
    pub fn solve<A: Artifact>(&mut self, artifact: &A, options: &SolveOptions) -> Result<A> {
        let result = self.orchestrator.run_workflow(artifact, options);
        let interpreter = self.orchestrator.workflow().interpreter.clone();
        self.log_hint(&result, &interpreter);
        result
    }

    fn log_hint<T>(&self, result: &Result<T>, program: &str) {
        if let Err(Error::Execution { exit_code }) = result {
            if let Some(hint) = diagnose_exit_status(*exit_code, program, self.host()) {
                warn!("Hint: {}", hint);
            }
        }
    }

    /// Closes the shell and disconnects.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };

        info!("Closing connection to {}", self.host());

        let writer = self.orchestrator.runner_mut().writer_mut();
        let exit_sent = writer
            .write_all(b"exit\n")
            .and_then(|_| writer.flush())
            .map_err(Error::Io);

        let channel_closed = channel
            .send_eof()
            .and_then(|_| channel.close())
            .map_err(|e| Error::Connection(format!("Failed to close shell channel: {}", e)));

        let disconnected = self.connection.disconnect();

        exit_sent.and(channel_closed).and(disconnected)
    }
}

impl Drop for RemoteHandler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to close connection cleanly: {}", e);
        }
    }
}

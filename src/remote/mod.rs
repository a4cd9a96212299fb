//! Remote execution over an interactive SSH shell.
//!
//! This module provides the pieces needed to run a workflow on a remote
//! machine: the shell command protocol, SFTP staging, the driver script
//! builder, and the orchestrator and handler that tie them together.

pub mod connection;
pub mod diagnostics;
pub mod handler;
pub mod orchestrator;
pub mod script;
pub mod shell;
pub mod transfer;

pub use connection::{RemoteConnection, SshShell};
pub use handler::RemoteHandler;
pub use orchestrator::RemoteOrchestrator;
pub use script::{stage_script, ScriptRenderer, TemplateScript};
pub use shell::{CommandRunner, EchoScanner, LineEvent, OutputSink, ScanState, ShellSession, FINISH_TOKEN};
pub use transfer::{FileTransfer, SftpTransfer};

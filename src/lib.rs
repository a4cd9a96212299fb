//! Shellflow: run stage/execute/fetch workflows on a remote machine through
//! an interactive SSH shell.
//!
//! ```no_run
//! use shellflow::{Config, FileArtifact, RemoteHandler, SolveOptions};
//!
//! # fn main() -> shellflow::Result<()> {
//! let config = Config::load()?;
//! let (_, remote) = config.resolve_remote(None)?;
//! let model = FileArtifact::from_bytes(std::fs::read("model.nc")?);
//!
//! let solved = RemoteHandler::scoped(remote, |handler| {
//!     handler.execute("conda activate my-env")?;
//!     handler.solve(&model, &SolveOptions::new().with("solver_name", "highs"))
//! })?;
//! # let _ = solved;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod options;
pub mod remote;

pub use artifact::{Artifact, FileArtifact};
pub use config::{Config, RemoteConfig, WorkflowConfig};
pub use error::{Error, Result, ShellflowError};
pub use options::SolveOptions;
pub use remote::RemoteHandler;

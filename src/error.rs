use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellflowError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transfer failed ({context}): {message}")]
    Transfer { context: String, message: String },

    #[error("Execution on remote failed with exit status {exit_code}, see streamed output above")]
    Execution { exit_code: i32 },

    #[error("Shell protocol error: {0}")]
    Protocol(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellflowError {
    /// Builds a transfer error for the given operation description.
    pub fn transfer(context: impl Into<String>, message: impl ToString) -> Self {
        ShellflowError::Transfer {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Prefixes a transfer error's context with the workflow stage that issued it.
    ///
    /// Other variants pass through unchanged.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            ShellflowError::Transfer { context, message } => ShellflowError::Transfer {
                context: format!("{}: {}", stage, context),
                message,
            },
            other => other,
        }
    }
}

pub type Error = ShellflowError;
pub type Result<T> = std::result::Result<T, Error>;

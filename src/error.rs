use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub const MISSING_TOKEN_HELP: &str = "\
Error: missing environment variable ORG_TOKEN. You need a Personal
Access Token, with the admin:org and all repo permissions

https://docs.github.com/en/github/authenticating-to-github/creating-a-personal-access-token";

/// Failure talking to the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Transport(#[source] Box<octocrab::Error>),

    #[error("{0}")]
    Unexpected(String),
}

impl DirectoryError {
    /// Builds the error for a request answered with `status`. GitHub's
    /// error body carries no status of its own, so it is taken from the
    /// response before the body is read.
    pub fn from_response(status: u16, error: octocrab::Error) -> Self {
        match error {
            octocrab::Error::GitHub { source, .. } => DirectoryError::Api {
                status,
                message: source.message,
            },
            other => DirectoryError::Transport(Box::new(other)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::Api { status: 404, .. })
    }
}

/// Failures without a response status in hand.
impl From<octocrab::Error> for DirectoryError {
    fn from(error: octocrab::Error) -> Self {
        DirectoryError::Transport(Box::new(error))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", MISSING_TOKEN_HELP)]
    MissingToken,

    #[error("Invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Failed to apply `{change}`: {source}")]
    Apply {
        change: String,
        #[source]
        source: DirectoryError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

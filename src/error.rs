use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a remote workspace client.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{path} not found in the workspace")]
    NotFound { path: String },

    #[error("workspace API returned status {status} for {path}: {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    #[error("workspace request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("workspace client is not configured: {0}")]
    Config(String),
}

/// Errors surfaced while turning a remote resource into configuration and source files.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("{} already exists. Use --force to overwrite", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("{} is claimed by both {first} and {second}", .path.display())]
    DuplicateDestination {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("cannot convert value: {0}")]
    Conversion(String),

    #[error("notebook {path} has no language, cannot pick a file extension")]
    UnsupportedLanguage { path: String },

    #[error("cannot make {} relative to {}", .target.display(), .base.display())]
    Path { base: PathBuf, target: PathBuf },

    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for GenerateError {
    fn from(e: serde_json::Error) -> Self {
        GenerateError::Conversion(e.to_string())
    }
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| GenerateError::Io { path, source }
    }
}

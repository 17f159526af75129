//! Error types for asset discovery and build orchestration.
//!
//! Discovery and setup failures abort a build before any subprocess runs.
//! Spawn failures are not errors at this level: they travel back to the
//! caller inside [`crate::webpack::ProcessOutcome`].

use std::path::PathBuf;

use thiserror::Error;

/// A finder failed while enumerating its files
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("finder '{finder}' could not read {path}: {source}")]
    Io {
        finder: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("finder '{finder}' could not walk {path}: {source}")]
    Walk {
        finder: String,
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("finder '{finder}' failed: {message}")]
    Other { finder: String, message: String },
}

/// The working directory could not be prepared
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("package manifest not found (looked in {})", .searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    ManifestMissing { searched: Vec<PathBuf> },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to mount {source_path} at {target}: {source}")]
    Mount {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An executable could not be started at all
#[derive(Error, Debug)]
#[error("failed to spawn `{program}`: {source}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// Errors surfaced by [`crate::webpack::Webpack`]
#[derive(Error, Debug)]
pub enum WebpackError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("failed to render webpack config: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("failed to read template {path}: {source}")]
    TemplateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only produced under [`crate::webpack::Strictness::FailFast`]
    #[error("`{program}` exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    NonZeroExit { program: String, code: Option<i32> },

    /// Only produced under [`crate::webpack::Strictness::FailFast`]
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Invalid `serve` address arguments
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddrError {
    #[error("\"{0}\" is not a valid port number or address:port pair.")]
    InvalidAddrPort(String),

    #[error("{0:?} is not a valid port number.")]
    InvalidPort(String),

    #[error("\"{0}\" is not a valid IPv6 address.")]
    InvalidIpv6(String),

    #[error("address pattern failed to compile: {0}")]
    Pattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_missing_lists_searched_paths() {
        let err = SetupError::ManifestMissing {
            searched: vec![PathBuf::from("/app/package.json"), PathBuf::from("/pkg/package.json")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/app/package.json"));
        assert!(msg.contains("/pkg/package.json"));
    }

    #[test]
    fn test_non_zero_exit_message() {
        let err = WebpackError::NonZeroExit {
            program: "yarn".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "`yarn` exited with code 2");

        let err = WebpackError::NonZeroExit {
            program: "yarn".to_string(),
            code: None,
        };
        assert_eq!(err.to_string(), "`yarn` exited with a signal");
    }

    #[test]
    fn test_spawn_error_message() {
        let err = SpawnError {
            program: "/nope/yarn".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().starts_with("failed to spawn `/nope/yarn`"));
    }
}

//! Error types for rune-compose

use std::path::PathBuf;
use thiserror::Error;

/// Result type for compose operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Compose error types
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("no service was provided")]
    NoServices,

    #[error("error while running {command} for container {container}: {message}")]
    Engine {
        container: String,
        command: String,
        message: String,
    },

    #[error("`{command}` failed: {message}")]
    EngineCommand { command: String, message: String },

    #[error("{action} {path:?}: {source}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("container {name}: {source}")]
    Container {
        name: String,
        #[source]
        source: Box<ComposeError>,
    },

    #[error("service {name}: {source}")]
    Service {
        name: String,
        #[source]
        source: Box<ComposeError>,
    },

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComposeError {
    /// Wrap an error with the name of the container it concerns
    pub fn in_container(name: &str, source: ComposeError) -> Self {
        ComposeError::Container {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the name of the service it concerns
    pub fn in_service(name: &str, source: ComposeError) -> Self {
        ComposeError::Service {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    /// The error with all container/service context stripped
    pub fn root(&self) -> &ComposeError {
        match self {
            ComposeError::Container { source, .. } | ComposeError::Service { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.root(), ComposeError::Config(_))
    }

    pub fn is_engine(&self) -> bool {
        matches!(
            self.root(),
            ComposeError::Engine { .. } | ComposeError::EngineCommand { .. }
        )
    }

    pub fn is_filesystem(&self) -> bool {
        matches!(self.root(), ComposeError::Filesystem { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_strips_context() {
        let err = ComposeError::in_service(
            "web",
            ComposeError::in_container("web-1", ComposeError::Config("bad".into())),
        );
        assert!(err.is_config());
        assert!(!err.is_engine());
        assert_eq!(err.to_string(), "service web: container web-1: Invalid configuration: bad");
    }
}

//! Parsed service and container definitions consumed by `up`

use crate::error::{ComposeError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default build file name
pub const DEFAULT_BUILD_FILE: &str = "Runefile";

/// Alternative build file name (Docker compatibility)
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Image pull policy of a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PullMode {
    /// Always pull, even when the image exists locally
    Always,
    /// Pull only when the image is missing
    #[default]
    Missing,
    /// Never pull
    Never,
    /// The image is produced by a build, never pulled
    Build,
}

impl PullMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullMode::Always => "always",
            PullMode::Missing => "missing",
            PullMode::Never => "never",
            PullMode::Build => "build",
        }
    }
}

impl fmt::Display for PullMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullMode {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(PullMode::Always),
            "missing" | "if_not_present" => Ok(PullMode::Missing),
            "never" => Ok(PullMode::Never),
            "build" => Ok(PullMode::Build),
            other => Err(ComposeError::Config(format!(
                "unknown pull policy {:?} (expected always, missing, never or build)",
                other
            ))),
        }
    }
}

/// How to build a service image
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSpec {
    /// Context directory
    pub context_dir: PathBuf,
    /// Build file path
    pub build_file: PathBuf,
    /// Build arguments
    pub build_args: BTreeMap<String, String>,
    /// Target stage (for multi-stage builds)
    pub target: Option<String>,
    /// Rebuild even when the image already exists
    pub force: bool,
}

impl BuildSpec {
    /// Create a build spec for a context directory
    pub fn new(context_dir: PathBuf) -> Self {
        // Look for Runefile first, then Dockerfile
        let build_file = if context_dir.join(DEFAULT_BUILD_FILE).exists() {
            context_dir.join(DEFAULT_BUILD_FILE)
        } else {
            context_dir.join(DOCKERFILE_NAME)
        };

        Self {
            context_dir,
            build_file,
            build_args: BTreeMap::new(),
            target: None,
            force: false,
        }
    }
}

/// One runnable unit of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Container {
    /// Container name, unique within the service
    pub name: String,
    /// Arguments passed to `run`, image and command included
    pub run_args: Vec<String>,
    /// Host directories created before the container is run
    pub mkdir: Vec<PathBuf>,
}

impl Container {
    pub fn new(name: &str, run_args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            run_args,
            mkdir: Vec::new(),
        }
    }
}

/// A service as consumed by the orchestrator
#[derive(Debug, Clone, Default, Serialize)]
pub struct Service {
    pub name: String,
    pub build: Option<BuildSpec>,
    /// Resolved image reference
    pub image: String,
    pub pull_mode: PullMode,
    pub platform: Option<String>,
    pub stdin_open: bool,
    pub tty: bool,
    pub containers: Vec<Container>,
}

impl Service {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            ..Default::default()
        }
    }

    /// Add a container
    pub fn container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Set the build spec
    pub fn build(mut self, build: BuildSpec) -> Self {
        self.build = Some(build);
        self
    }

    /// Set the pull mode
    pub fn pull_mode(mut self, mode: PullMode) -> Self {
        self.pull_mode = mode;
        self
    }

    /// Set both terminal flags
    pub fn interactive(mut self, stdin_open: bool, tty: bool) -> Self {
        self.stdin_open = stdin_open;
        self.tty = tty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pull_mode_parse() {
        assert_eq!("always".parse::<PullMode>().unwrap(), PullMode::Always);
        assert_eq!("if_not_present".parse::<PullMode>().unwrap(), PullMode::Missing);
        assert_eq!(" Never ".parse::<PullMode>().unwrap(), PullMode::Never);
        assert!("sometimes".parse::<PullMode>().unwrap_err().is_config());
    }

    #[test]
    fn test_build_spec_prefers_runefile() {
        let temp = tempdir().unwrap();
        let spec = BuildSpec::new(temp.path().to_path_buf());
        assert_eq!(spec.build_file, temp.path().join(DOCKERFILE_NAME));

        std::fs::write(temp.path().join(DEFAULT_BUILD_FILE), "FROM scratch\n").unwrap();
        let spec = BuildSpec::new(temp.path().to_path_buf());
        assert_eq!(spec.build_file, temp.path().join(DEFAULT_BUILD_FILE));
    }
}

//! Options for `up` and its collaborators

use super::service::PullMode;
use crate::error::{ComposeError, Result};
use std::path::PathBuf;

/// Whether existing containers are reused or replaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecreatePolicy {
    /// Reuse existing containers as they are
    Never,
    /// Recreate existing containers
    #[default]
    Diverged,
    /// Always recreate
    Force,
}

/// Project-wide settings shared by every command
#[derive(Debug, Clone, Default)]
pub struct ComposerOptions {
    /// Project name, stamped on every created container
    pub project_name: String,
    /// Env file passed to every created container
    pub env_file: Option<PathBuf>,
    /// Log the full engine command line at debug level
    pub debug_print_full: bool,
    /// Where per-container scratch directories go (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
}

impl ComposerOptions {
    pub fn new(project_name: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            ..Default::default()
        }
    }
}

/// Options recognized by `up`
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Do not build images, even when missing
    pub no_build: bool,
    /// Build images before starting containers
    pub force_build: bool,
    /// Return after starting containers instead of attaching to logs
    pub detach: bool,
    /// Stop all containers when any container stops
    pub abort_on_container_exit: bool,
    /// Pull without progress output
    pub quiet_pull: bool,
    /// Overrides every service's pull policy
    pub pull: Option<PullMode>,
    pub no_color: bool,
    pub no_log_prefix: bool,
    /// Recreate containers even when they already exist
    pub force_recreate: bool,
    /// Keep existing containers
    pub no_recreate: bool,
}

impl UpOptions {
    /// Reject contradictory flag combinations
    pub fn validate(&self) -> Result<()> {
        if self.force_recreate && self.no_recreate {
            return Err(ComposeError::Config(
                "flag --force-recreate and --no-recreate cannot be specified together".to_string(),
            ));
        }
        if self.detach && self.abort_on_container_exit {
            return Err(ComposeError::Config(
                "flag --abort-on-container-exit cannot be specified together with --detach"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn recreate_policy(&self) -> RecreatePolicy {
        if self.force_recreate {
            RecreatePolicy::Force
        } else if self.no_recreate {
            RecreatePolicy::Never
        } else {
            RecreatePolicy::Diverged
        }
    }
}

/// Options handed to the log-attach collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogsOptions {
    pub follow: bool,
    pub abort_on_container_exit: bool,
    pub no_color: bool,
    pub no_log_prefix: bool,
    /// Attach to containers that are already running instead of only new ones
    pub latest_run: bool,
}

/// Options handed to image builds
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub no_cache: bool,
    /// Extra `KEY=VALUE` build args applied on top of the service's own
    pub args: Vec<String>,
}

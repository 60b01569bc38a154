//! External container engine abstraction.
//!
//! The orchestrator never touches containers or images itself; every
//! operation goes through an [`Engine`]. Production code uses
//! [`CliEngine`], which drives a Docker-compatible command line (`rune`,
//! `docker`, `nerdctl`). Tests can provide their own implementation that
//! records calls instead of spawning processes.

pub mod cli;
pub mod logs;

pub use cli::CliEngine;

use crate::compose::{BuildOptions, LogsOptions, PullMode, Registry, Service};
use crate::error::Result;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

/// Boxed future returned by [`Engine`] methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One engine invocation, without the program name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `start <id>`
    pub fn start(id: &str) -> Self {
        Self::new(["start", id])
    }

    /// `run <args...>`
    pub fn run(run_args: &[String]) -> Self {
        let mut args = Vec::with_capacity(run_args.len() + 1);
        args.push("run".to_string());
        args.extend(run_args.iter().cloned());
        Self { args }
    }

    /// Subcommand name (`run`, `start`, ...)
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Standard stream wiring for `start`/`run` invocations.
///
/// stderr is always inherited so engine diagnostics are never swallowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpStdio {
    /// The container runs detached, so its stdout is not forwarded
    pub detach: bool,
    /// Forward our stdin to the engine
    pub stdin_open: bool,
}

impl UpStdio {
    pub fn stdin(&self) -> Stdio {
        if self.stdin_open {
            Stdio::inherit()
        } else {
            Stdio::null()
        }
    }

    pub fn stdout(&self) -> Stdio {
        if self.detach {
            Stdio::null()
        } else {
            Stdio::inherit()
        }
    }

    pub fn stderr(&self) -> Stdio {
        Stdio::inherit()
    }
}

/// Operations `up` needs from a container engine
pub trait Engine: Send + Sync {
    /// Whether the image exists locally
    fn image_exists<'a>(&'a self, image: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Build the image of a service from its build spec
    fn build_image<'a>(
        &'a self,
        service: &'a Service,
        options: &'a BuildOptions,
    ) -> BoxFuture<'a, Result<()>>;

    /// Make the service image available according to `pull_mode`
    fn ensure_image<'a>(
        &'a self,
        service: &'a Service,
        pull_mode: PullMode,
        quiet: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// ID of the container called `name` in `service`, if one exists
    fn container_id<'a>(
        &'a self,
        name: &'a str,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>>;

    /// Forcibly remove a container by name
    fn remove_container<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Run one `start`/`run` invocation to completion.
    ///
    /// Nothing is captured; failures are tagged with `container`.
    fn execute<'a>(
        &'a self,
        command: EngineCommand,
        container: &'a str,
        stdio: UpStdio,
    ) -> BoxFuture<'a, Result<()>>;

    /// Stream logs of the given services until the streams end
    fn attach_logs<'a>(
        &'a self,
        options: &'a LogsOptions,
        services: &'a [String],
    ) -> BoxFuture<'a, Result<()>>;

    /// Forcibly stop every registered container, best effort.
    ///
    /// Must be idempotent: `up` may call it twice for the same registry.
    fn stop_containers<'a>(&'a self, registry: &'a Registry) -> BoxFuture<'a, ()>;
}

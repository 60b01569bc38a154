//! Engine backed by a Docker-compatible command line

use super::{logs, BoxFuture, Engine, EngineCommand, UpStdio};
use crate::compose::{labels, BuildOptions, LogsOptions, PullMode, Registry, Service};
use crate::error::{ComposeError, Result};
use serde::Deserialize;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::task::JoinSet;

/// Default engine binary
pub const DEFAULT_ENGINE_BIN: &str = "rune";

/// One line of `ps --format '{{json .}}'`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PsEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
}

impl PsEntry {
    /// Whether `name` is one of the entry's (comma separated) names
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .split(',')
            .any(|n| n.trim().trim_start_matches('/') == name)
    }

    pub fn display_name(&self) -> &str {
        self.names
            .split(',')
            .next()
            .map(|n| n.trim().trim_start_matches('/'))
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Parse `ps` JSON-lines output
pub(crate) fn parse_ps_output(stdout: &str) -> Result<Vec<PsEntry>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(ComposeError::from))
        .collect()
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Engine that shells out to `rune`, `docker` or `nerdctl`
#[derive(Debug, Clone)]
pub struct CliEngine {
    binary: String,
    project_name: String,
}

impl CliEngine {
    pub fn new(binary: &str, project_name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            project_name: project_name.to_string(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub(crate) fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd
    }

    /// Run to completion with the given stdout wiring; stderr is inherited
    async fn run_status(&self, args: &[String], stdout: Stdio) -> Result<ExitStatus> {
        self.command(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ComposeError::EngineCommand {
                command: format!("{} {}", self.binary, args.join(" ")),
                message: e.to_string(),
            })
    }

    /// Run and fail on a non-zero exit
    async fn run_checked(&self, args: &[String], stdout: Stdio) -> Result<()> {
        let status = self.run_status(args, stdout).await?;
        if !status.success() {
            return Err(ComposeError::EngineCommand {
                command: format!("{} {}", self.binary, args.join(" ")),
                message: describe_status(status),
            });
        }
        Ok(())
    }

    /// Containers of one service of this project
    pub(crate) async fn list_service_containers(
        &self,
        service: &str,
        all: bool,
    ) -> Result<Vec<PsEntry>> {
        let mut args = vec!["ps".to_string()];
        if all {
            args.push("-a".to_string());
        }
        args.extend([
            "--no-trunc".to_string(),
            "--filter".to_string(),
            format!("label={}={}", labels::COMPOSE_PROJECT, self.project_name),
            "--filter".to_string(),
            format!("label={}={}", labels::COMPOSE_SERVICE, service),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ]);

        let output = self
            .command(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ComposeError::EngineCommand {
                command: format!("{} ps", self.binary),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ComposeError::EngineCommand {
                command: format!("{} ps", self.binary),
                message: format!(
                    "{}: {}",
                    describe_status(output.status),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn pull(&self, service: &Service, quiet: bool) -> Result<()> {
        tracing::info!("Pulling image {}", service.image);
        let mut args = vec!["pull".to_string()];
        if quiet {
            args.push("--quiet".to_string());
        }
        if let Some(ref platform) = service.platform {
            args.push(format!("--platform={}", platform));
        }
        args.push(service.image.clone());

        let stdout = if quiet { Stdio::null() } else { Stdio::inherit() };
        self.run_checked(&args, stdout).await
    }
}

impl Engine for CliEngine {
    fn image_exists<'a>(&'a self, image: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let args = vec!["image".to_string(), "inspect".to_string(), image.to_string()];
            let status = self
                .command(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| ComposeError::EngineCommand {
                    command: format!("{} image inspect", self.binary),
                    message: e.to_string(),
                })?;
            Ok(status.success())
        })
    }

    fn build_image<'a>(
        &'a self,
        service: &'a Service,
        options: &'a BuildOptions,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let build = service.build.as_ref().ok_or_else(|| {
                ComposeError::Config(format!("service {} has no build section", service.name))
            })?;

            tracing::info!("Building image {}", service.image);
            let mut args = vec![
                "build".to_string(),
                "-t".to_string(),
                service.image.clone(),
                "-f".to_string(),
                build.build_file.display().to_string(),
            ];
            if let Some(ref target) = build.target {
                args.push(format!("--target={}", target));
            }
            if let Some(ref platform) = service.platform {
                args.push(format!("--platform={}", platform));
            }
            for (key, value) in &build.build_args {
                args.push(format!("--build-arg={}={}", key, value));
            }
            for arg in &options.args {
                args.push(format!("--build-arg={}", arg));
            }
            if options.no_cache {
                args.push("--no-cache".to_string());
            }
            args.push(build.context_dir.display().to_string());

            self.run_checked(&args, Stdio::inherit()).await
        })
    }

    fn ensure_image<'a>(
        &'a self,
        service: &'a Service,
        pull_mode: PullMode,
        quiet: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match pull_mode {
                PullMode::Always => self.pull(service, quiet).await,
                PullMode::Missing => {
                    if self.image_exists(&service.image).await? {
                        return Ok(());
                    }
                    self.pull(service, quiet).await
                }
                PullMode::Never | PullMode::Build => {
                    if self.image_exists(&service.image).await? {
                        return Ok(());
                    }
                    Err(ComposeError::EngineCommand {
                        command: format!("{} pull", self.binary),
                        message: format!(
                            "image {} not present locally and pull policy is {}",
                            service.image, pull_mode
                        ),
                    })
                }
            }
        })
    }

    fn container_id<'a>(
        &'a self,
        name: &'a str,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let entries = self.list_service_containers(service, true).await?;
            Ok(entries
                .into_iter()
                .find(|entry| entry.has_name(name))
                .map(|entry| entry.id)
                .filter(|id| !id.is_empty()))
        })
    }

    fn remove_container<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let args = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
            self.run_checked(&args, Stdio::null()).await
        })
    }

    fn execute<'a>(
        &'a self,
        command: EngineCommand,
        container: &'a str,
        stdio: UpStdio,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tracing::info!(container = %container, "Running {} {}", self.binary, command.subcommand());

            let status = self
                .command(&command.args)
                .stdin(stdio.stdin())
                .stdout(stdio.stdout())
                .stderr(stdio.stderr())
                .status()
                .await
                .map_err(|e| ComposeError::Engine {
                    container: container.to_string(),
                    command: command.subcommand().to_string(),
                    message: e.to_string(),
                })?;

            if !status.success() {
                return Err(ComposeError::Engine {
                    container: container.to_string(),
                    command: command.subcommand().to_string(),
                    message: describe_status(status),
                });
            }
            Ok(())
        })
    }

    fn attach_logs<'a>(
        &'a self,
        options: &'a LogsOptions,
        services: &'a [String],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(logs::attach(self, options, services))
    }

    fn stop_containers<'a>(&'a self, registry: &'a Registry) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let containers = match registry.snapshot() {
                Ok(containers) => containers,
                Err(e) => {
                    tracing::warn!("Cannot stop containers: {}", e);
                    return;
                }
            };

            let mut stops = JoinSet::new();
            for (id, container) in containers {
                let engine = self.clone();
                stops.spawn(async move {
                    tracing::info!("Stopping container {}", container.name);
                    let args = vec!["stop".to_string(), id];
                    if let Err(e) = engine.run_checked(&args, Stdio::null()).await {
                        tracing::warn!("Failed to stop container {}: {}", container.name, e);
                    }
                });
            }

            while let Some(res) = stops.join_next().await {
                if let Err(e) = res {
                    tracing::warn!("Stop task failed: {}", e);
                }
            }
        })
    }
}

//! rune-compose - Compose-style `up` for Rune
//!
//! This is the CLI entry point.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rune_compose::compose::{
    ComposeParser, Composer, ComposerOptions, PullMode, Service, UpOptions,
};
use rune_compose::engine::cli::DEFAULT_ENGINE_BIN;
use rune_compose::engine::CliEngine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// rune-compose - run multi-container projects
#[derive(Parser)]
#[command(name = "rune-compose")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Compose-style multi-container projects for Rune", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Also log full engine command lines (implies --debug)
    #[arg(long, global = true)]
    debug_full: bool,

    /// Compose file
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Project name (defaults to the compose file's `name` or directory name)
    #[arg(short, long, global = true)]
    project_name: Option<String>,

    /// Env file passed to every container
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Engine binary (rune, docker, nerdctl, ...)
    #[arg(long, global = true, default_value = DEFAULT_ENGINE_BIN)]
    engine: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start containers
    Up(UpArgs),

    /// Print the resolved services as JSON
    Config,
}

#[derive(Args)]
struct UpArgs {
    /// Run in detached mode
    #[arg(short, long)]
    detach: bool,
    /// Build images before starting containers
    #[arg(long)]
    build: bool,
    /// Don't build an image, even if it's missing
    #[arg(long)]
    no_build: bool,
    /// Stop all containers if any container was stopped
    #[arg(long)]
    abort_on_container_exit: bool,
    /// Pull without printing progress information
    #[arg(long)]
    quiet_pull: bool,
    /// Pull image before running (always, missing, never, build)
    #[arg(long)]
    pull: Option<String>,
    /// Produce monochrome output
    #[arg(long)]
    no_color: bool,
    /// Don't print prefix in logs
    #[arg(long)]
    no_log_prefix: bool,
    /// Recreate containers even if they exist
    #[arg(long)]
    force_recreate: bool,
    /// Don't recreate containers if they exist
    #[arg(long)]
    no_recreate: bool,
    /// Services to start (all when empty)
    services: Vec<String>,
}

impl UpArgs {
    fn options(&self) -> anyhow::Result<UpOptions> {
        let pull = self
            .pull
            .as_deref()
            .map(str::parse::<PullMode>)
            .transpose()?;

        Ok(UpOptions {
            no_build: self.no_build,
            force_build: self.build,
            detach: self.detach,
            abort_on_container_exit: self.abort_on_container_exit,
            quiet_pull: self.quiet_pull,
            pull,
            no_color: self.no_color,
            no_log_prefix: self.no_log_prefix,
            force_recreate: self.force_recreate,
            no_recreate: self.no_recreate,
        })
    }
}

struct Project {
    name: String,
    services: Vec<Service>,
}

fn load_project(cli: &Cli) -> anyhow::Result<Project> {
    let working_dir = std::env::current_dir()?;
    let compose_file = cli.file.clone().unwrap_or_else(|| {
        ComposeParser::find_compose_file(&working_dir)
            .unwrap_or_else(|| working_dir.join("compose.yaml"))
    });
    let project_dir = compose_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| working_dir.clone());

    let mut config = ComposeParser::parse_file(&compose_file)
        .with_context(|| format!("loading {}", compose_file.display()))?;
    let env: HashMap<String, String> = std::env::vars().collect();
    ComposeParser::interpolate(&mut config, &env);

    let name = cli
        .project_name
        .clone()
        .or_else(|| config.name.clone())
        .unwrap_or_else(|| {
            project_dir
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("default")
                .to_lowercase()
        });

    let services = ComposeParser::services(&config, &name, &project_dir)?;
    Ok(Project { name, services })
}

fn select_services(services: Vec<Service>, wanted: &[String]) -> anyhow::Result<Vec<Service>> {
    if wanted.is_empty() {
        return Ok(services);
    }
    for name in wanted {
        if !services.iter().any(|s| &s.name == name) {
            bail!("no such service: {}", name);
        }
    }
    Ok(services
        .into_iter()
        .filter(|s| wanted.contains(&s.name))
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug || cli.debug_full {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let project = load_project(&cli)?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&project.services)?);
        }

        Commands::Up(ref args) => {
            let up_options = args.options()?;
            let services = select_services(project.services, &args.services)?;

            let engine = CliEngine::new(&cli.engine, &project.name);
            let composer = Composer::new(
                Arc::new(engine),
                ComposerOptions {
                    project_name: project.name.clone(),
                    env_file: cli.env_file.clone(),
                    debug_print_full: cli.debug_full,
                    scratch_dir: None,
                },
            );

            // Ctrl-C ends the log attach; containers are then stopped
            let interrupt = composer.interrupt_handle();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("failed to listen for Ctrl+C: {}", e);
                    return;
                }
                interrupt.notify_one();
            });

            composer.up(&services, &up_options).await?;
        }
    }

    Ok(())
}

//! Aggregated log streaming for the CLI engine

use super::cli::{CliEngine, PsEntry};
use crate::compose::LogsOptions;
use crate::error::{ComposeError, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinSet;

/// ANSI colors cycled through for container prefixes
const COLORS: &[u8] = &[36, 33, 32, 35, 34, 96, 93, 92, 95, 94];

/// Formats log lines as `name | line`
#[derive(Debug, Clone)]
pub struct LogPrefixer {
    name: String,
    width: usize,
    color: Option<u8>,
    no_prefix: bool,
}

impl LogPrefixer {
    pub fn new(name: &str, index: usize, width: usize, options: &LogsOptions) -> Self {
        Self {
            name: name.to_string(),
            width,
            color: (!options.no_color).then(|| COLORS[index % COLORS.len()]),
            no_prefix: options.no_log_prefix,
        }
    }

    pub fn format(&self, line: &str) -> String {
        if self.no_prefix {
            return line.to_string();
        }
        let prefix = format!("{:<width$} |", self.name, width = self.width);
        match self.color {
            Some(color) => format!("\x1b[{}m{}\x1b[0m {}", color, prefix, line),
            None => format!("{} {}", prefix, line),
        }
    }
}

async fn forward_lines<R>(reader: R, prefixer: LogPrefixer)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("{}", prefixer.format(&line));
    }
}

/// Stream one container's logs until its `logs` process exits
async fn follow_container(
    engine: CliEngine,
    entry: PsEntry,
    prefixer: LogPrefixer,
    follow: bool,
) -> Result<()> {
    let mut args = vec!["logs".to_string()];
    if follow {
        args.push("--follow".to_string());
    }
    args.push(entry.id.clone());

    let mut child = engine
        .command(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ComposeError::EngineCommand {
            command: format!("{} logs {}", engine.binary(), entry.id),
            message: e.to_string(),
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out = async {
        if let Some(stdout) = stdout {
            forward_lines(stdout, prefixer.clone()).await;
        }
    };
    let err = async {
        if let Some(stderr) = stderr {
            forward_lines(stderr, prefixer.clone()).await;
        }
    };
    tokio::join!(out, err);

    let status = child.wait().await?;
    tracing::debug!(
        container = %entry.display_name(),
        success = status.success(),
        "log stream ended"
    );
    Ok(())
}

/// Attach to the logs of every container of `services`.
///
/// Returns when all streams ended, or when the first one ends if
/// `abort_on_container_exit` is set.
pub async fn attach(engine: &CliEngine, options: &LogsOptions, services: &[String]) -> Result<()> {
    let mut entries = Vec::new();
    for service in services {
        let found = engine
            .list_service_containers(service, !options.latest_run)
            .await
            .map_err(|e| ComposeError::in_service(service, e))?;
        entries.extend(found);
    }

    if entries.is_empty() {
        tracing::warn!("No containers to attach to");
        return Ok(());
    }

    let width = entries
        .iter()
        .map(|e| e.display_name().len())
        .max()
        .unwrap_or_default();

    let mut streams = JoinSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let prefixer = LogPrefixer::new(entry.display_name(), index, width, options);
        streams.spawn(follow_container(
            engine.clone(),
            entry,
            prefixer,
            options.follow,
        ));
    }

    while let Some(res) = streams.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Log stream failed: {}", e),
            Err(e) => tracing::warn!("Log task failed: {}", e),
        }

        if options.abort_on_container_exit {
            tracing::info!("A container exited, aborting");
            // dropping the remaining tasks kills their `logs` processes
            streams.shutdown().await;
            break;
        }
    }

    Ok(())
}

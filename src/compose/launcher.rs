//! Per-container launch: reuse, recreate or create

use super::labels;
use super::options::{ComposerOptions, RecreatePolicy};
use super::service::{Container, Service};
use crate::engine::{Engine, EngineCommand, UpStdio};
use crate::error::{ComposeError, Result};
use std::path::Path;

/// Name of the container ID file inside the scratch directory
const CID_FILE: &str = "cid";

/// Bring up one container of `service` and return its ID.
///
/// The service image must already be provisioned.
pub async fn up_service_container(
    engine: &dyn Engine,
    options: &ComposerOptions,
    service: &Service,
    container: &Container,
    recreate: RecreatePolicy,
) -> Result<String> {
    launch(engine, options, service, container, recreate)
        .await
        .map_err(|e| ComposeError::in_container(&container.name, e))
}

async fn launch(
    engine: &dyn Engine,
    options: &ComposerOptions,
    service: &Service,
    container: &Container,
    recreate: RecreatePolicy,
) -> Result<String> {
    let existing = engine.container_id(&container.name, &service.name).await?;

    // TODO: drop once -i and -t can be wired independently
    if service.stdin_open != service.tty {
        return Err(ComposeError::Config(
            "currently stdin_open (-i) and tty (-t) should be same".to_string(),
        ));
    }

    let detach = !service.stdin_open && !service.tty;
    let mut run_args = container.run_args.clone();
    if detach {
        run_args.insert(0, "-d".to_string());
    }
    let stdio = UpStdio {
        detach,
        stdin_open: service.stdin_open,
    };

    if let Some(id) = existing {
        if recreate == RecreatePolicy::Never {
            engine
                .execute(EngineCommand::start(&id), &container.name, stdio)
                .await?;
            return Ok(id);
        }

        tracing::debug!("Container {} already exists, deleting", container.name);
        engine.remove_container(&container.name).await?;
        tracing::info!("Re-creating container {}", container.name);
    } else {
        tracing::info!("Creating container {}", container.name);
    }

    for dir in &container.mkdir {
        tracing::debug!("Creating a directory {:?}", dir);
        tokio::fs::create_dir_all(dir).await.map_err(|source| ComposeError::Filesystem {
            action: "failed to create a directory",
            path: dir.clone(),
            source,
        })?;
    }

    let scratch_root = options
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    // removed on drop, whichever way this function returns
    let scratch = tempfile::Builder::new()
        .prefix("compose-")
        .tempdir_in(&scratch_root)
        .map_err(|source| ComposeError::Filesystem {
            action: "failed to create a scratch directory in",
            path: scratch_root.clone(),
            source,
        })?;
    let cid_file = scratch.path().join(CID_FILE);

    let mut injected = vec![format!("--cidfile={}", cid_file.display())];
    if let Some(ref env_file) = options.env_file {
        injected.push(format!("--env-file={}", env_file.display()));
    }
    injected.push(labels::run_flag(labels::COMPOSE_PROJECT, &options.project_name));
    injected.push(labels::run_flag(labels::COMPOSE_SERVICE, &service.name));
    injected.extend(run_args);
    let run_args = injected;
    if options.debug_print_full {
        tracing::debug!("Running run {:?}", run_args);
    }

    engine
        .execute(EngineCommand::run(&run_args), &container.name, stdio)
        .await?;

    read_container_id(&cid_file).await
}

async fn read_container_id(path: &Path) -> Result<String> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|source| ComposeError::Filesystem {
        action: "failed to read container ID file",
        path: path.to_path_buf(),
        source,
    })?;

    let id = raw.trim();
    if id.is_empty() {
        return Err(ComposeError::Internal(format!(
            "container ID file {:?} is empty",
            path
        )));
    }
    Ok(id.to_string())
}

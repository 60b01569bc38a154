//! Compose `up` orchestrator

use super::launcher::up_service_container;
use super::options::{BuildOptions, ComposerOptions, LogsOptions, RecreatePolicy, UpOptions};
use super::provision::ensure_service_image;
use super::registry::Registry;
use super::service::Service;
use crate::engine::Engine;
use crate::error::{ComposeError, Result};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// Stops every registered container when dropped, unless `run` already did.
///
/// Covers error returns, panics and cancellation of the attached phase.
struct StopOnExit {
    engine: Arc<dyn Engine>,
    registry: Option<Arc<Registry>>,
}

impl StopOnExit {
    fn new(engine: Arc<dyn Engine>, registry: Arc<Registry>) -> Self {
        Self {
            engine,
            registry: Some(registry),
        }
    }

    async fn run(mut self) {
        if let Some(registry) = self.registry.take() {
            self.engine.stop_containers(&registry).await;
        }
    }
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        let Some(registry) = self.registry.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move {
                    engine.stop_containers(&registry).await;
                });
            }
            Err(_) => tracing::warn!("No runtime left to stop containers on exit"),
        }
    }
}

/// Brings up a project's services through an [`Engine`]
pub struct Composer {
    engine: Arc<dyn Engine>,
    options: Arc<ComposerOptions>,
    interrupt: Arc<Notify>,
}

impl Composer {
    /// Create a new composer
    pub fn new(engine: Arc<dyn Engine>, options: ComposerOptions) -> Self {
        Self {
            engine,
            options: Arc::new(options),
            interrupt: Arc::new(Notify::new()),
        }
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    /// Handle that ends the log attach of an attached `up`.
    ///
    /// An interrupted attach counts as a finished one, so containers are
    /// still stopped.
    pub fn interrupt_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.interrupt)
    }

    /// Provision images, start containers and, unless detached, follow logs
    pub async fn up(&self, services: &[Service], options: &UpOptions) -> Result<()> {
        self.up_with_registry(services, options, Arc::new(Registry::new()))
            .await
    }

    /// Like [`Composer::up`], recording launched containers in `registry`
    pub async fn up_with_registry(
        &self,
        services: &[Service],
        options: &UpOptions,
        registry: Arc<Registry>,
    ) -> Result<()> {
        if services.is_empty() {
            return Err(ComposeError::NoServices);
        }
        options.validate()?;

        // sequential so build and pull output does not interleave
        for service in services {
            ensure_service_image(
                self.engine.as_ref(),
                service,
                !options.no_build,
                options.force_build,
                &BuildOptions::default(),
                options.quiet_pull,
                options.pull,
            )
            .await?;
        }

        let recreate = options.recreate_policy();

        let mut service_names = Vec::with_capacity(services.len());
        for service in services {
            service_names.push(service.name.clone());
            self.launch_service(service, recreate, &registry).await?;
        }

        if options.detach {
            return Ok(());
        }

        // logs may end with an error, so stop from here rather than
        // relying on Ctrl-C reaching the engine
        let guard = options
            .abort_on_container_exit
            .then(|| StopOnExit::new(Arc::clone(&self.engine), Arc::clone(&registry)));

        tracing::info!("Attaching to logs");
        let logs_options = LogsOptions {
            follow: true,
            abort_on_container_exit: options.abort_on_container_exit,
            no_color: options.no_color,
            no_log_prefix: options.no_log_prefix,
            latest_run: recreate == RecreatePolicy::Never,
        };
        let attached = self.attach_logs(&logs_options, &service_names).await;

        if let Some(guard) = guard {
            guard.run().await;
        }
        attached?;

        // TODO: stop gracefully, in reverse dependency order
        tracing::info!("Stopping containers (forcibly)");
        self.engine.stop_containers(&registry).await;
        Ok(())
    }

    /// Launch every container of `service` concurrently.
    ///
    /// A failing container does not cancel its siblings; the first error is
    /// reported once all of them finished.
    async fn launch_service(
        &self,
        service: &Service,
        recreate: RecreatePolicy,
        registry: &Arc<Registry>,
    ) -> Result<()> {
        let shared = Arc::new(service.clone());
        let mut batch = JoinSet::new();

        for container in &service.containers {
            let engine = Arc::clone(&self.engine);
            let options = Arc::clone(&self.options);
            let service = Arc::clone(&shared);
            let registry = Arc::clone(registry);
            let container = container.clone();

            batch.spawn(async move {
                let id = up_service_container(
                    engine.as_ref(),
                    &options,
                    &service,
                    &container,
                    recreate,
                )
                .await?;
                registry.insert(&id, container)?;
                Ok::<_, ComposeError>(id)
            });
        }

        let mut first_error = None;
        while let Some(joined) = batch.join_next().await {
            let outcome = joined
                .map_err(|e| ComposeError::Internal(format!("container launch task failed: {}", e)))
                .and_then(|res| res);

            match outcome {
                Ok(id) => tracing::debug!(service = %service.name, id = %id, "container up"),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::warn!("{}", e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn attach_logs(&self, options: &LogsOptions, services: &[String]) -> Result<()> {
        tokio::select! {
            res = self.engine.attach_logs(options, services) => res,
            _ = self.interrupt.notified() => {
                tracing::info!("Interrupted, detaching from logs");
                Ok(())
            }
        }
    }
}

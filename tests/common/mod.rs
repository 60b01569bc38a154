#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use rune_compose::compose::{
    BuildOptions, Composer, ComposerOptions, Container, LogsOptions, PullMode, Registry, Service,
};
use rune_compose::engine::{BoxFuture, Engine, EngineCommand, UpStdio};
use rune_compose::{ComposeError, Result};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests; output only shows for failing tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Every engine call the fake saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ImageExists(String),
    Build(String),
    Ensure(String, PullMode),
    ContainerId(String),
    Remove(String),
    Start(String, UpStdio),
    Run(String, Vec<String>),
    AttachLogs(LogsOptions, Vec<String>),
    Stop(Vec<String>),
}

/// What `attach_logs` does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsBehaviour {
    Return,
    Fail,
    Hang,
}

/// In-memory engine that records calls and hands out `cid-N` IDs
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    images: HashSet<String>,
    existing: HashMap<String, String>,
    failing_runs: HashSet<String>,
    failing_images: HashSet<String>,
    run_delay: Duration,
    logs: LogsBehaviour,
    next_id: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            images: HashSet::new(),
            existing: HashMap::new(),
            failing_runs: HashSet::new(),
            failing_images: HashSet::new(),
            run_delay: Duration::ZERO,
            logs: LogsBehaviour::Return,
            next_id: AtomicUsize::new(1),
        }
    }

    /// Image that exists locally
    pub fn with_image(mut self, image: &str) -> Self {
        self.images.insert(image.to_string());
        self
    }

    /// Container that already exists under `id`
    pub fn with_container(mut self, name: &str, id: &str) -> Self {
        self.existing.insert(name.to_string(), id.to_string());
        self
    }

    /// `run` fails for this container
    pub fn failing_run(mut self, name: &str) -> Self {
        self.failing_runs.insert(name.to_string());
        self
    }

    /// `ensure_image` fails for this image
    pub fn failing_image(mut self, image: &str) -> Self {
        self.failing_images.insert(image.to_string());
        self
    }

    /// Every `run` sleeps this long, so sibling launches overlap
    pub fn run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    pub fn logs(mut self, behaviour: LogsBehaviour) -> Self {
        self.logs = behaviour;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn runs(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run(name, args) => Some((name, args)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

fn cidfile(args: &[String]) -> Option<&str> {
    args.iter().find_map(|a| a.strip_prefix("--cidfile="))
}

impl Engine for FakeEngine {
    fn image_exists<'a>(&'a self, image: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.record(Call::ImageExists(image.to_string()));
            Ok(self.images.contains(image))
        })
    }

    fn build_image<'a>(
        &'a self,
        service: &'a Service,
        _options: &'a BuildOptions,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Call::Build(service.image.clone()));
            Ok(())
        })
    }

    fn ensure_image<'a>(
        &'a self,
        service: &'a Service,
        pull_mode: PullMode,
        _quiet: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Call::Ensure(service.image.clone(), pull_mode));
            if self.failing_images.contains(&service.image) {
                return Err(ComposeError::EngineCommand {
                    command: "pull".to_string(),
                    message: format!("pull access denied for {}", service.image),
                });
            }
            Ok(())
        })
    }

    fn container_id<'a>(
        &'a self,
        name: &'a str,
        _service: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            self.record(Call::ContainerId(name.to_string()));
            Ok(self.existing.get(name).cloned())
        })
    }

    fn remove_container<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Call::Remove(name.to_string()));
            Ok(())
        })
    }

    fn execute<'a>(
        &'a self,
        command: EngineCommand,
        container: &'a str,
        stdio: UpStdio,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match command.subcommand() {
                "start" => {
                    self.record(Call::Start(command.args[1].clone(), stdio));
                    Ok(())
                }
                "run" => {
                    let args = command.args[1..].to_vec();
                    self.record(Call::Run(container.to_string(), args.clone()));
                    if !self.run_delay.is_zero() {
                        tokio::time::sleep(self.run_delay).await;
                    }
                    if self.failing_runs.contains(container) {
                        return Err(ComposeError::Engine {
                            container: container.to_string(),
                            command: "run".to_string(),
                            message: "exit status 125".to_string(),
                        });
                    }
                    let id = format!("cid-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                    if let Some(path) = cidfile(&args) {
                        std::fs::write(Path::new(path), format!("{}\n", id))?;
                    }
                    Ok(())
                }
                other => panic!("unexpected engine command {}", other),
            }
        })
    }

    fn attach_logs<'a>(
        &'a self,
        options: &'a LogsOptions,
        services: &'a [String],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(Call::AttachLogs(options.clone(), services.to_vec()));
            match self.logs {
                LogsBehaviour::Return => Ok(()),
                LogsBehaviour::Fail => Err(ComposeError::EngineCommand {
                    command: "logs".to_string(),
                    message: "exit status 1".to_string(),
                }),
                LogsBehaviour::Hang => std::future::pending().await,
            }
        })
    }

    fn stop_containers<'a>(&'a self, registry: &'a Registry) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Stop(registry.ids().unwrap_or_default()));
        })
    }
}

/// Composer over `engine` whose scratch directories go into `scratch`
pub fn composer(engine: &Arc<FakeEngine>, scratch: &Path) -> Composer {
    Composer::new(
        Arc::clone(engine) as Arc<dyn Engine>,
        ComposerOptions {
            project_name: "proj".to_string(),
            env_file: None,
            debug_print_full: false,
            scratch_dir: Some(scratch.to_path_buf()),
        },
    )
}

/// Detached service (`stdin_open` and `tty` both false) with one container
/// per name
pub fn service(name: &str, containers: &[&str]) -> Service {
    let mut service = Service::new(name, &format!("{}:latest", name));
    for container in containers {
        service = service.container(Container::new(
            container,
            vec![format!("--name={}", container), format!("{}:latest", name)],
        ));
    }
    service
}

/// Number of entries left in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

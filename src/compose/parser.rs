//! Compose file parser

use super::config::{
    BuildConfig, CommandConfig, ComposeConfig, EnvFileConfig, EnvironmentConfig, LabelsConfig,
    PortConfig, ServiceConfig, VolumeMount,
};
use super::service::{BuildSpec, Container, PullMode, Service};
use crate::error::{ComposeError, Result};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default compose file names
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Compose file parser
pub struct ComposeParser;

impl ComposeParser {
    /// Find compose file in directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_COMPOSE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Parse compose file from path
    pub fn parse_file(path: &Path) -> Result<ComposeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComposeError::ComposeParse(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse compose file from string
    pub fn parse_str(content: &str) -> Result<ComposeConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| ComposeError::ComposeParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Validate compose configuration
    pub fn validate(config: &ComposeConfig) -> Result<()> {
        if config.services.is_empty() {
            return Err(ComposeError::ComposeParse(
                "no services defined".to_string(),
            ));
        }

        for (name, service) in &config.services {
            // Service must have either image or build
            if service.image.is_none() && service.build.is_none() {
                return Err(ComposeError::ComposeParse(format!(
                    "Service '{}' must have either 'image' or 'build' specified",
                    name
                )));
            }

            if let Some(ref depends) = service.depends_on {
                for dep in depends.services() {
                    if !config.services.contains_key(&dep) {
                        return Err(ComposeError::ComposeParse(format!(
                            "Service '{}' depends on unknown service '{}'",
                            name, dep
                        )));
                    }
                }
            }

            if service.container_name.is_some() && replicas(service) > 1 {
                return Err(ComposeError::ComposeParse(format!(
                    "Service '{}' sets container_name and cannot be scaled beyond 1",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Interpolate environment variables in image names, environment
    /// values and commands
    pub fn interpolate(config: &mut ComposeConfig, env: &HashMap<String, String>) {
        for service in config.services.values_mut() {
            if let Some(ref mut image) = service.image {
                *image = interpolate_string(image, env);
            }

            if let Some(ref mut environment) = service.environment {
                match environment {
                    EnvironmentConfig::Map(map) => {
                        for v in map.values_mut().flatten() {
                            *v = interpolate_string(v, env);
                        }
                    }
                    EnvironmentConfig::Array(arr) => {
                        for item in arr.iter_mut() {
                            *item = interpolate_string(item, env);
                        }
                    }
                }
            }

            if let Some(ref mut command) = service.command {
                match command {
                    CommandConfig::Shell(s) => *s = interpolate_string(s, env),
                    CommandConfig::Exec(arr) => {
                        for item in arr.iter_mut() {
                            *item = interpolate_string(item, env);
                        }
                    }
                }
            }
        }
    }

    /// Convert a validated configuration into services, dependencies first
    pub fn services(
        config: &ComposeConfig,
        project_name: &str,
        working_dir: &Path,
    ) -> Result<Vec<Service>> {
        Self::validate(config)?;

        start_order(config)?
            .into_iter()
            .map(|name| {
                let service_config = &config.services[&name];
                to_service(&name, service_config, project_name, working_dir)
            })
            .collect()
    }
}

fn replicas(service: &ServiceConfig) -> u32 {
    service
        .deploy
        .as_ref()
        .and_then(|d| d.replicas)
        .or(service.scale)
        .unwrap_or(1)
}

/// Service names ordered so dependencies come first, ties broken by name
fn start_order(config: &ComposeConfig) -> Result<Vec<String>> {
    let mut names: Vec<&String> = config.services.keys().collect();
    names.sort();

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    for name in names {
        visit(config, name, &mut visited, &mut visiting, &mut order)?;
    }
    Ok(order)
}

fn visit(
    config: &ComposeConfig,
    service: &str,
    visited: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if visited.contains(service) {
        return Ok(());
    }

    if !visiting.insert(service.to_string()) {
        return Err(ComposeError::ComposeParse(format!(
            "Circular dependency detected for service: {}",
            service
        )));
    }

    if let Some(depends) = config
        .services
        .get(service)
        .and_then(|s| s.depends_on.as_ref())
    {
        let mut deps = depends.services();
        deps.sort();
        for dep in deps {
            visit(config, &dep, visited, visiting, order)?;
        }
    }

    visiting.remove(service);
    visited.insert(service.to_string());
    order.push(service.to_string());
    Ok(())
}

fn to_service(
    name: &str,
    config: &ServiceConfig,
    project_name: &str,
    working_dir: &Path,
) -> Result<Service> {
    let image = config
        .image
        .clone()
        .unwrap_or_else(|| format!("{}-{}:latest", project_name, name));

    let build = config.build.as_ref().map(|build| match build {
        BuildConfig::Simple(path) => BuildSpec::new(working_dir.join(path)),
        BuildConfig::Full(full) => {
            let context = full
                .context
                .as_ref()
                .map(|p| working_dir.join(p))
                .unwrap_or_else(|| working_dir.to_path_buf());
            let mut spec = BuildSpec::new(context.clone());
            if let Some(ref dockerfile) = full.dockerfile {
                spec.build_file = context.join(dockerfile);
            }
            if let Some(ref args) = full.args {
                spec.build_args = args.clone().into_iter().collect();
            }
            spec.target = full.target.clone();
            spec
        }
    });

    let pull_mode = match config.pull_policy {
        Some(ref policy) => policy.parse()?,
        None if build.is_some() => PullMode::Build,
        None => PullMode::Missing,
    };

    let count = replicas(config);
    let mut containers = Vec::with_capacity(count as usize);
    for index in 1..=count {
        let container_name = match config.container_name {
            Some(ref n) => n.clone(),
            None => format!("{}-{}-{}", project_name, name, index),
        };
        containers.push(to_container(&container_name, &image, config, working_dir));
    }

    Ok(Service {
        name: name.to_string(),
        build,
        image,
        pull_mode,
        platform: config.platform.clone(),
        stdin_open: config.stdin_open.unwrap_or(false),
        tty: config.tty.unwrap_or(false),
        containers,
    })
}

fn to_container(name: &str, image: &str, config: &ServiceConfig, working_dir: &Path) -> Container {
    let mut args = vec![format!("--name={}", name)];
    let mut mkdir = Vec::new();

    if let Some(ref platform) = config.platform {
        args.push(format!("--platform={}", platform));
    }
    if config.stdin_open == Some(true) {
        args.push("-i".to_string());
    }
    if config.tty == Some(true) {
        args.push("-t".to_string());
    }
    if let Some(ref restart) = config.restart {
        args.push(format!("--restart={}", restart));
    }
    if let Some(ref wd) = config.working_dir {
        args.push(format!("-w={}", wd));
    }
    if let Some(ref user) = config.user {
        args.push(format!("-u={}", user));
    }
    if let Some(ref hostname) = config.hostname {
        args.push(format!("--hostname={}", hostname));
    }
    if config.privileged == Some(true) {
        args.push("--privileged".to_string());
    }

    match config.environment {
        Some(EnvironmentConfig::Array(ref arr)) => {
            args.extend(arr.iter().map(|e| format!("-e={}", e)));
        }
        Some(EnvironmentConfig::Map(ref map)) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                match map[key] {
                    Some(ref value) => args.push(format!("-e={}={}", key, value)),
                    None => args.push(format!("-e={}", key)),
                }
            }
        }
        None => {}
    }

    let env_files = match config.env_file {
        Some(EnvFileConfig::Single(ref f)) => vec![f.clone()],
        Some(EnvFileConfig::Multiple(ref fs)) => fs.clone(),
        None => Vec::new(),
    };
    for file in env_files {
        args.push(format!("--env-file={}", working_dir.join(file).display()));
    }

    match config.labels {
        Some(LabelsConfig::Array(ref arr)) => {
            args.extend(arr.iter().map(|l| format!("-l={}", l)));
        }
        Some(LabelsConfig::Map(ref map)) => {
            let mut labels: Vec<_> = map.iter().collect();
            labels.sort();
            args.extend(labels.into_iter().map(|(k, v)| format!("-l={}={}", k, v)));
        }
        None => {}
    }

    for port in config.ports.iter().flatten() {
        args.push(format!("-p={}", port_arg(port)));
    }

    for volume in config.volumes.iter().flatten() {
        let (arg, host_dir) = volume_arg(volume, working_dir);
        args.push(arg);
        if let Some(dir) = host_dir {
            if !dir.exists() {
                mkdir.push(dir);
            }
        }
    }

    let mut command = Vec::new();
    match config.entrypoint {
        Some(CommandConfig::Shell(ref s)) => args.push(format!("--entrypoint={}", s)),
        Some(CommandConfig::Exec(ref arr)) => {
            if let Some((first, rest)) = arr.split_first() {
                args.push(format!("--entrypoint={}", first));
                command.extend(rest.iter().cloned());
            }
        }
        None => {}
    }
    match config.command {
        Some(CommandConfig::Shell(ref s)) => {
            command.extend(["/bin/sh".to_string(), "-c".to_string(), s.clone()]);
        }
        Some(CommandConfig::Exec(ref arr)) => command.extend(arr.iter().cloned()),
        None => {}
    }

    args.push(image.to_string());
    args.extend(command);

    Container {
        name: name.to_string(),
        run_args: args,
        mkdir,
    }
}

fn port_arg(port: &PortConfig) -> String {
    match port {
        PortConfig::Short(s) => s.clone(),
        PortConfig::Long(long) => {
            let mut arg = String::new();
            if let Some(ref ip) = long.host_ip {
                arg.push_str(ip);
                arg.push(':');
            }
            if let Some(ref published) = long.published {
                arg.push_str(published);
                arg.push(':');
            }
            arg.push_str(&long.target.to_string());
            if let Some(ref protocol) = long.protocol {
                arg.push('/');
                arg.push_str(protocol);
            }
            arg
        }
    }
}

fn is_host_path(source: &str) -> bool {
    source.starts_with('.') || source.starts_with('/') || source.starts_with('~')
}

fn resolve_host_path(source: &str, working_dir: &Path) -> PathBuf {
    if let Some(rest) = source.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    working_dir.join(source)
}

/// `-v`/`--tmpfs` argument and the bind-mounted host directory, if any
fn volume_arg(volume: &VolumeMount, working_dir: &Path) -> (String, Option<PathBuf>) {
    match volume {
        VolumeMount::Short(s) => {
            let mut parts = s.splitn(2, ':');
            let source = parts.next().unwrap_or_default();
            match parts.next() {
                Some(rest) if is_host_path(source) => {
                    let host = resolve_host_path(source, working_dir);
                    (format!("-v={}:{}", host.display(), rest), Some(host))
                }
                _ => (format!("-v={}", s), None),
            }
        }
        VolumeMount::Long(long) => {
            let suffix = if long.read_only == Some(true) { ":ro" } else { "" };
            match (long.mount_type.as_deref(), long.source.as_deref()) {
                (Some("tmpfs"), _) => (format!("--tmpfs={}", long.target), None),
                (Some("bind"), Some(source)) => {
                    let host = resolve_host_path(source, working_dir);
                    let create = long
                        .bind
                        .as_ref()
                        .and_then(|b| b.create_host_path)
                        .unwrap_or(true);
                    let arg = format!("-v={}:{}{}", host.display(), long.target, suffix);
                    (arg, create.then_some(host))
                }
                (_, Some(source)) => (format!("-v={}:{}{}", source, long.target, suffix), None),
                (_, None) => (format!("-v={}", long.target), None),
            }
        }
    }
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern is a valid regex")
    })
}

/// Interpolate `$VAR`, `${VAR}` and `${VAR:-default}`; `$$` escapes `$`
fn interpolate_string(s: &str, env: &HashMap<String, String>) -> String {
    variable_pattern()
        .replace_all(s, |caps: &Captures| {
            if &caps[0] == "$$" {
                return "$".to_string();
            }
            let var = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str());
            match var.and_then(|v| env.get(v)) {
                Some(value) => value.clone(),
                None => caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
    environment:
      POSTGRES_PASSWORD: secret
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert!(config.services.contains_key("web"));
        assert!(config.services.contains_key("db"));
    }

    #[test]
    fn test_validate_missing_image() {
        let yaml = r#"
services:
  web:
    ports:
      - "80:80"
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        let result = ComposeParser::validate(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_scaled_container_name() {
        let yaml = r#"
services:
  web:
    image: nginx
    container_name: web
    scale: 2
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        assert!(ComposeParser::validate(&config).is_err());
    }

    #[test]
    fn test_interpolate() {
        let mut env = HashMap::new();
        env.insert("TAG".to_string(), "1.0.0".to_string());

        assert_eq!(interpolate_string("nginx:${TAG}", &env), "nginx:1.0.0");
        assert_eq!(interpolate_string("nginx:$TAG", &env), "nginx:1.0.0");
        assert_eq!(interpolate_string("${MISSING:-latest}", &env), "latest");
        assert_eq!(interpolate_string("${MISSING}", &env), "");
        assert_eq!(interpolate_string("cost $$5", &env), "cost $5");
    }

    #[test]
    fn test_start_order_puts_dependencies_first() {
        let yaml = r#"
services:
  web:
    image: nginx
    depends_on:
      - api
  api:
    image: node
    depends_on:
      - db
  db:
    image: postgres
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        let temp = tempdir().unwrap();
        let services = ComposeParser::services(&config, "test", temp.path()).unwrap();
        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["db", "api", "web"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let yaml = r#"
services:
  a:
    image: nginx
    depends_on:
      - b
  b:
    image: nginx
    depends_on:
      - a
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        let temp = tempdir().unwrap();
        assert!(ComposeParser::services(&config, "test", temp.path()).is_err());
    }

    #[test]
    fn test_service_conversion() {
        let yaml = r#"
services:
  app:
    build: ./app
    stdin_open: true
    tty: true
    scale: 2
    environment:
      B: "2"
      A: "1"
    volumes:
      - ./data:/data
      - named:/var/lib
    command: ["serve", "--port", "80"]
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        let temp = tempdir().unwrap();
        let services = ComposeParser::services(&config, "proj", temp.path()).unwrap();
        let app = &services[0];

        assert_eq!(app.image, "proj-app:latest");
        assert_eq!(app.pull_mode, PullMode::Build);
        assert!(app.stdin_open && app.tty);
        assert_eq!(
            app.build.as_ref().unwrap().context_dir,
            temp.path().join("./app")
        );

        assert_eq!(app.containers.len(), 2);
        assert_eq!(app.containers[0].name, "proj-app-1");
        assert_eq!(app.containers[1].name, "proj-app-2");

        let data = temp.path().join("./data");
        let args = &app.containers[0].run_args;
        assert_eq!(
            args,
            &vec![
                "--name=proj-app-1".to_string(),
                "-i".to_string(),
                "-t".to_string(),
                "-e=A=1".to_string(),
                "-e=B=2".to_string(),
                format!("-v={}:/data", data.display()),
                "-v=named:/var/lib".to_string(),
                "proj-app:latest".to_string(),
                "serve".to_string(),
                "--port".to_string(),
                "80".to_string(),
            ]
        );
        assert_eq!(app.containers[0].mkdir, vec![data]);
    }

    #[test]
    fn test_long_port_syntax() {
        let yaml = r#"
services:
  web:
    image: nginx
    pull_policy: always
    ports:
      - target: 80
        published: "8080"
        protocol: udp
"#;

        let config = ComposeParser::parse_str(yaml).unwrap();
        let temp = tempdir().unwrap();
        let services = ComposeParser::services(&config, "p", temp.path()).unwrap();
        assert_eq!(services[0].pull_mode, PullMode::Always);
        assert!(services[0].containers[0]
            .run_args
            .contains(&"-p=8080:80/udp".to_string()));
    }
}

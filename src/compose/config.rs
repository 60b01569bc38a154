//! Compose file configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compose file configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Compose file version
    #[serde(default)]
    pub version: Option<String>,
    /// Project name
    #[serde(default)]
    pub name: Option<String>,
    /// Services
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Image name
    #[serde(default)]
    pub image: Option<String>,
    /// Build configuration
    #[serde(default)]
    pub build: Option<BuildConfig>,
    /// Command to run
    #[serde(default)]
    pub command: Option<CommandConfig>,
    /// Entrypoint
    #[serde(default)]
    pub entrypoint: Option<CommandConfig>,
    /// Container name
    #[serde(default)]
    pub container_name: Option<String>,
    /// Hostname
    #[serde(default)]
    pub hostname: Option<String>,
    /// Environment variables
    #[serde(default)]
    pub environment: Option<EnvironmentConfig>,
    /// Environment file
    #[serde(default)]
    pub env_file: Option<EnvFileConfig>,
    /// Port mappings
    #[serde(default)]
    pub ports: Option<Vec<PortConfig>>,
    /// Volume mounts
    #[serde(default)]
    pub volumes: Option<Vec<VolumeMount>>,
    /// Service dependencies
    #[serde(default)]
    pub depends_on: Option<DependsOnConfig>,
    /// Deploy configuration
    #[serde(default)]
    pub deploy: Option<DeployConfig>,
    /// Replica count (legacy `scale`)
    #[serde(default)]
    pub scale: Option<u32>,
    /// Labels
    #[serde(default)]
    pub labels: Option<LabelsConfig>,
    /// Restart policy
    #[serde(default)]
    pub restart: Option<String>,
    /// Working directory
    #[serde(default)]
    pub working_dir: Option<String>,
    /// User
    #[serde(default)]
    pub user: Option<String>,
    /// Privileged mode
    #[serde(default)]
    pub privileged: Option<bool>,
    /// Stdin open
    #[serde(default)]
    pub stdin_open: Option<bool>,
    /// TTY
    #[serde(default)]
    pub tty: Option<bool>,
    /// Pull policy
    #[serde(default)]
    pub pull_policy: Option<String>,
    /// Platform
    #[serde(default)]
    pub platform: Option<String>,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildConfig {
    /// Simple context path
    Simple(String),
    /// Full build configuration
    Full(BuildConfigFull),
}

/// Full build configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfigFull {
    /// Build context
    pub context: Option<String>,
    /// Dockerfile path (or Runefile)
    pub dockerfile: Option<String>,
    /// Build arguments
    #[serde(default)]
    pub args: Option<HashMap<String, String>>,
    /// Target stage
    pub target: Option<String>,
}

/// Command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    /// Shell command string
    Shell(String),
    /// Exec form array
    Exec(Vec<String>),
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    /// Array of KEY=value strings
    Array(Vec<String>),
    /// Map of key to value
    Map(HashMap<String, Option<String>>),
}

/// Env file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvFileConfig {
    /// Single file
    Single(String),
    /// Multiple files
    Multiple(Vec<String>),
}

/// Port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortConfig {
    /// Short syntax: "8080:80"
    Short(String),
    /// Long syntax
    Long(PortConfigLong),
}

/// Long port configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfigLong {
    /// Target port in container
    pub target: u16,
    /// Published port on host
    pub published: Option<String>,
    /// Host IP to bind to
    pub host_ip: Option<String>,
    /// Protocol (tcp/udp)
    pub protocol: Option<String>,
}

/// Volume mount configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// Short syntax: "host:container:mode"
    Short(String),
    /// Long syntax
    Long(VolumeMountLong),
}

/// Long volume mount configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeMountLong {
    /// Mount type (volume, bind, tmpfs, npipe)
    #[serde(rename = "type")]
    pub mount_type: Option<String>,
    /// Source path or volume name
    pub source: Option<String>,
    /// Target path in container
    pub target: String,
    /// Read only
    pub read_only: Option<bool>,
    /// Bind options
    pub bind: Option<BindOptions>,
}

/// Bind mount options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindOptions {
    /// Create host path
    pub create_host_path: Option<bool>,
}

/// Depends on configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOnConfig {
    /// Array of service names
    Array(Vec<String>),
    /// Map of service to condition
    Map(HashMap<String, DependsOnCondition>),
}

impl DependsOnConfig {
    /// Names of the services depended on
    pub fn services(&self) -> Vec<String> {
        match self {
            DependsOnConfig::Array(arr) => arr.clone(),
            DependsOnConfig::Map(map) => map.keys().cloned().collect(),
        }
    }
}

/// Depends on condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependsOnCondition {
    /// Condition to wait for
    pub condition: String,
}

/// Deploy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Number of replicas
    pub replicas: Option<u32>,
}

/// Labels configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsConfig {
    /// Array of key=value strings
    Array(Vec<String>),
    /// Map of key to value
    Map(HashMap<String, String>),
}

//! Docker Compose compatible `up`
//!
//! This module turns a compose project into running containers: images are
//! provisioned one service at a time, then each service's containers are
//! launched concurrently and recorded in a [`Registry`].

pub mod config;
pub mod labels;
pub mod launcher;
pub mod options;
pub mod orchestrator;
pub mod parser;
pub mod provision;
pub mod registry;
pub mod service;

pub use config::{ComposeConfig, ServiceConfig};
pub use options::{BuildOptions, ComposerOptions, LogsOptions, RecreatePolicy, UpOptions};
pub use orchestrator::Composer;
pub use parser::ComposeParser;
pub use registry::Registry;
pub use service::{BuildSpec, Container, PullMode, Service};

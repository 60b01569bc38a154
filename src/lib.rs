//! rune-compose - Compose-style `up` for Rune
//!
//! Brings up a multi-service project on a Docker-compatible engine:
//!
//! - Image provisioning (build or pull, per service pull policy)
//! - Reuse or recreation of existing containers
//! - Concurrent container launch within a service
//! - Log attach and forced stop on exit

pub mod compose;
pub mod engine;
pub mod error;

pub use error::{ComposeError, Result};

//! Labels stamped on containers created by `up`
//!
//! Follows https://github.com/compose-spec/compose-spec/blob/master/spec.md#labels

/// Name of the owning project
pub const COMPOSE_PROJECT: &str = "com.docker.compose.project";

/// Name of the owning service
pub const COMPOSE_SERVICE: &str = "com.docker.compose.service";

/// `-l=<label>=<value>` run flag
pub fn run_flag(label: &str, value: &str) -> String {
    format!("-l={}={}", label, value)
}

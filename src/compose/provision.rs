//! Service image provisioning

use super::options::BuildOptions;
use super::service::{PullMode, Service};
use crate::engine::Engine;
use crate::error::{ComposeError, Result};

/// Make sure the image of `service` is available, building or pulling it.
///
/// An existing image is still handed to `ensure_image`, since a pull
/// policy of `always` must pull it again.
pub async fn ensure_service_image(
    engine: &dyn Engine,
    service: &Service,
    allow_build: bool,
    force_build: bool,
    build_options: &BuildOptions,
    quiet: bool,
    pull_override: Option<PullMode>,
) -> Result<()> {
    let wrap = |e: ComposeError| ComposeError::in_service(&service.name, e);

    if let Some(ref build) = service.build {
        if allow_build {
            if build.force || force_build {
                return engine.build_image(service, build_options).await.map_err(wrap);
            }

            if !engine.image_exists(&service.image).await.map_err(wrap)? {
                return engine.build_image(service, build_options).await.map_err(wrap);
            }

            tracing::debug!("Image {} already exists, not building", service.image);
        }
    }

    tracing::info!("Ensuring image {}", service.image);
    let pull_mode = pull_override.unwrap_or(service.pull_mode);
    engine
        .ensure_image(service, pull_mode, quiet)
        .await
        .map_err(wrap)
}

// tests/provision.rs

mod common;
use crate::common::{init_tracing, service, Call, FakeEngine};

use rune_compose::compose::provision::ensure_service_image;
use rune_compose::compose::{BuildOptions, BuildSpec, PullMode, Service};
use tempfile::tempdir;

fn buildable(context: &std::path::Path) -> Service {
    service("app", &["proj-app-1"])
        .build(BuildSpec::new(context.to_path_buf()))
        .pull_mode(PullMode::Build)
}

#[tokio::test]
async fn missing_image_is_built_without_pull() {
    init_tracing();
    let ctx = tempdir().unwrap();
    let engine = FakeEngine::new();

    ensure_service_image(
        &engine,
        &buildable(ctx.path()),
        true,
        false,
        &BuildOptions::default(),
        false,
        None,
    )
    .await
    .unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            Call::ImageExists("app:latest".into()),
            Call::Build("app:latest".into()),
        ]
    );
}

#[tokio::test]
async fn existing_image_still_goes_through_pull_policy() {
    init_tracing();
    let ctx = tempdir().unwrap();
    let engine = FakeEngine::new().with_image("app:latest");

    ensure_service_image(
        &engine,
        &buildable(ctx.path()).pull_mode(PullMode::Always),
        true,
        false,
        &BuildOptions::default(),
        false,
        None,
    )
    .await
    .unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            Call::ImageExists("app:latest".into()),
            Call::Ensure("app:latest".into(), PullMode::Always),
        ]
    );
}

#[tokio::test]
async fn forced_build_skips_existence_check() {
    init_tracing();
    let ctx = tempdir().unwrap();
    let engine = FakeEngine::new().with_image("app:latest");

    ensure_service_image(
        &engine,
        &buildable(ctx.path()),
        true,
        true,
        &BuildOptions::default(),
        false,
        None,
    )
    .await
    .unwrap();

    assert_eq!(engine.calls(), vec![Call::Build("app:latest".into())]);
}

#[tokio::test]
async fn per_service_force_flag_builds() {
    init_tracing();
    let ctx = tempdir().unwrap();
    let engine = FakeEngine::new().with_image("app:latest");
    let mut svc = buildable(ctx.path());
    if let Some(ref mut build) = svc.build {
        build.force = true;
    }

    ensure_service_image(&engine, &svc, true, false, &BuildOptions::default(), false, None)
        .await
        .unwrap();

    assert_eq!(engine.calls(), vec![Call::Build("app:latest".into())]);
}

#[tokio::test]
async fn no_build_goes_straight_to_ensure_with_override() {
    init_tracing();
    let ctx = tempdir().unwrap();
    let engine = FakeEngine::new();

    ensure_service_image(
        &engine,
        &buildable(ctx.path()),
        false,
        true,
        &BuildOptions::default(),
        true,
        Some(PullMode::Never),
    )
    .await
    .unwrap();

    assert_eq!(
        engine.calls(),
        vec![Call::Ensure("app:latest".into(), PullMode::Never)]
    );
}

#[tokio::test]
async fn ensure_failure_names_the_service() {
    init_tracing();
    let engine = FakeEngine::new().failing_image("web:latest");

    let err = ensure_service_image(
        &engine,
        &service("web", &["proj-web-1"]),
        true,
        false,
        &BuildOptions::default(),
        false,
        None,
    )
    .await
    .unwrap_err();

    assert!(err.is_engine());
    assert!(err.to_string().starts_with("service web:"));
}

// tests/config_validation.rs

use std::path::Path;

use clap::Parser;

use monobuild::cli::{CliArgs, Command, PlanArgs};
use monobuild::config::{load_and_validate, parse_str, ConfigFile};
use monobuild::errors::MonobuildError;
use monobuild::jobs::{Job, JobStore, RepositoryBuildRequest};
use monobuild_test_utils::builders::{names, ConfigFileBuilder};

fn validate(toml: &str) -> Result<ConfigFile, MonobuildError> {
    ConfigFile::try_from(parse_str(toml)?)
}

#[test]
fn full_config_is_parsed_with_defaults() {
    let cfg = validate(
        r#"
        [artifact.web]
        path = "packages/web"
        type = "npm"
        dependencies = ["ui", "react"]
        owners = ["team-web"]

        [artifact.ui]
        path = "packages/ui"
        type = "npm"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.config.store, ".monobuild/jobs.sqlite");
    assert_eq!(cfg.config.ignore_file, ".monobuildignore");

    let arts = cfg.artifacts();
    assert_eq!(arts.len(), 2);
    // name order
    assert_eq!(arts[0].name, "ui");
    assert_eq!(arts[1].name, "web");
    assert_eq!(arts[1].artifact_type, "npm");
    assert_eq!(arts[1].dependencies, names(&["react", "ui"]));
    assert_eq!(arts[1].owners, names(&["team-web"]));
}

#[test]
fn config_section_overrides() {
    let cfg = validate(
        r#"
        [config]
        store = "build/state.db"
        ignore_file = ".buildignore"

        [artifact.a]
        path = "."
        type = "cargo"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.config.store, "build/state.db");
    assert_eq!(cfg.config.ignore_file, ".buildignore");
}

#[test]
fn config_without_artifacts_is_rejected() {
    let err = validate("[config]\n").unwrap_err();
    assert!(matches!(err, MonobuildError::ConfigError(_)), "{err:?}");
}

#[test]
fn empty_and_duplicate_paths_are_rejected() {
    let err = validate(
        r#"
        [artifact.a]
        path = ""
        type = "npm"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, MonobuildError::ConfigError(_)), "{err:?}");

    let err = validate(
        r#"
        [artifact.a]
        path = "packages/x"
        type = "npm"

        [artifact.b]
        path = "packages/x/"
        type = "npm"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("share the path"), "{err}");
}

#[test]
fn self_dependency_is_a_cycle() {
    let raw = ConfigFileBuilder::new()
        .with_artifact("a", "packages/a", &["a"])
        .raw();
    assert!(matches!(ConfigFile::try_from(raw), Err(MonobuildError::DagCycle(_))));
}

#[test]
fn dependency_cycle_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_artifact("a", "packages/a", &["c"])
        .with_artifact("b", "packages/b", &["a"])
        .with_artifact("c", "packages/c", &["b"])
        .raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, MonobuildError::DagCycle(_)));
    // same check the build runs before planning
    assert!(err.to_string().contains("cycle detected in dependency graph"), "{err}");
}

#[test]
fn external_dependencies_are_allowed() {
    let cfg = ConfigFileBuilder::new()
        .with_artifact("a", "packages/a", &["lodash"])
        .build();
    assert_eq!(cfg.artifacts()[0].dependencies, names(&["lodash"]));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = parse_str("[artifact.a\npath = 1").unwrap_err();
    assert!(matches!(err, MonobuildError::TomlError(_)));
}

#[test]
fn load_and_validate_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Monobuild.toml");
    std::fs::write(
        &path,
        "[artifact.a]\npath = \"packages/a\"\ntype = \"npm\"\n",
    )
    .unwrap();

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.artifact.len(), 1);

    let missing = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(missing, MonobuildError::IoError(_)));
}

#[test]
fn plan_arguments_become_a_build_request() {
    let cfg = ConfigFileBuilder::new()
        .with_artifact("a", "packages/a", &[])
        .with_artifact("b", "packages/b", &["a"])
        .build();

    let args = CliArgs::try_parse_from(["monobuild", "plan", "--from", "a,b", "--force"]).unwrap();
    let Command::Plan(plan) = args.command else {
        panic!("expected plan");
    };
    assert_eq!(args.config, "Monobuild.toml");

    let request = monobuild::build_request(&cfg, Path::new("/repo"), plan).unwrap();
    assert_eq!(request.from, Some(names(&["a", "b"])));
    assert_eq!(request.upto, None);
    assert!(request.force);
    assert_eq!(request.artifacts.len(), 2);

    let unknown = PlanArgs {
        just_build: Some(vec!["zzz".to_string()]),
        ..PlanArgs::default()
    };
    let err = monobuild::build_request(&cfg, Path::new("/repo"), unknown).unwrap_err();
    assert!(matches!(err, MonobuildError::ArtifactNotFound(name) if name == "zzz"));
}

#[test]
fn status_takes_global_flags_after_the_subcommand() {
    let args = CliArgs::try_parse_from([
        "monobuild",
        "status",
        "--config",
        "repo/Monobuild.toml",
        "--log-level",
        "debug",
    ])
    .unwrap();
    assert!(matches!(args.command, Command::Status));
    assert_eq!(args.config, "repo/Monobuild.toml");
    assert!(args.log_level.is_some());
}

#[tokio::test]
async fn status_reads_a_store_left_by_an_embedder() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Monobuild.toml");
    std::fs::write(
        &config,
        "[artifact.a]\npath = \"packages/a\"\ntype = \"npm\"\n",
    )
    .unwrap();
    let cfg = load_and_validate(&config).unwrap();

    assert!(monobuild::pending_jobs(&cfg, dir.path()).unwrap().is_none());

    // an embedding program queued a build and stopped before draining it
    {
        let store = monobuild::open_job_store(&cfg, dir.path()).unwrap();
        store
            .enqueue(
                Job::repository_build(RepositoryBuildRequest {
                    repository_dir: dir.path().to_path_buf(),
                    artifacts: cfg.artifacts(),
                    ..RepositoryBuildRequest::default()
                }),
                None,
            )
            .unwrap();
    }

    let pending = monobuild::pending_jobs(&cfg, dir.path()).unwrap().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].job.kind.name(), "repository");

    let args = CliArgs::try_parse_from([
        "monobuild",
        "status",
        "--config",
        config.to_str().unwrap(),
    ])
    .unwrap();
    monobuild::run(args).await.unwrap();

    // reading does not consume the queue
    assert_eq!(monobuild::pending_jobs(&cfg, dir.path()).unwrap().unwrap().len(), 1);
}

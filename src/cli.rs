// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
// SPDX-FileCopyrightText: 2021 Yannik Sander <contact@ysndr.de>
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{stdin, stdout, Write};
use std::path::PathBuf;

use clap::{Args, Parser};
use log::{error, info, Level};
use merge::Merge;
use serde::Serialize;
use thiserror::Error;

use crate::create_deployment::{self, CreateDeploymentError};
use crate::push::{self, PushData, PushError};
use crate::settings::{self, Config, SettingsError};
use crate::tag_env::{TagEnv, TagEnvError};
use crate::target::{Deployment, ResolveError};

/// Push a revision to AWS CodeDeploy and deploy it to the group mapped from its docker tag
#[derive(Parser, Debug, Clone)]
#[clap(name = "deploy-tag", version, author = "Serokell <https://serokell.io/>")]
pub struct Opts {
    /// The docker tag to deploy
    pub docker_tag: String,

    /// Deploy to this deployment group instead of the one mapped from the tag
    #[clap(long)]
    pub deployment_group: Option<String>,

    /// Description of the revision and deployment, defaults to "Deploy <tag>"
    #[clap(long)]
    pub description: Option<String>,

    /// Settings file to read, defaults to deploy-tag.toml when present
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(flatten)]
    pub flags: Flags,

    #[clap(flatten)]
    pub settings: settings::Settings,
}

#[derive(Args, Debug, Clone, Default)]
pub struct Flags {
    /// Prompt before pushing
    #[clap(short, long)]
    pub interactive: bool,
    /// Show what would be pushed and deployed, then stop
    #[clap(long)]
    pub dry_run: bool,
    /// Enable debug logs
    #[clap(long)]
    pub debug_logs: bool,
    /// Store log files in a directory
    #[clap(long)]
    pub log_dir: Option<String>,
}

#[derive(Serialize)]
struct PlanPart<'a> {
    application: &'a str,
    tag: &'a str,
    group: &'a str,
    description: &'a str,
    revision: &'a str,
    env_file: String,
}

fn print_plan(config: &Config, deployment: &Deployment) -> Result<(), toml::ser::Error> {
    let revision = deployment.s3_location(config);

    let toml = toml::to_string(&PlanPart {
        application: &config.application_name,
        tag: &deployment.tag,
        group: &deployment.group,
        description: &deployment.description,
        revision: &revision,
        env_file: config.env_path().display().to_string(),
    })?;

    info!("The following deployment is going to be made:\n{}", toml);

    Ok(())
}

#[derive(Error, Debug)]
pub enum PromptDeploymentError {
    #[error("Failed to flush stdout prior to query: {0}")]
    StdoutFlush(std::io::Error),
    #[error("Failed to read line from stdin: {0}")]
    StdinRead(std::io::Error),
    #[error("User cancelled deployment")]
    Cancelled,
}

fn read_answer() -> Result<String, PromptDeploymentError> {
    print!("> ");

    stdout()
        .flush()
        .map_err(PromptDeploymentError::StdoutFlush)?;

    let mut s = String::new();
    stdin()
        .read_line(&mut s)
        .map_err(PromptDeploymentError::StdinRead)?;

    Ok(s)
}

fn prompt_deployment() -> Result<(), PromptDeploymentError> {
    info!("Are you sure you want to make this deployment?");

    let s = read_answer()?;

    if !yn::yes(&s) {
        if yn::is_somewhat_yes(&s) {
            info!("Sounds like you might want to continue, to be more clear please just say \"yes\". Do you want to make this deployment?");

            if !yn::yes(&read_answer()?) {
                return Err(PromptDeploymentError::Cancelled);
            }
        } else {
            if !yn::no(&s) {
                info!(
                    "That was unclear, but sounded like a no to me. Please say \"yes\" or \"no\" to be more clear."
                );
            }

            return Err(PromptDeploymentError::Cancelled);
        }
    }

    Ok(())
}

#[derive(Error, Debug)]
pub enum RunDeployError {
    #[error("{0}")]
    TagEnv(#[from] TagEnvError),
    #[error("Failed to push revision: {0}")]
    Push(#[from] PushError),
    #[error("Failed to create deployment: {0}")]
    CreateDeployment(#[from] CreateDeploymentError),
}

impl RunDeployError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunDeployError::Push(PushError::Command(e)) => e.exit_code(),
            RunDeployError::CreateDeployment(CreateDeploymentError::Command(e)) => e.exit_code(),
            _ => 1,
        }
    }
}

async fn push_and_deploy(
    config: &Config,
    deployment: &Deployment,
) -> Result<Option<String>, RunDeployError> {
    let push_stdout = push::push_revision(PushData { config, deployment }).await?;

    let deployment_id =
        create_deployment::create_deployment(&config.aws_cli, &push_stdout, deployment).await?;

    Ok(deployment_id)
}

/// Pushes the revision and creates the deployment with the tag environment
/// file pointed at `deployment.tag`. The file is restored on every path.
pub async fn run_deploy(
    config: &Config,
    deployment: &Deployment,
) -> Result<Option<String>, RunDeployError> {
    let tag_env = TagEnv::write(&config.env_path(), &config.env_key, &deployment.tag)?;

    let result = push_and_deploy(config, deployment).await;

    match tag_env.restore() {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e.into()),
        Err(e) => {
            error!("{}", e);
            result
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Error initiating logger: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),
    #[error("{0}")]
    Settings(#[from] SettingsError),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("Failed to make printable TOML of deployment: {0}")]
    TomlFormat(#[from] toml::ser::Error),
    #[error("{0}")]
    PromptDeployment(#[from] PromptDeploymentError),
    #[error("{0}")]
    RunDeploy(#[from] RunDeployError),
}

impl RunError {
    /// Status the process should exit with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::RunDeploy(e) => e.exit_code(),
            _ => 1,
        }
    }

    /// Level to report this error at, `None` when no logger is available.
    pub fn log_level(&self) -> Option<Level> {
        match self {
            RunError::Logger(_) => None,
            RunError::Resolve(_) => Some(Level::Info),
            _ => Some(Level::Error),
        }
    }
}

/// Layers the command line settings over the settings file.
pub fn resolve_config(opts: &Opts) -> Result<Config, SettingsError> {
    let mut cmd_settings = opts.settings.clone();
    cmd_settings.merge(settings::load_settings(opts.config.as_deref())?);

    let mut config = cmd_settings.resolve();

    // push runs inside the deploy directory, create-deployment does not
    let cwd = std::env::current_dir().map_err(SettingsError::CurrentDir)?;
    config.aws_cli = settings::anchor_cli(&config.aws_cli, &cwd);

    Ok(config)
}

pub async fn run(opts: Opts) -> Result<(), RunError> {
    crate::init_logger(opts.flags.debug_logs, opts.flags.log_dir.as_deref())?;

    deploy(opts).await
}

/// Everything `run` does once logging is set up.
pub async fn deploy(opts: Opts) -> Result<(), RunError> {
    let config = resolve_config(&opts)?;

    let deployment = Deployment::resolve(
        &opts.docker_tag,
        opts.deployment_group.as_deref(),
        opts.description.as_deref(),
        &config.groups,
    )?;

    print_plan(&config, &deployment)?;

    if opts.flags.dry_run {
        info!(
            "dry run, would run: {}",
            push::push_command(&PushData {
                config: &config,
                deployment: &deployment,
            })
        );
        return Ok(());
    }

    if opts.flags.interactive {
        prompt_deployment()?;
    }

    match run_deploy(&config, &deployment).await? {
        Some(deployment_id) => info!(
            "Created deployment {} of `{}` in group `{}`",
            deployment_id, deployment.tag, deployment.group
        ),
        None => info!(
            "Created deployment of `{}` in group `{}`",
            deployment.tag, deployment.group
        ),
    }

    Ok(())
}

#[test]
fn test_parse_opts() {
    let opts = Opts::parse_from(&[
        "deploy-tag",
        "staging",
        "--description",
        "Hotfix",
        "--deployment-group",
        "dev",
        "--bucket",
        "other-bucket",
        "--dry-run",
    ]);

    assert_eq!(opts.docker_tag, "staging");
    assert_eq!(opts.description.as_deref(), Some("Hotfix"));
    assert_eq!(opts.deployment_group.as_deref(), Some("dev"));
    assert_eq!(opts.settings.bucket.as_deref(), Some("other-bucket"));
    assert!(opts.flags.dry_run);
    assert!(!opts.flags.interactive);
}

#[test]
fn test_resolve_config_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy-tag.toml");
    std::fs::write(&path, "prefix = \"builds\"\n[groups]\nmain = \"prod\"\n").unwrap();

    let opts = Opts::parse_from(&[
        "deploy-tag",
        "main",
        "--config",
        path.to_str().unwrap(),
        "--prefix",
        "override",
    ]);

    let config = resolve_config(&opts).unwrap();

    assert_eq!(config.prefix, "override");
    assert_eq!(config.groups.get("main").map(String::as_str), Some("prod"));
}

#[test]
fn test_resolve_config_anchors_relative_cli() {
    let opts = Opts::parse_from(&["deploy-tag", "dev", "--aws-cli", "./bin/aws"]);

    let config = resolve_config(&opts).unwrap();

    assert_eq!(
        PathBuf::from(&config.aws_cli),
        std::env::current_dir().unwrap().join("./bin/aws")
    );
}

#[test]
fn test_log_levels() {
    assert_eq!(
        RunError::from(ResolveError::UnknownTag("unknown-tag".to_string())).log_level(),
        Some(Level::Info)
    );
    assert_eq!(
        RunError::from(RunDeployError::from(CreateDeploymentError::MissingSuggestion)).log_level(),
        Some(Level::Error)
    );
    assert_eq!(
        RunError::from(PromptDeploymentError::Cancelled).log_level(),
        Some(Level::Error)
    );
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        RunError::from(ResolveError::UnknownTag("unknown-tag".to_string())).exit_code(),
        1
    );
    assert_eq!(
        RunError::from(RunDeployError::from(CreateDeploymentError::MissingSuggestion)).exit_code(),
        1
    );
}

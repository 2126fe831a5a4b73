// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

use clap::Args;
use log::debug;
use merge::Merge;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "deploy-tag.toml";

pub const DEFAULT_APPLICATION_NAME: &str = "Wellington";
pub const DEFAULT_BUCKET: &str = "deploy.chicon.org";
pub const DEFAULT_PREFIX: &str = "wellington";
pub const DEFAULT_SOURCE: &str = ".";
pub const DEFAULT_DEPLOY_DIR: &str = "./deploy";
pub const DEFAULT_ENV_FILE: &str = "tag.env";
pub const DEFAULT_ENV_KEY: &str = "WELLINGTON_DOCKER_TAG";
pub const DEFAULT_AWS_CLI: &str = "aws";

pub const DEFAULT_GROUPS: &[(&str, &str)] =
    &[("dev", "dev"), ("staging", "staging"), ("release", "prod")];

#[derive(Args, Deserialize, Debug, Clone, Merge, Default, PartialEq)]
pub struct Settings {
    /// Override the CodeDeploy application name
    #[clap(long)]
    #[serde(rename(deserialize = "applicationName"))]
    pub application_name: Option<String>,
    /// Override the S3 bucket the revision is uploaded to
    #[clap(long)]
    pub bucket: Option<String>,
    /// Override the key prefix of the uploaded revision inside the bucket
    #[clap(long)]
    pub prefix: Option<String>,
    /// Override the bundle source directory, relative to the deploy directory
    #[clap(long)]
    pub source: Option<String>,
    /// Override the directory `aws deploy push` is run from
    #[clap(long)]
    #[serde(rename(deserialize = "deployDir"))]
    pub deploy_dir: Option<PathBuf>,
    /// Override the tag environment file, relative to the deploy directory
    #[clap(long)]
    #[serde(rename(deserialize = "envFile"))]
    pub env_file: Option<PathBuf>,
    /// Override the variable name written to the tag environment file
    #[clap(long)]
    #[serde(rename(deserialize = "envKey"))]
    pub env_key: Option<String>,
    /// Override the aws CLI executable
    #[clap(long)]
    #[serde(rename(deserialize = "awsCli"))]
    pub aws_cli: Option<String>,
    #[clap(skip)]
    pub groups: Option<HashMap<String, String>>,
}

/// Settings with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub application_name: String,
    pub bucket: String,
    pub prefix: String,
    pub source: String,
    pub deploy_dir: PathBuf,
    pub env_file: PathBuf,
    pub env_key: String,
    pub aws_cli: String,
    pub groups: HashMap<String, String>,
}

impl Settings {
    pub fn resolve(self) -> Config {
        Config {
            application_name: self
                .application_name
                .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
            bucket: self.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            prefix: self.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            deploy_dir: self
                .deploy_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOY_DIR)),
            env_file: self
                .env_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
            env_key: self.env_key.unwrap_or_else(|| DEFAULT_ENV_KEY.to_string()),
            aws_cli: self.aws_cli.unwrap_or_else(|| DEFAULT_AWS_CLI.to_string()),
            groups: self.groups.unwrap_or_else(|| {
                DEFAULT_GROUPS
                    .iter()
                    .map(|(tag, group)| (tag.to_string(), group.to_string()))
                    .collect()
            }),
        }
    }
}

impl Config {
    pub fn env_path(&self) -> PathBuf {
        self.deploy_dir.join(&self.env_file)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to parse settings file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("Failed to determine the current directory: {0}")]
    CurrentDir(std::io::Error),
}

/// Anchors a relative executable path such as `./bin/aws` at `base`.
/// Bare names are left to the `PATH` lookup.
pub fn anchor_cli(aws_cli: &str, base: &Path) -> String {
    let path = Path::new(aws_cli);

    if path.is_relative() && path.components().count() > 1 {
        base.join(path).display().to_string()
    } else {
        aws_cli.to_string()
    }
}

pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    debug!("Reading settings from {}", path.display());

    let content =
        std::fs::read_to_string(path).map_err(|e| SettingsError::Read(path.to_path_buf(), e))?;

    toml::from_str(&content).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))
}

/// Reads `explicit` if given, otherwise the default file when it exists.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    match explicit {
        Some(path) => read_settings(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                read_settings(path)
            } else {
                Ok(Settings::default())
            }
        }
    }
}

#[test]
fn test_defaults() {
    let config = Settings::default().resolve();

    assert_eq!(config.application_name, "Wellington");
    assert_eq!(config.env_path(), PathBuf::from("./deploy/tag.env"));
    assert_eq!(config.env_key, "WELLINGTON_DOCKER_TAG");
    assert_eq!(config.groups.get("release").map(String::as_str), Some("prod"));
    assert_eq!(config.groups.get("main"), None);
}

#[test]
fn test_command_line_wins_over_file() {
    let file: Settings = toml::from_str(
        r#"
            applicationName = "FromFile"
            bucket = "file-bucket"
            awsCli = "/opt/aws/bin/aws"

            [groups]
            staging = "dev"
            main = "prod"
        "#,
    )
    .unwrap();

    let mut cmd = Settings {
        application_name: Some("FromFlag".to_string()),
        ..Settings::default()
    };
    cmd.merge(file);

    let config = cmd.resolve();

    assert_eq!(config.application_name, "FromFlag");
    assert_eq!(config.bucket, "file-bucket");
    assert_eq!(config.aws_cli, "/opt/aws/bin/aws");
    assert_eq!(config.prefix, "wellington");
    assert_eq!(config.groups.len(), 2);
    assert_eq!(config.groups.get("staging").map(String::as_str), Some("dev"));
    assert_eq!(config.groups.get("dev"), None);
}

#[test]
fn test_anchor_cli() {
    let base = Path::new("/home/ci/wellington");

    assert_eq!(anchor_cli("aws", base), "aws");
    assert_eq!(anchor_cli("/usr/local/bin/aws", base), "/usr/local/bin/aws");
    assert_eq!(anchor_cli("bin/aws", base), "/home/ci/wellington/bin/aws");
    assert_eq!(
        Path::new(&anchor_cli("./bin/aws", base)),
        Path::new("/home/ci/wellington/./bin/aws")
    );
}

#[test]
fn test_read_settings_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "bucket = [").unwrap();

    match read_settings(&path) {
        Err(SettingsError::Parse(p, _)) => assert_eq!(p, path),
        other => panic!("unexpected result: {:?}", other),
    }

    match load_settings(Some(&dir.path().join("missing.toml"))) {
        Err(SettingsError::Read(..)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

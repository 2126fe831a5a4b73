// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

use log::{debug, info};
use thiserror::Error;
use tokio::process::Command as TokioCommand;

use crate::command::{Command, CommandError};
use crate::settings::Config;
use crate::target::Deployment;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("{0}")]
    Command(#[from] CommandError),
    #[error("aws deploy push output contained an invalid UTF-8 sequence: {0}")]
    Utf8(std::string::FromUtf8Error),
}

pub struct PushData<'a> {
    pub config: &'a Config,
    pub deployment: &'a Deployment,
}

pub fn push_command(data: &PushData<'_>) -> Command {
    let mut push_command = TokioCommand::new(&data.config.aws_cli);

    push_command
        .arg("deploy")
        .arg("push")
        .arg("--application-name")
        .arg(&data.config.application_name)
        .arg("--s3-location")
        .arg(data.deployment.s3_location(data.config))
        .arg("--source")
        .arg(&data.config.source)
        .arg("--description")
        .arg(&data.deployment.description)
        .current_dir(&data.config.deploy_dir)
        // mirrors the tag environment file
        .env(&data.config.env_key, &data.deployment.tag);

    Command::new("aws deploy push", push_command)
}

/// Uploads the revision and returns the captured stdout of `aws deploy push`.
pub async fn push_revision(data: PushData<'_>) -> Result<String, PushError> {
    info!(
        "Pushing revision `{}` of application `{}`",
        data.deployment.s3_location(data.config),
        data.config.application_name
    );

    let mut push_command = push_command(&data);

    debug!("push command: {}", push_command);

    let output = push_command.run().await?;

    String::from_utf8(output.stdout).map_err(PushError::Utf8)
}

// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

//! `aws deploy push` does not create the deployment itself, it prints a
//! suggested `aws deploy create-deployment` invocation with placeholders:
//!
//! ```text
//! To deploy with this revision, run:
//! aws deploy create-deployment --application-name Wellington --s3-location bucket=...,key=...,bundleType=zip,eTag=... --deployment-group-name <deployment-group-name> --deployment-config-name <deployment-config-name> --description <description>
//! ```
//!
//! Everything this crate knows about that human readable line lives here.

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command as TokioCommand;

use crate::command::{Command, CommandError};
use crate::target::Deployment;

pub const SUGGESTION_MARKER: &str = "aws deploy create-deployment";

/// Flags of the suggested command which are dropped together with their value.
pub const REPLACED_FLAGS: [&str; 3] = [
    "--deployment-group-name",
    "--deployment-config-name",
    "--description",
];

#[derive(Error, Debug)]
pub enum CreateDeploymentError {
    #[error("aws deploy push output did not contain a suggested `{}` command", SUGGESTION_MARKER)]
    MissingSuggestion,
    #[error("Suggested create-deployment command has unbalanced quoting: {0}")]
    Quoting(String),
    #[error("{0}")]
    Command(#[from] CommandError),
}

/// First line of `stdout` mentioning the marker, starting at the marker.
pub fn find_suggestion(stdout: &str) -> Result<&str, CreateDeploymentError> {
    stdout
        .lines()
        .find_map(|line| line.find(SUGGESTION_MARKER).map(|i| line[i..].trim_end()))
        .ok_or(CreateDeploymentError::MissingSuggestion)
}

fn is_replaced_flag(part: &str) -> bool {
    REPLACED_FLAGS.contains(&part)
}

fn is_replaced_flag_with_value(part: &str) -> bool {
    match part.split_once('=') {
        Some((flag, _)) => is_replaced_flag(flag),
        None => false,
    }
}

/// Drops every replaced flag along with the token following it.
pub fn strip_replaced_flags(parts: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(parts.len());
    let mut skip_next = false;

    for part in parts {
        if skip_next {
            skip_next = false;
            continue;
        }

        if is_replaced_flag(&part) {
            skip_next = true;
            continue;
        }

        if is_replaced_flag_with_value(&part) {
            continue;
        }

        kept.push(part);
    }

    kept
}

/// Tokenized create-deployment command pointed at `deployment`.
pub fn retarget(line: &str, deployment: &Deployment) -> Result<Vec<String>, CreateDeploymentError> {
    let parts =
        shlex::split(line).ok_or_else(|| CreateDeploymentError::Quoting(line.to_string()))?;

    let mut parts = strip_replaced_flags(parts);

    parts.push("--description".to_string());
    parts.push(deployment.description.clone());
    parts.push("--deployment-group-name".to_string());
    parts.push(deployment.group.clone());

    Ok(parts)
}

/// The create-deployment command to run for a given `aws deploy push` output.
pub fn deployment_command(
    aws_cli: &str,
    push_stdout: &str,
    deployment: &Deployment,
) -> Result<Command, CreateDeploymentError> {
    let line = find_suggestion(push_stdout)?;
    debug!("Suggested command: {}", line);

    let parts = retarget(line, deployment)?;

    // parts[0] is the `aws` of the marker
    let mut command = TokioCommand::new(aws_cli);
    command.args(&parts[1..]);

    Ok(Command::new("aws deploy create-deployment", command))
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct CreatedDeployment {
    #[serde(rename(deserialize = "deploymentId"))]
    pub deployment_id: String,
}

/// Runs the retargeted command, returning the new deployment id when the CLI reported one.
pub async fn create_deployment(
    aws_cli: &str,
    push_stdout: &str,
    deployment: &Deployment,
) -> Result<Option<String>, CreateDeploymentError> {
    let mut command = deployment_command(aws_cli, push_stdout, deployment)?;

    info!(
        "Creating deployment of `{}` in group `{}`",
        deployment.tag, deployment.group
    );
    debug!("create-deployment command: {}", command);

    let output = command.run().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    match serde_json::from_str::<CreatedDeployment>(&stdout) {
        Ok(created) => Ok(Some(created.deployment_id)),
        Err(e) => {
            debug!("create-deployment output is not a deployment document: {}", e);
            if !stdout.trim().is_empty() {
                info!("{}", stdout.trim_end());
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH_OUTPUT: &str = "To deploy with this revision, run:\n\
        aws deploy create-deployment --application-name Wellington \
        --s3-location bucket=deploy.chicon.org,key=wellington/staging.zip,bundleType=zip,eTag=\"0123abcd\" \
        --deployment-group-name <deployment-group-name> \
        --deployment-config-name <deployment-config-name> \
        --description <description>\n";

    fn staging() -> Deployment {
        Deployment {
            tag: "staging".to_string(),
            group: "staging".to_string(),
            description: "Deploy staging".to_string(),
        }
    }

    fn count(parts: &[String], token: &str) -> usize {
        parts.iter().filter(|p| *p == token).count()
    }

    fn value_of<'a>(parts: &'a [String], flag: &str) -> Option<&'a str> {
        parts
            .iter()
            .position(|p| p == flag)
            .and_then(|i| parts.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_find_suggestion() {
        assert!(find_suggestion(PUSH_OUTPUT)
            .unwrap()
            .starts_with("aws deploy create-deployment --application-name Wellington"));

        assert_eq!(
            find_suggestion("run: aws deploy create-deployment --a 1\naws deploy create-deployment --b 2\n").unwrap(),
            "aws deploy create-deployment --a 1"
        );
    }

    #[test]
    fn test_missing_suggestion() {
        assert!(matches!(
            find_suggestion("Upload complete.\n"),
            Err(CreateDeploymentError::MissingSuggestion)
        ));
        assert!(matches!(
            deployment_command("aws", "", &staging()),
            Err(CreateDeploymentError::MissingSuggestion)
        ));
    }

    #[test]
    fn test_retarget_replaces_pairs() {
        let line = find_suggestion(PUSH_OUTPUT).unwrap();
        let parts = retarget(line, &staging()).unwrap();

        assert_eq!(
            parts,
            vec![
                "aws",
                "deploy",
                "create-deployment",
                "--application-name",
                "Wellington",
                "--s3-location",
                "bucket=deploy.chicon.org,key=wellington/staging.zip,bundleType=zip,eTag=0123abcd",
                "--description",
                "Deploy staging",
                "--deployment-group-name",
                "staging",
            ]
        );
    }

    #[test]
    fn test_retarget_old_values() {
        let line = "... aws deploy create-deployment --application-name X \
            --deployment-group-name OLD --description \"old desc\" --file-exists-behavior OVERWRITE";
        let deployment = Deployment {
            tag: "release".to_string(),
            group: "prod".to_string(),
            description: "Deploy release".to_string(),
        };

        let parts = retarget(find_suggestion(line).unwrap(), &deployment).unwrap();

        assert_eq!(count(&parts, "--deployment-group-name"), 1);
        assert_eq!(count(&parts, "--description"), 1);
        assert_eq!(count(&parts, "--deployment-config-name"), 0);
        assert_eq!(count(&parts, "OLD"), 0);
        assert_eq!(count(&parts, "old desc"), 0);
        assert_eq!(value_of(&parts, "--deployment-group-name"), Some("prod"));
        assert_eq!(value_of(&parts, "--description"), Some("Deploy release"));
        assert_eq!(parts[0], "aws");
        assert_eq!(
            &parts[3..7],
            &["--application-name", "X", "--file-exists-behavior", "OVERWRITE"]
        );
    }

    #[test]
    fn test_strip_keeps_order() {
        let parts: Vec<String> = vec![
            "a",
            "--description",
            "x",
            "b",
            "--deployment-config-name=CodeDeployDefault.AllAtOnce",
            "c",
            "--deployment-group-name",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(strip_replaced_flags(parts), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unbalanced_quoting() {
        assert!(matches!(
            retarget("aws deploy create-deployment --description \"oops", &staging()),
            Err(CreateDeploymentError::Quoting(_))
        ));
    }

    #[test]
    fn test_deployment_command_uses_configured_cli() {
        let command = deployment_command("/opt/aws/bin/aws", PUSH_OUTPUT, &staging()).unwrap();
        let inner = command.command.as_std();

        assert_eq!(inner.get_program(), "/opt/aws/bin/aws");
        assert_eq!(
            inner.get_args().take(2).collect::<Vec<_>>(),
            vec!["deploy", "create-deployment"]
        );
    }

    #[test]
    fn test_created_deployment_document() {
        let created: CreatedDeployment =
            serde_json::from_str("{\n    \"deploymentId\": \"d-A1B2C3D4E\"\n}\n").unwrap();
        assert_eq!(created.deployment_id, "d-A1B2C3D4E");
    }
}

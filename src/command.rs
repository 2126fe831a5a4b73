// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
//
// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command as TokioCommand;

#[derive(Error, Debug)]
pub enum CommandError {
    Run(&'static str, String, std::io::Error),
    Exit(&'static str, String, Output),
}

impl CommandError {
    /// Exit code to hand back to our own caller. Signals and spawn failures map to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Run(..) => 1,
            CommandError::Exit(_, _, output) => match output.status.code() {
                Some(0) | None => 1,
                Some(code) => code,
            },
        }
    }

    pub fn output(&self) -> Option<&Output> {
        match self {
            CommandError::Run(..) => None,
            CommandError::Exit(_, _, output) => Some(output),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Run(title, cmd, err) => {
                write!(f, "Failed to run {} command `{}`: {}", title, cmd, err)
            }
            CommandError::Exit(title, cmd, output) => {
                write!(
                    f,
                    "{} command resulted in a bad exit code: {:?}. The failed command is provided below:\n{}\n--- STDOUT ---\n{}\n--- STDERR ---\n{}",
                    title,
                    output.status.code(),
                    cmd,
                    String::from_utf8_lossy(&output.stdout).trim_end(),
                    String::from_utf8_lossy(&output.stderr).trim_end(),
                )
            }
        }
    }
}

/// A wrapper over `tokio::process::Command` which captures output and turns a bad exit into an error.
#[derive(Debug)]
pub struct Command {
    pub title: &'static str,
    pub command: TokioCommand,
}

impl Command {
    pub fn new(title: &'static str, command: TokioCommand) -> Command {
        Command { title, command }
    }

    /// The command line as a shell would read it.
    pub fn line(&self) -> String {
        let inner = self.command.as_std();

        std::iter::once(inner.get_program())
            .chain(inner.get_args())
            .map(|part| {
                let part = part.to_string_lossy();
                shlex::try_quote(&part)
                    .map(|quoted| quoted.into_owned())
                    .unwrap_or_else(|_| part.to_string())
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    pub async fn run(&mut self) -> Result<Output, CommandError> {
        let title = self.title;
        let line = self.line();

        let output = self
            .command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| CommandError::Run(title, line.clone(), err))?;

        match output.status.code() {
            Some(0) => Ok(output),
            _exit_code => Err(CommandError::Exit(title, line, output)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line())
    }
}

#[test]
fn test_command_line_quotes_arguments() {
    let mut command = TokioCommand::new("aws");
    command
        .arg("deploy")
        .arg("--description")
        .arg("Deploy staging");

    let line = Command::new("test", command).line();

    assert_eq!(
        shlex::split(&line).unwrap(),
        vec!["aws", "deploy", "--description", "Deploy staging"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_bad_exit_keeps_output() {
    let mut command = TokioCommand::new("sh");
    command.arg("-c").arg("echo out; echo err >&2; exit 7");

    let err = Command::new("Shell", command).run().await.unwrap_err();

    assert_eq!(err.exit_code(), 7);
    let output = err.output().unwrap();
    assert_eq!(output.stdout, b"out\n");
    assert_eq!(output.stderr, b"err\n");

    let message = err.to_string();
    assert!(message.starts_with("Shell command resulted in a bad exit code: Some(7)"));
    assert!(message.contains("The failed command is provided below:\nsh -c "));
    assert!(message.contains("--- STDOUT ---\nout\n--- STDERR ---\nerr"));
}

#[tokio::test]
async fn test_missing_program_is_a_run_error() {
    let command = TokioCommand::new("deploy-tag-this-binary-does-not-exist");

    let err = Command::new("Missing", command).run().await.unwrap_err();

    assert!(matches!(err, CommandError::Run(..)));
    assert_eq!(err.exit_code(), 1);
}

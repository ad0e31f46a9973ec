//! Docker credential helper protocol
//!
//! Runs `docker-credential-<name> get|list` as a subprocess. `get` takes the
//! registry hostname on stdin and replies with
//! `{"ServerURL": ..., "Username": ..., "Secret": ...}`; `list` replies with a
//! JSON object keyed by registry address.

use crate::error::LookupFailure;
use crate::model::AuthConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Default command prefix for credential helpers.
pub const DEFAULT_HELPER_PREFIX: &str = "docker-credential-";
/// Default command suffix (platform specific extensions go here).
pub const DEFAULT_HELPER_SUFFIX: &str = "";

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Process execution capability.
///
/// A non-zero exit status is not an error; only failing to run the
/// command at all is.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &[String], stdin: Option<&str>) -> io::Result<CommandOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, command: &[String], stdin: Option<&str>) -> io::Result<CommandOutput> {
        (**self).run(command, stdin)
    }
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &[String], stdin: Option<&str>) -> io::Result<CommandOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // helper によっては stdin を読まずに終了する
        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes()).ok();
        }

        let output = child.wait_with_output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Reply of a helper's `get` subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CredentialReply {
    #[serde(rename = "ServerURL", default)]
    pub server_url: Option<String>,
    #[serde(rename = "Username", default)]
    pub username: Option<String>,
    #[serde(rename = "Secret", default)]
    pub secret: Option<String>,
}

impl CredentialReply {
    /// Convert into an AuthConfig, falling back to `registry` when the
    /// helper did not report a server URL.
    pub fn into_auth_config(self, registry: &str) -> AuthConfig {
        let registry_address = self
            .server_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| registry.to_string());

        AuthConfig {
            registry_address: Some(registry_address),
            username: self.username,
            password: self.secret,
            ..Default::default()
        }
    }
}

/// A single credential helper program.
pub struct CredentialHelper<'a> {
    command: String,
    runner: &'a dyn CommandRunner,
}

impl<'a> CredentialHelper<'a> {
    pub fn new(prefix: &str, name: &str, suffix: &str, runner: &'a dyn CommandRunner) -> Self {
        Self {
            command: format!("{}{}{}", prefix, name, suffix),
            runner,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Ask the helper for the credentials of `registry`.
    ///
    /// Returns `Ok(None)` when the reply is empty or not a JSON object.
    pub fn get(&self, registry: &str) -> Result<Option<CredentialReply>, LookupFailure> {
        let data = self.run("get", Some(registry))?;
        tracing::debug!("Credential helper response received from {}", self.command);
        Ok(parse_reply(&data))
    }

    /// Registry addresses the helper holds credentials for.
    pub fn list(&self) -> Result<Vec<String>, LookupFailure> {
        let data = self.run("list", None)?;
        tracing::debug!("Credential helper response: {}", data.trim());
        Ok(parse_reply::<BTreeMap<String, serde_json::Value>>(&data)
            .map(|listing| listing.into_keys().collect())
            .unwrap_or_default())
    }

    fn run(&self, subcommand: &str, stdin: Option<&str>) -> Result<String, LookupFailure> {
        let command_line = [self.command.clone(), subcommand.to_string()];

        let output = self.runner.run(&command_line, stdin).map_err(|source| {
            tracing::error!("Failure running command ({:?})", command_line);
            LookupFailure::Launch {
                command: self.command.clone(),
                source,
            }
        })?;

        if !output.stderr.trim().is_empty() {
            tracing::error!("{:?}: {}", command_line, output.stderr.trim());
        }

        Ok(output.stdout)
    }
}

fn parse_reply<T: DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Failure parsing the json response {:?}: {}", data, e);
            None
        }
    }
}

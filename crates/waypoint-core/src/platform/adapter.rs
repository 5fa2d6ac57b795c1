use std::{
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use tokio::process::Command;

use super::{CommandAnalysis, CommandMetadata, CommandOutcome, CommandReport, HostPlatform};
use crate::{
    config::EngineConfig,
    error::CommandError,
    safety::{validate_syntax, CommandClassifier, RiskLevel},
};

/// Unix commands rewritten to their Windows counterparts.
const WINDOWS_ADAPTATIONS: &[(&str, &str)] = &[
    ("ls", "dir"),
    ("cat", "type"),
    ("grep", "findstr"),
    ("ps", "tasklist"),
    ("which", "where"),
];

/// Runs commands on the host after validating, classifying and adapting
/// them.
#[derive(Debug, Clone)]
pub struct PlatformAdapter {
    platform: HostPlatform,
    classifier: CommandClassifier,
    command_timeout: Duration,
    max_command_length: usize,
}

impl PlatformAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            platform: HostPlatform::current(),
            classifier: CommandClassifier::new(),
            command_timeout: config.command_timeout,
            max_command_length: config.max_command_length,
        }
    }

    /// Overrides the detected platform. Only adaptation and shell selection
    /// change; the process still runs on the real host.
    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }

    /// Rewrites a leading Unix command to its Windows counterpart on Windows.
    /// On POSIX the command is returned unchanged.
    pub fn adapt(&self, command: &str) -> String {
        if self.platform != HostPlatform::Windows {
            return command.to_string();
        }

        let trimmed = command.trim_start();
        let head = trimmed.split_whitespace().next().unwrap_or_default();
        match WINDOWS_ADAPTATIONS.iter().find(|(unix, _)| *unix == head) {
            Some((_, windows)) => format!("{windows}{}", &trimmed[head.len()..]),
            None => command.to_string(),
        }
    }

    /// Classifies and adapts `command` without running it.
    pub fn analyze(&self, command: &str) -> CommandAnalysis {
        CommandAnalysis {
            command: command.to_string(),
            classification: self.classifier.classify(command),
            adapted_command: self.adapt(command),
            platform: self.platform,
            validation_error: self.validate(command).err().map(|e| e.to_string()),
        }
    }

    /// Validates, classifies, adapts and runs `command`.
    ///
    /// Forbidden commands never run. Commands that require confirmation run
    /// only when `force` is set. The child is killed when the configured
    /// timeout expires. When `working_dir` names an existing directory the
    /// child starts there; otherwise it inherits the process directory.
    pub async fn execute(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        force: bool,
    ) -> CommandReport {
        let mut metadata = CommandMetadata {
            platform: Some(self.platform),
            ..CommandMetadata::default()
        };

        if let Err(error) = self.validate(command) {
            warn!("Rejected command '{command}': {error}");
            metadata.reason = error.to_string();
            return CommandReport::new(CommandOutcome::Failed(error), metadata);
        }

        let classification = self.classifier.classify(command);
        let risk_level = classification.risk_level;
        metadata.apply_classification(classification);

        match risk_level {
            RiskLevel::Forbidden => {
                warn!("Blocked forbidden command '{command}': {}", metadata.reason);
                let error = CommandError::SafetyBlocked(metadata.reason.clone());
                return CommandReport::new(CommandOutcome::Failed(error), metadata);
            }
            RiskLevel::RequiresConfirmation if !force => {
                info!("Command '{command}' requires confirmation: {}", metadata.reason);
                metadata.confirmation_required = true;
                return CommandReport::new(CommandOutcome::ConfirmationRequired, metadata);
            }
            _ => {}
        }

        let adapted = self.adapt(command);
        if adapted != command {
            metadata.adapted_command = Some(adapted.clone());
        }

        self.run(&adapted, working_dir, metadata).await
    }

    fn validate(&self, command: &str) -> Result<(), CommandError> {
        let length = command.chars().count();
        if length > self.max_command_length {
            return Err(CommandError::Validation(format!(
                "Command too long ({length} characters, max {})",
                self.max_command_length
            )));
        }
        validate_syntax(command)
    }

    fn shell_command(&self, command: &str) -> Command {
        match self.platform {
            HostPlatform::Windows => {
                let mut cmd = Command::new("powershell.exe");
                cmd.args(["-NoProfile", "-Command", command]);
                cmd
            }
            HostPlatform::Posix => {
                let mut cmd = Command::new("sh");
                cmd.args(["-c", command]);
                cmd
            }
        }
    }

    async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        mut metadata: CommandMetadata,
    ) -> CommandReport {
        let start_time = Instant::now();
        debug!("Executing command: {command}");

        let mut cmd = self.shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match working_dir {
            Some(dir) if dir.is_dir() => {
                cmd.current_dir(dir);
            }
            Some(dir) => {
                warn!(
                    "Working directory '{}' does not exist, using the process directory",
                    dir.display()
                );
            }
            None => {}
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn '{command}': {e}");
                let error = CommandError::Spawn(e.to_string());
                return CommandReport::new(CommandOutcome::Failed(error), metadata);
            }
        };

        // Dropping the timed-out future drops the child, which kills it.
        let waited = tokio::time::timeout(self.command_timeout, child.wait_with_output()).await;
        metadata.duration_ms = Some(start_time.elapsed().as_millis() as u64);

        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Failed to wait for '{command}': {e}");
                let error = CommandError::Spawn(e.to_string());
                return CommandReport::new(CommandOutcome::Failed(error), metadata);
            }
            Err(_) => {
                let seconds = self.command_timeout.as_secs();
                warn!("Command '{command}' timed out after {seconds} seconds");
                let error = CommandError::TimedOut { seconds };
                return CommandReport::new(CommandOutcome::Failed(error), metadata);
            }
        };

        let exit_code = output.status.code();
        metadata.exit_code = exit_code;

        let outcome = if output.status.success() {
            info!(
                "Command '{command}' completed successfully in {}ms",
                metadata.duration_ms.unwrap_or_default()
            );
            CommandOutcome::Succeeded
        } else {
            warn!("Command '{command}' failed with exit code {exit_code:?}");
            CommandOutcome::Failed(CommandError::NonZeroExit { code: exit_code })
        };

        CommandReport {
            outcome,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            metadata,
        }
    }
}

//! Preview configuration types.

use crate::error::{Result, SandboxError};
use std::fmt;
use std::time::Duration;

/// A program plus its arguments, as handed to the sandbox spawn API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build a command spec from a program and arguments.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Configuration for the preview orchestrator and coordinator.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Working directory name inside the sandbox.
    pub workdir_name: String,
    /// Dependency-install command, run before the first server start.
    pub install_command: CommandSpec,
    /// Long-running dev-server command, spawned once per instance.
    pub dev_command: CommandSpec,
    /// Debounce window for bursty update submissions.
    pub debounce: Duration,
    /// Upper bound on waiting for a readiness signal.
    pub ready_timeout: Duration,
    /// Output substrings that mark the server as listening
    /// (fallback when the runtime emits no explicit ready event).
    pub ready_markers: Vec<String>,
    /// Preview URL to report when readiness came from the marker heuristic.
    pub fallback_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            workdir_name: "webuild-app".to_string(),
            install_command: CommandSpec::new("npm", &["install"]),
            dev_command: CommandSpec::new("npm", &["run", "dev"]),
            debounce: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(60),
            ready_markers: vec![
                "ready".to_string(),
                "Local:".to_string(),
                "localhost:".to_string(),
            ],
            fallback_url: "http://localhost:3000".to_string(),
        }
    }
}

impl PreviewConfig {
    /// Create a new config builder.
    pub fn builder() -> PreviewConfigBuilder {
        PreviewConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.workdir_name.is_empty() {
            return Err(SandboxError::Generic("workdir_name is required".into()));
        }
        if self.install_command.program.is_empty() || self.dev_command.program.is_empty() {
            return Err(SandboxError::Generic(
                "install and dev commands are required".into(),
            ));
        }
        if self.debounce.is_zero() {
            return Err(SandboxError::Generic("debounce must be > 0".into()));
        }
        if self.ready_timeout.is_zero() {
            return Err(SandboxError::Generic("ready_timeout must be > 0".into()));
        }
        if self.ready_markers.is_empty() {
            return Err(SandboxError::Generic(
                "at least one ready marker is required".into(),
            ));
        }
        if self.fallback_url.is_empty() {
            return Err(SandboxError::Generic("fallback_url is required".into()));
        }
        Ok(())
    }
}

/// Builder for [`PreviewConfig`].
#[derive(Debug, Default)]
pub struct PreviewConfigBuilder {
    config: PreviewConfig,
}

impl PreviewConfigBuilder {
    /// Set the working directory name.
    pub fn workdir_name(mut self, name: impl Into<String>) -> Self {
        self.config.workdir_name = name.into();
        self
    }

    /// Set the dependency-install command.
    pub fn install_command(mut self, command: CommandSpec) -> Self {
        self.config.install_command = command;
        self
    }

    /// Set the dev-server command.
    pub fn dev_command(mut self, command: CommandSpec) -> Self {
        self.config.dev_command = command;
        self
    }

    /// Set the debounce window.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    /// Set the readiness-wait upper bound.
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    /// Replace the readiness output markers.
    pub fn ready_markers(mut self, markers: &[&str]) -> Self {
        self.config.ready_markers = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Set the heuristic fallback preview URL.
    pub fn fallback_url(mut self, url: impl Into<String>) -> Self {
        self.config.fallback_url = url.into();
        self
    }

    /// Build the configuration, validating all required fields.
    pub fn build(self) -> Result<PreviewConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.workdir_name, "webuild-app");
        assert_eq!(config.install_command.to_string(), "npm install");
        assert_eq!(config.dev_command.to_string(), "npm run dev");
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_empty_workdir() {
        let result = PreviewConfig::builder().workdir_name("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_debounce() {
        let result = PreviewConfig::builder().debounce(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_success() {
        let config = PreviewConfig::builder()
            .workdir_name("my-app")
            .dev_command(CommandSpec::new("pnpm", &["dev"]))
            .ready_timeout(Duration::from_secs(30))
            .ready_markers(&["Listening on"])
            .fallback_url("http://localhost:5173")
            .build()
            .expect("should build successfully");

        assert_eq!(config.workdir_name, "my-app");
        assert_eq!(config.dev_command.to_string(), "pnpm dev");
        assert_eq!(config.ready_timeout, Duration::from_secs(30));
        assert_eq!(config.fallback_url, "http://localhost:5173");
    }
}

//! Sandbox runtime contract.
//!
//! The orchestrator never talks to a concrete sandbox technology directly;
//! it drives whatever implements these traits. The contract mirrors what an
//! ephemeral web-container style runtime offers: boot an instance, write
//! files into its filesystem, spawn processes, observe their output, and
//! get told when the dev server is accepting connections.

use crate::config::PreviewConfig;
use crate::error::{Result, SandboxError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Explicit readiness notification from the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadySignal {
    /// Port the server is listening on.
    pub port: u16,
    /// URL the preview is reachable at.
    pub url: String,
}

/// Factory for sandbox instances.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Boot a fresh sandbox instance.
    ///
    /// # Errors
    ///
    /// Implementations classify boot failures so the caller can present
    /// differentiated guidance: [`SandboxError::BootResourceLimit`] when the
    /// environment refuses another instance,
    /// [`SandboxError::BootIsolationUnsupported`] when the required isolation
    /// primitives are missing, [`SandboxError::Generic`] otherwise.
    async fn boot(&self, config: &PreviewConfig) -> Result<Box<dyn SandboxInstance>>;
}

/// One live sandbox: a private filesystem plus a process table.
#[async_trait]
pub trait SandboxInstance: Send {
    /// Write `content` to `path`, replacing any existing file.
    async fn write_file(&mut self, path: &str, content: &str) -> Result<()>;

    /// Read a file back as a string.
    async fn read_file(&mut self, path: &str) -> Result<String>;

    /// Create a directory and any missing parents. Idempotent; an
    /// already-existing directory is not an error.
    async fn mkdir_all(&mut self, path: &str) -> Result<()>;

    /// Remove a file or directory tree.
    async fn remove(&mut self, path: &str) -> Result<()>;

    /// Spawn a process inside the sandbox.
    async fn spawn(&mut self, program: &str, args: &[String]) -> Result<Box<dyn SandboxProcess>>;

    /// Take the stream of explicit readiness signals.
    ///
    /// Returns `Some` exactly once; the orchestrator owns the receiver for
    /// the lifetime of the instance. Runtimes without an explicit ready
    /// event may return `None`.
    fn take_ready_signals(&mut self) -> Option<mpsc::UnboundedReceiver<ReadySignal>>;

    /// Destroy the instance and everything in it.
    async fn teardown(&mut self) -> Result<()>;
}

/// A process spawned inside the sandbox.
#[async_trait]
pub trait SandboxProcess: Send {
    /// Take the process output stream (stdout and stderr interleaved,
    /// line-chunked). Returns `Some` exactly once.
    fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<String>>;

    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> i32;

    /// Exit code if the process has already terminated, without blocking.
    fn exit_code(&self) -> Option<i32>;

    /// Forcibly stop the process.
    async fn kill(&mut self);
}

/// Helper for wrapping instance-level failures with path context.
pub(crate) fn mount_failure(path: &str, source: SandboxError) -> SandboxError {
    SandboxError::MountFailure {
        path: path.to_string(),
        reason: source.to_string(),
    }
}

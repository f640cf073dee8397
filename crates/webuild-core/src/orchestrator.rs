//! Preview orchestrator - drives one sandbox through its lifecycle.
//!
//! Owns at most one sandbox instance at a time and runs the
//! boot -> mount -> install -> start -> serving state machine for every
//! apply cycle. `apply` takes `&mut self`, so a cycle can never overlap
//! another on the same orchestrator; coalescing bursty callers into
//! serialized cycles is the update coordinator's job.

use crate::config::PreviewConfig;
use crate::error::{Result, SandboxError};
use crate::runtime::{mount_failure, SandboxInstance, SandboxProcess, SandboxRuntime};
use crate::scaffold;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;
use webuild_blocks::{CommandOperation, FileAction, FileOperation, ParseResult};

/// Unique identifier for a sandbox instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxId(Uuid);

impl SandboxId {
    /// Create a new random sandbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current position in the sandbox lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// No instance exists yet (or it was torn down).
    Uninitialized,
    /// An instance is being booted.
    Booting,
    /// Files are being written into the instance.
    Mounting,
    /// Dependencies are installing.
    Installing,
    /// The dev server was spawned and readiness is awaited.
    Starting,
    /// The dev server is accepting connections.
    Serving,
    /// The last cycle failed; a retry or hard reset is required.
    Failed,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Booting => write!(f, "booting"),
            Self::Mounting => write!(f, "mounting"),
            Self::Installing => write!(f, "installing"),
            Self::Starting => write!(f, "starting"),
            Self::Serving => write!(f, "serving"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

type ReadyListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Listener registry with replay-last-value semantics.
#[derive(Default)]
struct ReadyRegistry {
    next_id: u64,
    listeners: HashMap<u64, ReadyListener>,
    last_url: Option<String>,
}

fn lock_registry(registry: &Mutex<ReadyRegistry>) -> MutexGuard<'_, ReadyRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`PreviewOrchestrator::on_ready`].
///
/// The listener stays registered until this is dropped or
/// [`unsubscribe`](ReadySubscription::unsubscribe) is called.
pub struct ReadySubscription {
    id: u64,
    registry: Weak<Mutex<ReadyRegistry>>,
}

impl ReadySubscription {
    /// Remove the listener now instead of on drop.
    pub fn unsubscribe(self) {}
}

impl Drop for ReadySubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock_registry(&registry).listeners.remove(&self.id);
        }
    }
}

/// Exclusive ownership of the one live sandbox instance.
struct SandboxHandle {
    id: SandboxId,
    instance: Box<dyn SandboxInstance>,
    /// Merged readiness events: explicit runtime signals and output-marker
    /// hits both land here; the first one observed per wait wins.
    ready_events: mpsc::UnboundedReceiver<String>,
    ready_sender: mpsc::UnboundedSender<String>,
    created_at: DateTime<Utc>,
}

/// Drives one sandbox instance through boot, file sync, install, server
/// start, and readiness, and fans readiness out to registered listeners.
///
/// Explicitly constructed and explicitly owned; there is no process-wide
/// instance. Callers that need shared access wrap it in
/// `Arc<tokio::sync::Mutex<_>>` (the update coordinator does exactly that).
pub struct PreviewOrchestrator {
    config: PreviewConfig,
    runtime: Box<dyn SandboxRuntime>,
    state: SandboxState,
    handle: Option<SandboxHandle>,
    server: Option<Box<dyn SandboxProcess>>,
    registry: Arc<Mutex<ReadyRegistry>>,
}

impl PreviewOrchestrator {
    /// Create an orchestrator over the given runtime.
    ///
    /// Nothing is booted yet; the first [`apply`](Self::apply) call boots
    /// lazily.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration fails validation.
    pub fn new(runtime: Box<dyn SandboxRuntime>, config: PreviewConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runtime,
            state: SandboxState::Uninitialized,
            handle: None,
            server: None,
            registry: Arc::new(Mutex::new(ReadyRegistry::default())),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// True when the dev server is accepting connections.
    pub fn is_ready(&self) -> bool {
        self.state == SandboxState::Serving
    }

    /// Last reported preview URL, if any.
    pub fn preview_url(&self) -> Option<String> {
        lock_registry(&self.registry).last_url.clone()
    }

    /// When the current instance was booted, if one exists.
    pub fn booted_at(&self) -> Option<DateTime<Utc>> {
        self.handle.as_ref().map(|h| h.created_at)
    }

    /// Register a readiness listener.
    ///
    /// If a preview URL is already known, the listener fires immediately
    /// with it (replay-last-value); afterwards it fires once per
    /// successful `Serving` transition.
    pub fn on_ready<F>(&self, listener: F) -> ReadySubscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let listener: ReadyListener = Arc::new(listener);
        let (id, replay) = {
            let mut registry = lock_registry(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.insert(id, Arc::clone(&listener));
            (id, registry.last_url.clone())
        };
        if let Some(url) = replay {
            listener(&url);
        }
        ReadySubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Run one apply cycle: sync files, run commands, and bring the dev
    /// server to readiness.
    ///
    /// The result is consumed; file operations execute in parser order and
    /// commands strictly after them. On success the state is `Serving` and
    /// every registered listener has been notified with the preview URL.
    ///
    /// # Errors
    ///
    /// Any failure aborts the cycle, transitions the state to `Failed`,
    /// and is returned to the caller as retryable.
    pub async fn apply(&mut self, result: ParseResult) -> Result<()> {
        tracing::info!(
            files = result.files.len(),
            commands = result.commands.len(),
            blocks = result.total_blocks,
            state = %self.state,
            "starting apply cycle"
        );
        let start = std::time::Instant::now();

        match self.run_cycle(result).await {
            Ok(()) => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "apply cycle complete"
                );
                Ok(())
            }
            Err(e) => {
                self.transition(SandboxState::Failed);
                tracing::warn!(error = %e, "apply cycle failed");
                Err(e)
            }
        }
    }

    /// Stop the server, destroy the instance, and forget all listeners and
    /// the cached URL. The next `apply` boots from scratch.
    pub async fn teardown(&mut self) {
        tracing::info!("tearing down sandbox");

        if let Some(mut server) = self.server.take() {
            server.kill().await;
        }
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.instance.teardown().await {
                tracing::warn!(sandbox_id = %handle.id, error = %e, "instance teardown reported an error");
            }
        }

        let mut registry = lock_registry(&self.registry);
        registry.listeners.clear();
        registry.last_url = None;
        drop(registry);

        self.transition(SandboxState::Uninitialized);
    }

    /// Discard the instance and restart the state machine from
    /// `Uninitialized`, accepting a fresh boot on the next `apply`.
    pub async fn hard_reset(&mut self) {
        tracing::info!(state = %self.state, "hard reset");
        self.teardown().await;
    }

    async fn run_cycle(&mut self, result: ParseResult) -> Result<()> {
        self.ensure_booted().await?;

        self.transition(SandboxState::Mounting);
        self.mount(&result.files).await?;
        self.run_commands(&result.commands).await?;

        self.transition(SandboxState::Installing);
        let server_alive = self
            .server
            .as_ref()
            .map(|s| s.exit_code().is_none())
            .unwrap_or(false);

        let url = if server_alive {
            tracing::debug!("dev server still running, resync only");
            self.transition(SandboxState::Starting);
            lock_registry(&self.registry)
                .last_url
                .clone()
                .unwrap_or_else(|| self.config.fallback_url.clone())
        } else {
            self.install().await?;
            self.transition(SandboxState::Starting);
            self.start_server().await?
        };

        self.transition(SandboxState::Serving);
        self.notify_ready(&url);
        Ok(())
    }

    /// Boot the sandbox if no instance exists yet. Boot happens at most
    /// once per instance; a `Failed` state with a live instance re-enters
    /// through `Booting` without rebooting.
    async fn ensure_booted(&mut self) -> Result<()> {
        if self.handle.is_some() {
            if self.state == SandboxState::Failed {
                self.transition(SandboxState::Booting);
            }
            return Ok(());
        }

        self.transition(SandboxState::Booting);
        let id = SandboxId::new();
        let start = std::time::Instant::now();
        tracing::info!(sandbox_id = %id, workdir = %self.config.workdir_name, "booting sandbox");

        let mut instance = self.runtime.boot(&self.config).await?;

        let (ready_sender, ready_events) = mpsc::unbounded_channel();
        if let Some(mut signals) = instance.take_ready_signals() {
            let tx = ready_sender.clone();
            tokio::spawn(async move {
                while let Some(signal) = signals.recv().await {
                    tracing::debug!(url = %signal.url, port = signal.port, "runtime ready signal");
                    if tx.send(signal.url).is_err() {
                        break;
                    }
                }
            });
        }

        scaffold::ensure_scaffold(instance.as_mut()).await?;

        tracing::info!(
            sandbox_id = %id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sandbox booted"
        );
        self.handle = Some(SandboxHandle {
            id,
            instance,
            ready_events,
            ready_sender,
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Write and delete files in parser order.
    ///
    /// Create/update failures abort the cycle; delete failures are logged
    /// and skipped so unrelated writes in the same cycle still land.
    async fn mount(&mut self, files: &[FileOperation]) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(SandboxError::Generic("no sandbox instance to mount into".into()));
        };

        for op in files {
            match op.action {
                FileAction::Create | FileAction::Update => {
                    if let Some((parent, _)) = op.path.rsplit_once('/') {
                        handle
                            .instance
                            .mkdir_all(parent)
                            .await
                            .map_err(|e| mount_failure(parent, e))?;
                    }
                    handle
                        .instance
                        .write_file(&op.path, &op.content)
                        .await
                        .map_err(|e| mount_failure(&op.path, e))?;
                    tracing::debug!(
                        sandbox_id = %handle.id,
                        path = %op.path,
                        bytes = op.size,
                        action = %op.action,
                        "file written"
                    );
                }
                FileAction::Delete => {
                    if let Err(e) = handle.instance.remove(&op.path).await {
                        tracing::warn!(
                            sandbox_id = %handle.id,
                            path = %op.path,
                            error = %e,
                            "delete failed, continuing"
                        );
                    } else {
                        tracing::debug!(sandbox_id = %handle.id, path = %op.path, "file deleted");
                    }
                }
            }
        }
        Ok(())
    }

    /// Run terminal commands, strictly after the file sync.
    ///
    /// A command that cannot be spawned aborts the cycle; a non-zero exit
    /// is logged and tolerated.
    async fn run_commands(&mut self, commands: &[CommandOperation]) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(SandboxError::Generic("no sandbox instance to run commands in".into()));
        };

        for op in commands {
            tracing::info!(sandbox_id = %handle.id, command = %op.command, "running command");
            let mut process = handle
                .instance
                .spawn("sh", &["-c".to_string(), op.command.clone()])
                .await
                .map_err(|e| SandboxError::CommandFailure {
                    command: op.command.clone(),
                    reason: e.to_string(),
                })?;
            pump_output(process.as_mut(), "command");
            let code = process.wait().await;
            if code != 0 {
                tracing::warn!(command = %op.command, code, "command exited non-zero");
            }
        }
        Ok(())
    }

    /// Run the dependency install. A non-zero exit is logged but does not
    /// block progression to the server start.
    async fn install(&mut self) -> Result<()> {
        let command = self.config.install_command.clone();
        let Some(handle) = self.handle.as_mut() else {
            return Err(SandboxError::Generic("no sandbox instance to install in".into()));
        };

        tracing::info!(sandbox_id = %handle.id, command = %command, "installing dependencies");
        let mut process = handle
            .instance
            .spawn(&command.program, &command.args)
            .await
            .map_err(|e| SandboxError::CommandFailure {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
        pump_output(process.as_mut(), "install");

        let code = process.wait().await;
        if code != 0 {
            tracing::warn!(code, "dependency install exited non-zero, continuing");
        }
        Ok(())
    }

    /// Spawn the dev server and wait for the first readiness signal:
    /// either the runtime's explicit event or an output marker, whichever
    /// arrives first, bounded by the configured timeout.
    async fn start_server(&mut self) -> Result<String> {
        let command = self.config.dev_command.clone();
        let markers = self.config.ready_markers.clone();
        let fallback_url = self.config.fallback_url.clone();
        let deadline = self.config.ready_timeout;

        let Some(handle) = self.handle.as_mut() else {
            return Err(SandboxError::Generic("no sandbox instance to start a server in".into()));
        };

        // Signals from a previous server must not satisfy this wait.
        while handle.ready_events.try_recv().is_ok() {}

        tracing::info!(sandbox_id = %handle.id, command = %command, "starting dev server");
        let mut process = handle
            .instance
            .spawn(&command.program, &command.args)
            .await
            .map_err(|e| SandboxError::CommandFailure {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(mut output) = process.take_output() {
            let tx = handle.ready_sender.clone();
            tokio::spawn(async move {
                let mut signalled = false;
                while let Some(line) = output.recv().await {
                    tracing::debug!(line = %line.trim_end(), "dev server output");
                    if !signalled && markers.iter().any(|m| line.contains(m.as_str())) {
                        signalled = true;
                        let _ = tx.send(fallback_url.clone());
                    }
                }
            });
        }

        let url = match timeout(
            deadline,
            await_ready(&mut handle.ready_events, process.as_mut()),
        )
        .await
        {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                process.kill().await;
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(timeout_secs = deadline.as_secs(), "readiness wait timed out");
                process.kill().await;
                return Err(SandboxError::ServerStartTimeout(deadline));
            }
        };

        self.server = Some(process);
        Ok(url)
    }

    fn notify_ready(&self, url: &str) {
        let listeners: Vec<ReadyListener> = {
            let mut registry = lock_registry(&self.registry);
            registry.last_url = Some(url.to_string());
            registry.listeners.values().cloned().collect()
        };
        tracing::info!(url = %url, listeners = listeners.len(), "preview ready");
        for listener in listeners {
            listener(url);
        }
    }

    fn transition(&mut self, to: SandboxState) {
        if self.state == to {
            return;
        }
        tracing::debug!(from = %self.state, to = %to, "sandbox state transition");
        self.state = to;
    }
}

/// Wait for a readiness event, failing early if the server process dies.
async fn await_ready(
    events: &mut mpsc::UnboundedReceiver<String>,
    process: &mut dyn SandboxProcess,
) -> Result<String> {
    tokio::select! {
        url = events.recv() => {
            url.ok_or_else(|| SandboxError::Generic("readiness channel closed".into()))
        }
        code = process.wait() => {
            Err(SandboxError::Generic(format!(
                "dev server exited with code {code} before becoming ready"
            )))
        }
    }
}

/// Forward a process output stream into the log.
fn pump_output(process: &mut dyn SandboxProcess, source: &'static str) {
    if let Some(mut output) = process.take_output() {
        tokio::spawn(async move {
            while let Some(line) = output.recv().await {
                tracing::debug!(source, line = %line.trim_end(), "sandbox output");
            }
        });
    }
}

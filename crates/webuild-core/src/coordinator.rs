//! Update coordinator - debounces and single-flights apply cycles.
//!
//! Callers fire raw model output at [`submit`] as often as they like; the
//! coordinator waits out the debounce window, parses only the last
//! submission of a burst, and guarantees at most one apply cycle is in
//! progress at any instant. A submission whose timer fires while a cycle
//! is running is queued (latest wins) and applied immediately after the
//! cycle completes, so the final state always reflects the newest output.
//!
//! [`submit`]: UpdateCoordinator::submit

use crate::error::SandboxError;
use crate::orchestrator::{PreviewOrchestrator, ReadySubscription};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use webuild_blocks::Parser;

/// Default cap on consecutive failed apply cycles.
const MAX_ATTEMPTS: u32 = 3;

/// Explicit retry budget for failed apply cycles.
///
/// Owned by the coordinator, reset on a successful cycle or a hard reset.
/// Once exhausted, further submissions are rejected until
/// [`UpdateCoordinator::hard_reset`] is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    attempts: u32,
    max: u32,
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS)
    }
}

impl RetryContext {
    /// Create a budget allowing `max` consecutive failures.
    pub fn new(max: u32) -> Self {
        Self { attempts: 0, max }
    }

    /// Consecutive failures recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one failed cycle.
    pub fn record_failure(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// True once the budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max
    }

    /// Reset the budget to zero failures.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Callback surface for the preview consumer (loading spinner, error
/// banner). Readiness is observed separately through
/// [`UpdateCoordinator::on_ready`].
pub trait PreviewSink: Send + Sync {
    /// An apply cycle started or finished.
    fn on_loading(&self, loading: bool);
    /// A cycle failed; `message` includes per-kind recovery guidance.
    fn on_error(&self, message: String);
}

#[derive(Default)]
struct BurstState {
    /// Bumped per submit; a timer whose generation is stale was superseded.
    generation: u64,
    /// True while an apply cycle is running.
    in_flight: bool,
    /// Latest submission whose timer fired mid-cycle.
    queued: Option<String>,
}

struct Shared {
    orchestrator: Arc<tokio::sync::Mutex<PreviewOrchestrator>>,
    parser: Parser,
    sink: Arc<dyn PreviewSink>,
    burst: Mutex<BurstState>,
    retry: Mutex<RetryContext>,
    debounce: Duration,
}

impl Shared {
    fn burst(&self) -> MutexGuard<'_, BurstState> {
        self.burst.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn retry(&self) -> MutexGuard<'_, RetryContext> {
        self.retry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Debounces caller submissions into serialized apply cycles.
pub struct UpdateCoordinator {
    shared: Arc<Shared>,
}

impl UpdateCoordinator {
    /// Wrap an orchestrator and parser behind a debounced submission
    /// surface. The debounce window comes from the orchestrator's
    /// configuration.
    pub fn new(
        orchestrator: PreviewOrchestrator,
        parser: Parser,
        sink: Arc<dyn PreviewSink>,
    ) -> Self {
        let debounce = orchestrator.config().debounce;
        Self {
            shared: Arc::new(Shared {
                orchestrator: Arc::new(tokio::sync::Mutex::new(orchestrator)),
                parser,
                sink,
                burst: Mutex::new(BurstState::default()),
                retry: Mutex::new(RetryContext::default()),
                debounce,
            }),
        }
    }

    /// Submit raw model output for preview.
    ///
    /// Fire-and-forget: completion is observed through [`on_ready`] and the
    /// [`PreviewSink`] callbacks. Each call supersedes any submission still
    /// waiting out the debounce window; only the last of a burst is parsed
    /// and applied. Submissions past an exhausted retry budget are rejected
    /// until [`hard_reset`] is called.
    ///
    /// [`on_ready`]: Self::on_ready
    /// [`hard_reset`]: Self::hard_reset
    pub fn submit(&self, raw: String) {
        let shared = Arc::clone(&self.shared);

        if shared.retry().exhausted() {
            tracing::warn!("submission rejected, retry budget exhausted");
            shared.sink.on_error(
                "Retry budget exhausted. Hard-reset the preview before submitting again."
                    .to_string(),
            );
            return;
        }

        let generation = {
            let mut burst = shared.burst();
            burst.generation += 1;
            burst.queued = None;
            burst.generation
        };
        tracing::trace!(generation, bytes = raw.len(), "update submitted");

        tokio::spawn(async move {
            tokio::time::sleep(shared.debounce).await;

            {
                let mut burst = shared.burst();
                if burst.generation != generation {
                    tracing::trace!(generation, "submission superseded within debounce window");
                    return;
                }
                if burst.in_flight {
                    tracing::debug!(generation, "apply in flight, queueing latest submission");
                    burst.queued = Some(raw);
                    return;
                }
                burst.in_flight = true;
            }

            let mut current = raw;
            loop {
                run_cycle(&shared, current).await;

                let next = {
                    let mut burst = shared.burst();
                    let next = burst.queued.take();
                    if next.is_none() {
                        burst.in_flight = false;
                    }
                    next
                };
                match next {
                    Some(raw) => {
                        tracing::debug!("running queued submission");
                        current = raw;
                    }
                    None => break,
                }
            }
        });
    }

    /// Register a readiness listener on the underlying orchestrator.
    pub async fn on_ready<F>(&self, listener: F) -> ReadySubscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.orchestrator.lock().await.on_ready(listener)
    }

    /// Consecutive failed cycles recorded so far.
    pub fn retry_attempts(&self) -> u32 {
        self.shared.retry().attempts()
    }

    /// Shared handle to the orchestrator, for state inspection and
    /// teardown.
    pub fn orchestrator(&self) -> Arc<tokio::sync::Mutex<PreviewOrchestrator>> {
        Arc::clone(&self.shared.orchestrator)
    }

    /// Tear the sandbox down, restart the state machine from scratch, and
    /// reset the retry budget.
    pub async fn hard_reset(&self) {
        self.shared.orchestrator.lock().await.hard_reset().await;
        self.shared.retry().reset();
        tracing::info!("retry budget reset");
    }
}

async fn run_cycle(shared: &Arc<Shared>, raw: String) {
    shared.sink.on_loading(true);

    let result = match shared.parser.parse(&raw) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "model output failed to parse");
            shared
                .sink
                .on_error(format!("Generated output could not be parsed: {e}"));
            shared.sink.on_loading(false);
            return;
        }
    };

    let applied = {
        let mut orchestrator = shared.orchestrator.lock().await;
        orchestrator.apply(result).await
    };

    match applied {
        Ok(()) => {
            shared.retry().reset();
        }
        Err(e) => {
            let attempts = {
                let mut retry = shared.retry();
                retry.record_failure();
                retry.attempts()
            };
            tracing::warn!(error = %e, attempts, "apply cycle failed");
            shared.sink.on_error(error_message(&e));
        }
    }

    shared.sink.on_loading(false);
}

fn error_message(error: &SandboxError) -> String {
    format!("{error}. {}", error.guidance())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_context_counts_and_caps() {
        let mut retry = RetryContext::default();
        assert_eq!(retry.attempts(), 0);
        assert!(!retry.exhausted());

        retry.record_failure();
        retry.record_failure();
        assert!(!retry.exhausted());

        retry.record_failure();
        assert_eq!(retry.attempts(), 3);
        assert!(retry.exhausted());

        retry.reset();
        assert_eq!(retry.attempts(), 0);
        assert!(!retry.exhausted());
    }

    #[test]
    fn test_error_message_carries_guidance() {
        let err = SandboxError::BootResourceLimit("limit hit".into());
        let message = error_message(&err);
        assert!(message.contains("sandbox boot refused"));
        assert!(message.contains(err.guidance()));
    }
}

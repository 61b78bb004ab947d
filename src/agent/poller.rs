//! Run polling state machine
//!
//! `transition` is a pure function from (phase, observed status) to the next
//! phase. `RunPoller` drives it against the remote service: sleep, fetch the
//! run, transition, until a terminal phase, a bound, or cancellation.

use super::error::AgentError;
use crate::assistants::{AssistantsApi, RunHandle, RunStatus};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Polling bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status check
    pub interval: Duration,
    /// Upper bound on total wait; `None` waits forever
    pub max_wait: Option<Duration>,
    /// Upper bound on status checks; `None` means unlimited
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: Some(Duration::from_secs(120)),
            max_attempts: None,
        }
    }
}

/// Where a submitted run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// `create_run` returned, nothing interpreted yet
    Submitted,
    /// Still running, with the furthest status seen so far
    Pending(RunStatus),
    Succeeded,
    Failed(RunStatus),
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed(_))
    }
}

/// Pure transition function.
///
/// Terminal phases absorb every status. A pending status that ranks below
/// the one already seen is ignored so the phase never moves backwards.
pub fn transition(phase: RunPhase, observed: RunStatus) -> RunPhase {
    match phase {
        RunPhase::Succeeded | RunPhase::Failed(_) => phase,
        _ if observed.is_success() => RunPhase::Succeeded,
        _ if observed.is_failure() => RunPhase::Failed(observed),
        RunPhase::Pending(seen) if observed.rank() < seen.rank() => phase,
        RunPhase::Submitted | RunPhase::Pending(_) => RunPhase::Pending(observed),
    }
}

/// A run that reached `completed`
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub run: RunHandle,
    /// Number of sleep-then-check rounds performed
    pub ticks: u32,
}

/// Drives one run to a terminal phase
pub struct RunPoller<'a> {
    client: &'a dyn AssistantsApi,
    config: &'a PollConfig,
    cancel: &'a CancellationToken,
}

impl<'a> RunPoller<'a> {
    pub fn new(
        client: &'a dyn AssistantsApi,
        config: &'a PollConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            cancel,
        }
    }

    pub async fn drive(&self, submitted: RunHandle) -> Result<PollOutcome, AgentError> {
        let started = Instant::now();
        let mut phase = transition(RunPhase::Submitted, submitted.status);
        let mut run = submitted;
        let mut ticks: u32 = 0;

        loop {
            match phase {
                RunPhase::Succeeded => {
                    tracing::debug!(run_id = %run.id, ticks, "Run completed");
                    return Ok(PollOutcome { run, ticks });
                }
                RunPhase::Failed(status) => {
                    tracing::warn!(
                        run_id = %run.id,
                        status = %status,
                        ticks,
                        "Run ended without completing"
                    );
                    return Err(AgentError::RunFailed {
                        status,
                        detail: run
                            .last_error
                            .as_ref()
                            .map(|e| format!("{}: {}", e.code, e.message)),
                    });
                }
                RunPhase::Submitted | RunPhase::Pending(_) => {}
            }

            if self.bound_reached(started, ticks) {
                self.abandon(&run).await;
                return Err(AgentError::Timeout {
                    waited: started.elapsed(),
                    attempts: ticks,
                });
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                () = tokio::time::sleep(self.config.interval) => {}
            }
            ticks += 1;

            let latest = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.client.get_run(&run.thread_id, &run.id) => result?,
            };

            let next = transition(phase, latest.status);
            if next == phase && latest.status != run.status {
                tracing::warn!(
                    run_id = %run.id,
                    current = %run.status,
                    observed = %latest.status,
                    "Ignoring run status that moves backwards"
                );
                continue;
            }
            tracing::trace!(run_id = %run.id, status = %latest.status, tick = ticks, "Polled run");
            phase = next;
            run = latest;
        }
    }

    /// True when the next tick would break a configured bound
    fn bound_reached(&self, started: Instant, ticks: u32) -> bool {
        if let Some(max) = self.config.max_attempts {
            if ticks >= max {
                return true;
            }
        }
        if let Some(max_wait) = self.config.max_wait {
            if started.elapsed() + self.config.interval > max_wait {
                return true;
            }
        }
        false
    }

    /// Best-effort cancel so the thread accepts new messages again
    async fn abandon(&self, run: &RunHandle) {
        match self.client.cancel_run(&run.thread_id, &run.id).await {
            Ok(_) => tracing::info!(run_id = %run.id, "Cancelled run after polling bound"),
            Err(e) => {
                tracing::warn!(run_id = %run.id, error = %e, "Failed to cancel timed-out run");
            }
        }
    }
}

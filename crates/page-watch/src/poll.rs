//! Bounded fixed-interval polling.
//!
//! The host never signals that a control finished rendering, so several
//! workflow steps poll. Each poll is a lazy sequence of attempts: the next
//! attempt is only produced once the caller asks for it, so two attempts of
//! one step never overlap.

use std::future::Future;
use std::time::Duration;

use host_page::PageError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::PollError;

/// Bounds and cadence of one poll sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Delay between attempts
    pub interval: Duration,
    pub max_attempts: u64,
    pub max_duration: Option<Duration>,
    /// Emit a stall warning every this many attempts (0 disables)
    pub stall_log_every: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            interval: Duration::from_millis(500),
            max_attempts: u64::MAX,
            max_duration: None,
            stall_log_every: 20,
        }
    }
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            initial_delay: interval,
            interval,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn with_stall_log_every(mut self, every: u64) -> Self {
        self.stall_log_every = every;
        self
    }
}

/// Lazy, cancellable sequence of attempt numbers (starting at 1).
pub struct Attempts {
    policy: PollPolicy,
    cancel: CancellationToken,
    label: String,
    started: Instant,
    issued: u64,
}

impl Attempts {
    pub fn new(policy: PollPolicy, cancel: CancellationToken, label: impl Into<String>) -> Self {
        Self {
            policy,
            cancel,
            label: label.into(),
            started: Instant::now(),
            issued: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Attempts handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep until the next attempt is due and return its number.
    pub async fn next(&mut self) -> Result<u64, PollError> {
        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled(self.label.clone()));
        }
        if self.issued >= self.policy.max_attempts {
            return Err(self.exhausted());
        }

        let delay = if self.issued == 0 {
            self.policy.initial_delay
        } else {
            self.policy.interval
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(PollError::Cancelled(self.label.clone()));
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(limit) = self.policy.max_duration {
            if self.started.elapsed() > limit {
                return Err(self.exhausted());
            }
        }

        self.issued += 1;
        let every = self.policy.stall_log_every;
        if every > 0 && self.issued % every == 0 {
            warn!(
                step = %self.label,
                attempts = self.issued,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "still waiting for host page"
            );
        }
        Ok(self.issued)
    }

    fn exhausted(&self) -> PollError {
        PollError::Exhausted {
            label: self.label.clone(),
            attempts: self.issued,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Run `probe` once per attempt until it yields a value.
///
/// Retriable page errors (a handle going stale between query and use) count
/// as a miss; any other page error ends the poll.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut probe: F,
) -> Result<T, PollError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Option<T>, PageError>>,
{
    let mut attempts = Attempts::new(policy.clone(), cancel.clone(), label);
    loop {
        let attempt = attempts.next().await?;
        match probe(attempt).await {
            Ok(Some(value)) => {
                debug!(step = label, attempt, "poll satisfied");
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) if err.retriable => {
                debug!(step = label, attempt, error = %err, "transient page error, polling on");
            }
            Err(err) => return Err(PollError::Page(err)),
        }
    }
}

//! The shared request gate
//!
//! One scheduler instance fronts one remote API. All state lives behind a
//! single `parking_lot::Mutex` that is never held across an await point.

use crate::call::{Call, PendingCall};
use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::policy::RemoteFailure;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Whether calls currently bypass the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Calls run directly on the caller's task
    Normal,
    /// Calls go through the FIFO queue
    Saturated,
}

/// Point-in-time view of the scheduler, for logs and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// Current mode
    pub mode: SchedulerMode,
    /// Entries waiting in the queue (excludes the one being serviced)
    pub queue_len: usize,
    /// Current backoff base
    pub current_base_delay: Duration,
    /// Whether the drain task is alive
    pub draining: bool,
    /// Rate-limit signals absorbed so far
    pub rate_limit_hits: u64,
    /// Queued calls that eventually succeeded
    pub calls_completed: u64,
}

struct QueueEntry<E> {
    call: Box<dyn Call<E>>,
    attempt_count: u32,
    enqueued_at: Instant,
}

impl<E> QueueEntry<E> {
    fn new(call: Box<dyn Call<E>>, attempt_count: u32) -> Self {
        Self {
            call,
            attempt_count,
            enqueued_at: Instant::now(),
        }
    }
}

struct QueueState<E> {
    mode: SchedulerMode,
    queue: VecDeque<QueueEntry<E>>,
    current_base_delay: Duration,
    draining: bool,
    /// Latest serviced attempt hit a rate limit; cleared only by a success
    rate_limited: bool,
    rate_limit_hits: u64,
    calls_completed: u64,
}

struct Inner<E> {
    config: SchedulerConfig,
    state: Mutex<QueueState<E>>,
}

/// Rate-limit-aware gate in front of a remote API
///
/// Cloning is cheap and every clone shares the same queue.
pub struct RateLimitedScheduler<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for RateLimitedScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for RateLimitedScheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RateLimitedScheduler")
            .field("mode", &state.mode)
            .field("queue_len", &state.queue.len())
            .field("current_base_delay", &state.current_base_delay)
            .field("draining", &state.draining)
            .finish_non_exhaustive()
    }
}

impl<E> RateLimitedScheduler<E>
where
    E: RemoteFailure + Send + 'static,
{
    /// Create a scheduler in normal mode
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let state = QueueState {
            mode: SchedulerMode::Normal,
            queue: VecDeque::new(),
            current_base_delay: config.base_delay(),
            draining: false,
            rate_limited: false,
            rate_limit_hits: 0,
            calls_completed: 0,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> SchedulerMode {
        self.inner.state.lock().mode
    }

    /// Current state for diagnostics
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.inner.state.lock();
        SchedulerSnapshot {
            mode: state.mode,
            queue_len: state.queue.len(),
            current_base_delay: state.current_base_delay,
            draining: state.draining,
            rate_limit_hits: state.rate_limit_hits,
            calls_completed: state.calls_completed,
        }
    }

    /// Run `op` through the gate
    ///
    /// `op` may be invoked several times; each invocation must issue the same
    /// request. Rate-limit failures are retried until success; every other
    /// failure is returned as [`ScheduleError::Remote`]. The configured default
    /// deadline applies, if any.
    ///
    /// # Errors
    ///
    /// See [`ScheduleError`].
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T, ScheduleError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        match self.inner.config.default_deadline() {
            Some(deadline) => self.execute_with_deadline(op, deadline).await,
            None => self.submit(op).await,
        }
    }

    /// Run `op` through the gate, giving up after `deadline`
    ///
    /// A call still queued when the deadline passes is skipped by the drain
    /// task and never invoked again.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::Timeout`] when the deadline elapses, otherwise as
    /// [`execute`](Self::execute).
    pub async fn execute_with_deadline<F, Fut, T>(
        &self,
        op: F,
        deadline: Duration,
    ) -> Result<T, ScheduleError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(deadline, self.submit(op)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(deadline_ms = deadline.as_millis(), "scheduled call timed out");
                Err(ScheduleError::Timeout { waited: deadline })
            }
        }
    }

    async fn submit<F, Fut, T>(&self, op: F) -> Result<T, ScheduleError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let call: Box<dyn Call<E>> = Box::new(PendingCall::new(op, reply));

        let Some(mut call) = self.inner.enqueue_if_saturated(call) else {
            return wait_for_reply(receiver).await;
        };

        let outcome = call.attempt().await;
        match outcome {
            Ok(()) => {}
            Err(error) if self.inner.config.rate_limit.is_rate_limited(&error) => {
                self.inner.saturate(call, &error);
            }
            Err(error) => return Err(ScheduleError::Remote(error)),
        }

        wait_for_reply(receiver).await
    }
}

impl<E> Inner<E>
where
    E: RemoteFailure + Send + 'static,
{
    /// Queue `call` when saturated, otherwise hand it back for a direct attempt
    fn enqueue_if_saturated(self: &Arc<Self>, call: Box<dyn Call<E>>) -> Option<Box<dyn Call<E>>> {
        let mut state = self.state.lock();
        if state.mode == SchedulerMode::Normal {
            return Some(call);
        }
        state.queue.push_back(QueueEntry::new(call, 0));
        self.ensure_draining(&mut state);
        None
    }

    /// A direct attempt was rate limited
    fn saturate(self: &Arc<Self>, call: Box<dyn Call<E>>, error: &E) {
        let mut state = self.state.lock();
        state.rate_limit_hits += 1;
        state.rate_limited = true;
        if state.mode == SchedulerMode::Normal {
            warn!(
                message = %error.failure_message(),
                "rate limit hit, switching to queued mode"
            );
            state.mode = SchedulerMode::Saturated;
        }
        state.queue.push_back(QueueEntry::new(call, 1));
        self.ensure_draining(&mut state);
    }

    fn ensure_draining(self: &Arc<Self>, state: &mut QueueState<E>) {
        if state.draining {
            return;
        }
        state.draining = true;
        debug!(queue_len = state.queue.len(), "starting drain task");
        tokio::spawn(drain(Arc::clone(self)));
    }

    /// Next entry and how long to wait before invoking it; `None` ends the drain
    ///
    /// A queue emptied only by abandoned calls leaves the scheduler saturated
    /// with its backoff base, so the next call is queued and waits it out.
    fn next_entry(&self) -> Option<(QueueEntry<E>, Duration)> {
        let mut state = self.state.lock();
        let Some(entry) = state.queue.pop_front() else {
            state.draining = false;
            if state.rate_limited {
                info!(
                    base_delay_ms = state.current_base_delay.as_millis(),
                    "rate-limit queue emptied without a success, staying in queued mode"
                );
                return None;
            }
            state.mode = SchedulerMode::Normal;
            info!(
                completed = state.calls_completed,
                rate_limit_hits = state.rate_limit_hits,
                "rate-limit queue drained, back to normal mode"
            );
            return None;
        };
        let wait = self
            .config
            .wait_for(entry.attempt_count, state.current_base_delay);
        Some((entry, wait))
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.current_base_delay = self.config.base_delay();
        state.rate_limited = false;
        state.calls_completed += 1;
        if state.queue.is_empty() {
            state.mode = SchedulerMode::Normal;
        }
    }

    /// Put a rate-limited entry back at the head and escalate the backoff base
    fn requeue(&self, mut entry: QueueEntry<E>, error: &E) {
        let mut state = self.state.lock();
        state.rate_limit_hits += 1;
        state.rate_limited = true;
        state.current_base_delay = self.config.escalate(state.current_base_delay);
        state.mode = SchedulerMode::Saturated;
        entry.attempt_count += 1;
        warn!(
            attempt = entry.attempt_count,
            base_delay_ms = state.current_base_delay.as_millis(),
            message = %error.failure_message(),
            "rate limit hit again, backing off"
        );
        state.queue.push_front(entry);
    }
}

async fn wait_for_reply<T, E>(
    receiver: oneshot::Receiver<Result<T, ScheduleError<E>>>,
) -> Result<T, ScheduleError<E>> {
    receiver.await.unwrap_or(Err(ScheduleError::Abandoned))
}

/// Service queued calls one at a time until the queue is empty
async fn drain<E>(inner: Arc<Inner<E>>)
where
    E: RemoteFailure + Send + 'static,
{
    while let Some((mut entry, wait)) = inner.next_entry() {
        if entry.call.is_abandoned() {
            debug!(attempt = entry.attempt_count, "skipping abandoned call");
            continue;
        }

        debug!(
            attempt = entry.attempt_count,
            wait_ms = wait.as_millis(),
            queued_ms = entry.enqueued_at.elapsed().as_millis(),
            "dequeued call"
        );
        tokio::time::sleep(wait).await;

        if entry.call.is_abandoned() {
            debug!(attempt = entry.attempt_count, "call abandoned during backoff");
            continue;
        }

        let outcome = entry.call.attempt().await;
        match outcome {
            Ok(()) => inner.record_success(),
            Err(error) if inner.config.rate_limit.is_rate_limited(&error) => {
                inner.requeue(entry, &error);
            }
            Err(error) => {
                debug!(attempt = entry.attempt_count, "queued call failed");
                entry.call.reject(ScheduleError::Remote(error));
            }
        }
    }
}

//! Bounded execution of upstream calls with per-attempt timeouts and retries
//! for transient failures.

use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

const TIMING_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub concurrency: usize,
    /// Total attempts for a job that keeps failing transiently.
    pub retry_attempts: usize,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl QueueConfig {
    /// Time a provider may spend backing off on rate limits inside one
    /// attempt, so the rate-limit error surfaces before the attempt timeout.
    pub fn backoff_budget(&self) -> Duration {
        self.timeout / 2
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub active: usize,
    pub pending: usize,
    pub total_processed: u64,
    pub total_failed: u64,
    pub average_processing_ms: f64,
    pub concurrency: usize,
}

#[derive(Debug, Default)]
struct Counters {
    active: usize,
    pending: usize,
    processed: u64,
    failed: u64,
    timings: VecDeque<u64>,
}

#[derive(Debug)]
pub struct RequestQueue {
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    counters: Mutex<Counters>,
}

/// Keeps the pending/active counters right even when the caller's future is
/// dropped mid-flight.
struct Slot<'a> {
    queue: &'a RequestQueue,
    active: bool,
}

impl<'a> Slot<'a> {
    fn pending(queue: &'a RequestQueue) -> Self {
        queue.counters().pending += 1;
        Self {
            queue,
            active: false,
        }
    }

    fn activate(&mut self) {
        let mut counters = self.queue.counters();
        counters.pending = counters.pending.saturating_sub(1);
        counters.active += 1;
        self.active = true;
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut counters = self.queue.counters();
        if self.active {
            counters.active = counters.active.saturating_sub(1);
        } else {
            counters.pending = counters.pending.saturating_sub(1);
        }
    }
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        let config = QueueConfig {
            concurrency: config.concurrency.max(1),
            retry_attempts: config.retry_attempts.max(1),
            ..config
        };
        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `job` once a slot is free. `job` is called again for each retry.
    pub async fn run<F, Fut, T>(&self, mut job: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut slot = Slot::pending(self);
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("request queue is closed")))?;
        slot.activate();

        let started = Instant::now();
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let mut attempt = 0usize;
        let result = loop {
            attempt += 1;
            let outcome = match timeout(self.config.timeout, job()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ServiceError::Timeout(timeout_ms)),
            };
            match outcome {
                Err(err) if err.is_transient() && attempt < self.config.retry_attempts => {
                    warn!(
                        "queued request failed ({}); retrying in {} ms (attempt {}/{})",
                        err,
                        self.config.retry_delay.as_millis(),
                        attempt,
                        self.config.retry_attempts
                    );
                    sleep(self.config.retry_delay).await;
                }
                other => break other,
            }
        };

        let elapsed = started.elapsed().as_millis() as u64;
        self.record(result.is_ok(), elapsed);
        debug!("queued request finished in {} ms after {} attempt(s)", elapsed, attempt);
        result
    }

    fn record(&self, success: bool, elapsed_ms: u64) {
        let mut counters = self.counters();
        if success {
            counters.processed += 1;
            counters.timings.push_back(elapsed_ms);
            while counters.timings.len() > TIMING_WINDOW {
                counters.timings.pop_front();
            }
        } else {
            counters.failed += 1;
        }
    }

    pub fn stats(&self) -> QueueStats {
        let counters = self.counters();
        let average_processing_ms = if counters.timings.is_empty() {
            0.0
        } else {
            counters.timings.iter().sum::<u64>() as f64 / counters.timings.len() as f64
        };
        QueueStats {
            active: counters.active,
            pending: counters.pending,
            total_processed: counters.processed,
            total_failed: counters.failed,
            average_processing_ms,
            concurrency: self.config.concurrency,
        }
    }
}

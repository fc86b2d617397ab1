//! Admission control for uploads.
//!
//! Tracks the bytes of writes that have been admitted but not finished and
//! holds new writers back while that load has reached the configured limit.
//! A request is checked against the load that was already there, not counting
//! its own size, so the counter may overshoot the limit by at most one
//! request's size minus one byte. This is a soft cap.
//!
//! A writer waits while the load is at or above the limit (`>=`), where a
//! plain `>` check would be the usual filer behaviour. With `>`, a load
//! sitting exactly at the limit still admits another writer, which breaks
//! the overshoot bound above.
//!
//! The counter saturates at `u64::MAX`; a permit then holds only the bytes
//! that fit, so releasing it never underflows.
//!
//! Without a wait timeout a writer can stay blocked for as long as capacity
//! does not free up.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("upload not admitted within {waited:?}: {in_flight} bytes in flight, limit {limit}")]
    Timeout {
        waited: Duration,
        in_flight: u64,
        limit: u64,
    },

    #[error("upload cancelled while waiting for admission")]
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    limit: u64,
    current: Mutex<u64>,
    wake: Notify,
}

impl Inner {
    fn release(&self, n: u64) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            debug_assert!(*current >= n, "admission released more than acquired");
            *current = current.saturating_sub(n);
        }
        self.wake.notify_waiters();
    }
}

/// One per server instance. Cloning shares the same counter.
#[derive(Clone, Debug)]
pub struct AdmissionController {
    inner: Arc<Inner>,
    wait_timeout: Option<Duration>,
}

impl AdmissionController {
    /// `limit` is in bytes; 0 disables admission control.
    pub fn new(limit: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                limit,
                current: Mutex::new(0),
                wake: Notify::new(),
            }),
            wait_timeout: None,
        }
    }

    /// Rejects writers that wait longer than `timeout` instead of blocking
    /// them indefinitely.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn limit(&self) -> u64 {
        self.inner.limit
    }

    pub fn in_flight(&self) -> u64 {
        *self.inner.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits until the in-flight load is below the limit, then adds `n` to
    /// it. The returned permit gives the bytes back when dropped.
    pub async fn acquire(
        &self,
        n: u64,
        cancel: &CancellationToken,
    ) -> Result<AdmissionPermit, AdmissionError> {
        let wait = async {
            loop {
                // register before checking so a release in between is not lost
                let notified = self.inner.wake.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(permit) = self.try_admit(n) {
                    return Ok(permit);
                }
                tokio::select! {
                    _ = &mut notified => {}
                    _ = cancel.cancelled() => return Err(AdmissionError::Cancelled),
                }
            }
        };

        match self.wait_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.unwrap_or_else(|_| {
                Err(AdmissionError::Timeout {
                    waited: timeout,
                    in_flight: self.in_flight(),
                    limit: self.inner.limit,
                })
            }),
            None => wait.await,
        }
    }

    fn try_admit(&self, n: u64) -> Option<AdmissionPermit> {
        let mut current = self.inner.current.lock().unwrap_or_else(|e| e.into_inner());
        if self.inner.limit != 0 && *current >= self.inner.limit {
            tracing::debug!(
                "wait because inflight data {} >= {}",
                *current,
                self.inner.limit
            );
            return None;
        }
        let granted = n.min(u64::MAX - *current);
        *current += granted;
        Some(AdmissionPermit {
            inner: Arc::clone(&self.inner),
            bytes: granted,
        })
    }
}

/// Admitted bytes; released exactly once, when dropped.
#[derive(Debug)]
#[must_use = "dropping the permit releases the admitted bytes immediately"]
pub struct AdmissionPermit {
    inner: Arc<Inner>,
    bytes: u64,
}

impl AdmissionPermit {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.release(self.bytes);
    }
}

//! Admission queue — bounded concurrency plus a sliding-window start rate.
//!
//! Every backend call is submitted through here. A fair semaphore hands out
//! in-flight slots in submission order; a fair mutex around the window of
//! recent start times enforces the rate cap. Completion order is whatever the
//! tasks themselves produce.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use toolwright_core::error::BackendError;
use tracing::trace;

pub struct AdmissionQueue {
    slots: Semaphore,
    max_concurrent: usize,
    starts: Mutex<VecDeque<Instant>>,
    max_starts: usize,
    window: Duration,
    waiting: AtomicUsize,
    active: AtomicUsize,
    closed: AtomicBool,
}

/// Decrements a counter when dropped, so abandoned submissions don't leak.
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionQueue {
    /// `max_concurrent` in-flight tasks, at most `max_starts` starts per
    /// `window`. Both limits are clamped to at least one.
    pub fn new(max_concurrent: usize, max_starts: usize, window: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Semaphore::new(max_concurrent),
            max_concurrent,
            starts: Mutex::new(VecDeque::new()),
            max_starts: max_starts.max(1),
            window,
            waiting: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Run `task` once a slot is free and the rate window allows a start.
    pub async fn submit<F>(&self, task: F) -> Result<F::Output, BackendError>
    where
        F: Future,
    {
        if self.is_closed() {
            return Err(BackendError::QueueClosed);
        }

        let permit = {
            let _waiting = CountGuard::enter(&self.waiting);
            let permit = self
                .slots
                .acquire()
                .await
                .map_err(|_| BackendError::QueueClosed)?;
            self.admit().await;
            permit
        };

        let _active = CountGuard::enter(&self.active);
        let output = task.await;
        drop(permit);
        Ok(output)
    }

    /// Wait until the rate window has room, then record a start.
    async fn admit(&self) {
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = starts.front() {
                if now.duration_since(oldest) >= self.window {
                    starts.pop_front();
                } else {
                    break;
                }
            }

            if starts.len() < self.max_starts {
                starts.push_back(now);
                return;
            }

            let Some(&oldest) = starts.front() else {
                continue;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            trace!(wait_ms = wait.as_millis() as u64, "Rate window full, delaying start");
            tokio::time::sleep(wait).await;
        }
    }

    /// Stop accepting work and wait for every queued and in-flight task to
    /// finish.
    pub async fn drain(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // The semaphore is fair: this acquisition queues behind every task
        // that is already waiting for a slot.
        if let Ok(all) = self.slots.acquire_many(self.max_concurrent as u32).await {
            // Closing while every slot is held also rejects submissions that
            // passed the `closed` check and queued behind this acquisition.
            self.slots.close();
            drop(all);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tasks waiting for a slot or a rate-window start.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Tasks currently executing.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

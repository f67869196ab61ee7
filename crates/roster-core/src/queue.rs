//! In-process work queue shared by the worker pool.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::error::AppError;
use crate::models::WorkItem;
use crate::traits::WorkQueue;

#[derive(Debug, Default)]
struct QueueState {
    queued: VecDeque<WorkItem>,
    seen: HashSet<String>,
    in_flight: usize,
    completed: u64,
    failed: u64,
}

impl QueueState {
    fn drained(&self) -> bool {
        self.queued.is_empty() && self.in_flight == 0
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<QueueState>,
    changed: Notify,
}

/// FIFO queue with dedup-by-key and in-flight tracking.
///
/// Claims block while the queue is empty but some worker still holds an
/// item, since that worker may enqueue follow-up work.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkQueue {
    inner: Arc<Inner>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub seen: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state();
        QueueStats {
            seen: state.seen.len(),
            queued: state.queued.len(),
            in_flight: state.in_flight,
            completed: state.completed,
            failed: state.failed,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn finish(&self, failed: bool) {
        let drained = {
            let mut state = self.state();
            state.in_flight = state.in_flight.saturating_sub(1);
            if failed {
                state.failed += 1;
            } else {
                state.completed += 1;
            }
            state.drained()
        };
        if drained {
            self.inner.changed.notify_waiters();
        }
    }
}

impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<bool, AppError> {
        {
            let mut state = self.state();
            if !state.seen.insert(item.dedup_key()) {
                return Ok(false);
            }
            state.queued.push_back(item);
        }
        self.inner.changed.notify_one();
        Ok(true)
    }

    async fn claim(&self) -> Result<Option<WorkItem>, AppError> {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.queued.pop_front() {
                    state.in_flight += 1;
                    return Ok(Some(item));
                }
                if state.in_flight == 0 {
                    return Ok(None);
                }
            }

            notified.await;
        }
    }

    async fn complete(&self, _item: &WorkItem) -> Result<(), AppError> {
        self.finish(false);
        Ok(())
    }

    async fn fail(&self, item: &WorkItem, error: &str) -> Result<(), AppError> {
        tracing::debug!(url = %item.url, kind = %item.kind(), %error, "Work item abandoned");
        self.finish(true);
        Ok(())
    }

    async fn pending(&self) -> Result<usize, AppError> {
        Ok(self.state().queued.len())
    }
}

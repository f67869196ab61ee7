use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::crawler::{Crawler, Outcome};
use crate::error::AppError;
use crate::models::WorkItem;
use crate::traits::{ArtifactStore, RecordSink, Renderer, WorkQueue};

/// Events emitted by workers for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    ItemClaimed {
        worker_id: &'a str,
        item: &'a WorkItem,
    },
    ItemCompleted {
        worker_id: &'a str,
        item: &'a WorkItem,
        outcome: &'a Outcome,
    },
    ItemFailed {
        worker_id: &'a str,
        item: &'a WorkItem,
        error: &'a AppError,
    },
    Stopped {
        worker_id: &'a str,
        processed: u64,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::debug!(%worker_id, "Worker started");
            }
            WorkerEvent::ItemClaimed { worker_id, item } => {
                tracing::debug!(%worker_id, url = %item.url, kind = %item.kind(), "Item claimed");
            }
            WorkerEvent::ItemCompleted {
                worker_id,
                item,
                outcome,
            } => {
                tracing::debug!(%worker_id, url = %item.url, kind = %item.kind(), ?outcome, "Item completed");
            }
            WorkerEvent::ItemFailed {
                worker_id,
                item,
                error,
            } => {
                if error.is_navigation_failure() {
                    tracing::warn!(%worker_id, url = %item.url, kind = %item.kind(), %error, "Item failed");
                } else {
                    tracing::error!(%worker_id, url = %item.url, kind = %item.kind(), %error, "Item failed");
                }
            }
            WorkerEvent::Stopped {
                worker_id,
                processed,
            } => {
                tracing::debug!(%worker_id, %processed, "Worker stopped");
            }
        }
    }
}

/// Totals for one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Items that finished without error.
    pub processed: u64,
    /// Items abandoned after an error or timeout.
    pub failed: u64,
    pub records: u64,
    pub fallback_hops: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Fixed-width pool of workers sharing one crawler.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    width: usize,
    handler_timeout: Duration,
}

impl WorkerPool {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            handler_timeout: Duration::from_secs(90),
        }
    }

    /// Upper bound on reading a single page once it has been opened.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Seeds the queue and runs every worker until the queue drains or
    /// `cancel_token` fires. In-flight items always finish.
    pub async fn run<R, Q, S, A, WR>(
        &self,
        crawler: Arc<Crawler<R, Q, S, A>>,
        cancel_token: CancellationToken,
        reporter: Arc<WR>,
    ) -> Result<RunSummary, AppError>
    where
        R: Renderer + 'static,
        Q: WorkQueue + 'static,
        S: RecordSink + 'static,
        A: ArtifactStore + 'static,
        WR: WorkerReporter + 'static,
    {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        crawler.seed().await?;
        tracing::info!(%run_id, workers = self.width, "Crawl started");

        let counters = Arc::new(Counters::default());
        let handles: Vec<_> = (0..self.width)
            .map(|n| {
                tokio::spawn(work_loop(
                    format!("worker-{n}"),
                    Arc::clone(&crawler),
                    cancel_token.clone(),
                    Arc::clone(&reporter),
                    Arc::clone(&counters),
                    self.handler_timeout,
                ))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task aborted");
            }
        }

        let summary = RunSummary {
            run_id,
            processed: counters.processed.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            records: crawler.budget().records_emitted(),
            fallback_hops: crawler.fallback_hops(),
            cancelled: cancel_token.is_cancelled(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            %run_id,
            processed = summary.processed,
            failed = summary.failed,
            records = summary.records,
            fallback_hops = summary.fallback_hops,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Crawl finished"
        );
        Ok(summary)
    }
}

async fn work_loop<R, Q, S, A, WR>(
    worker_id: String,
    crawler: Arc<Crawler<R, Q, S, A>>,
    cancel_token: CancellationToken,
    reporter: Arc<WR>,
    counters: Arc<Counters>,
    handler_timeout: Duration,
) where
    R: Renderer,
    Q: WorkQueue,
    S: RecordSink,
    A: ArtifactStore,
    WR: WorkerReporter,
{
    reporter.report(WorkerEvent::Started {
        worker_id: &worker_id,
    });

    let mut processed = 0;
    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let claimed = tokio::select! {
            claimed = crawler.queue().claim() => claimed,
            () = cancel_token.cancelled() => break,
        };
        let item = match claimed {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(%worker_id, error = %e, "Failed to claim work item");
                break;
            }
        };

        reporter.report(WorkerEvent::ItemClaimed {
            worker_id: &worker_id,
            item: &item,
        });

        let result = crawler.process_within(&item, handler_timeout).await;
        processed += 1;

        match result {
            Ok(outcome) => {
                counters.processed.fetch_add(1, Ordering::SeqCst);
                reporter.report(WorkerEvent::ItemCompleted {
                    worker_id: &worker_id,
                    item: &item,
                    outcome: &outcome,
                });
                if let Err(e) = crawler.queue().complete(&item).await {
                    tracing::error!(url = %item.url, error = %e, "Failed to mark item completed");
                }
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                reporter.report(WorkerEvent::ItemFailed {
                    worker_id: &worker_id,
                    item: &item,
                    error: &e,
                });
                let error_msg = e.to_string();
                if let Err(e) = crawler.queue().fail(&item, &error_msg).await {
                    tracing::error!(url = %item.url, error = %e, "Failed to mark item failed");
                }
            }
        }
    }

    reporter.report(WorkerEvent::Stopped {
        worker_id: &worker_id,
        processed,
    });
}

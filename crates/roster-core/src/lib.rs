pub mod budget;
pub mod config;
pub mod contact;
pub mod crawler;
pub mod dom;
pub mod error;
pub mod export;
pub mod links;
pub mod models;
pub mod pagination;
pub mod queue;
pub mod sink;
pub mod strategy;
pub mod text;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod testutil;

pub use budget::CrawlBudget;
pub use config::{CrawlConfig, SeedScope, SiteProfile};
pub use crawler::{Crawler, Outcome};
pub use error::AppError;
pub use models::{ExportRow, ExtractedContact, PageKind, PartialContext, WorkItem};
pub use queue::MemoryWorkQueue;
pub use sink::MemorySink;
pub use traits::{ArtifactStore, NullArtifactStore, RecordSink, RenderedPage, Renderer, WorkQueue};
pub use worker::{RunSummary, TracingWorkerReporter, WorkerPool, WorkerReporter};

use std::future::Future;

use url::Url;

use crate::error::AppError;
use crate::models::{ExtractedContact, WorkItem};

/// Navigates to a URL and hands back the rendered page.
///
/// Navigation timeouts, proxies, and browser lifecycle belong to the
/// implementation.
pub trait Renderer: Send + Sync + Clone {
    type Page: RenderedPage;

    fn open(&self, url: &Url) -> impl Future<Output = Result<Self::Page, AppError>> + Send;
}

/// One rendered page, alive until [`RenderedPage::close`].
pub trait RenderedPage: Send + Sync {
    /// Final URI after redirects.
    fn url(&self) -> Url;

    /// Raw markup of the current DOM.
    fn content(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Scrolls to the bottom and returns the document height afterwards.
    fn scroll_to_bottom(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Full-page PNG.
    fn screenshot(&self) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Shared queue of crawl work, deduplicated by [`WorkItem::dedup_key`].
pub trait WorkQueue: Send + Sync + Clone {
    /// Adds an item unless its key was already seen. Returns whether it was added.
    fn enqueue(&self, item: WorkItem) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Next item to process.
    ///
    /// Waits while other workers still hold items (they may enqueue more).
    /// Returns `None` once nothing is queued and nothing is in flight.
    fn claim(&self) -> impl Future<Output = Result<Option<WorkItem>, AppError>> + Send;

    fn complete(&self, item: &WorkItem) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Marks a claimed item as abandoned. Items are never retried here.
    fn fail(
        &self,
        item: &WorkItem,
        error: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Number of items queued and not yet claimed.
    fn pending(&self) -> impl Future<Output = Result<usize, AppError>> + Send;
}

/// Append-only destination for extracted contacts.
pub trait RecordSink: Send + Sync + Clone {
    fn append(
        &self,
        contact: &ExtractedContact,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Every record appended so far, in append order.
    fn records(&self) -> impl Future<Output = Result<Vec<ExtractedContact>, AppError>> + Send;
}

/// Key-value store for run artifacts (debug snapshots, the export copy).
pub trait ArtifactStore: Send + Sync + Clone {
    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// An ArtifactStore that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NullArtifactStore;

impl ArtifactStore for NullArtifactStore {
    async fn put(&self, _name: &str, _bytes: &[u8], _content_type: &str) -> Result<(), AppError> {
        Ok(())
    }
}

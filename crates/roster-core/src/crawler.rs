//! The crawl state machine.
//!
//! `LISTING` pages feed profile links and further listing pages into the
//! queue. `PROFILE` pages either emit a contact or hand their partial result
//! to a `CONTACT_FALLBACK` item. Fallback pages emit or drop. Nothing loops
//! back, so the crawl ends when the queue drains.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::budget::CrawlBudget;
use crate::config::{CompiledSite, CrawlConfig, ScrollConfig, SettleConfig};
use crate::contact::ContactExtractor;
use crate::dom::PageSnapshot;
use crate::error::AppError;
use crate::links::{Harvest, LinkHarvester};
use crate::models::{ExtractedContact, PartialContext, Stage, WorkItem};
use crate::pagination::PaginationResolver;
use crate::text::{normalize_phone, split_person_name};
use crate::traits::{ArtifactStore, RecordSink, RenderedPage, Renderer, WorkQueue};

pub const DEBUG_SCREENSHOT: &str = "debug-first-listing.png";
pub const DEBUG_MARKUP: &str = "debug-first-listing.html";

/// What processing one work item led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The record cap was reached; the listing was left alone.
    ListingSkipped,
    Listing {
        /// Profile items newly added to the queue.
        profiles: usize,
        /// Listing items newly added to the queue.
        pages: usize,
    },
    Emitted(ExtractedContact),
    FallbackQueued(Url),
    NoRecord,
}

/// Everything a listing page contributes, computed from one snapshot.
struct ListingPlan {
    harvest: Harvest,
    next: Option<WorkItem>,
    seeded: Vec<WorkItem>,
}

/// Drives one work item at a time; shared by every worker.
pub struct Crawler<R, Q, S, A>
where
    R: Renderer,
    Q: WorkQueue,
    S: RecordSink,
    A: ArtifactStore,
{
    renderer: R,
    queue: Q,
    sink: S,
    artifacts: A,
    budget: Arc<CrawlBudget>,
    seeds: Vec<Url>,
    harvester: LinkHarvester,
    paginator: PaginationResolver,
    extractor: ContactExtractor,
    scroll: ScrollConfig,
    settle: SettleConfig,
    exhaustive_links: bool,
    first_listing_done: AtomicBool,
    fallback_hops: AtomicU64,
}

impl<R, Q, S, A> Crawler<R, Q, S, A>
where
    R: Renderer,
    Q: WorkQueue,
    S: RecordSink,
    A: ArtifactStore,
{
    /// Validates the configuration and compiles the site profile.
    pub fn new(
        config: &CrawlConfig,
        renderer: R,
        queue: Q,
        sink: S,
        artifacts: A,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let site: Arc<CompiledSite> = Arc::new(config.site.compile()?);

        Ok(Self {
            renderer,
            queue,
            sink,
            artifacts,
            budget: Arc::new(CrawlBudget::new(config.max_records, config.seed_scope)),
            seeds: config.seed_urls()?,
            harvester: LinkHarvester::new(Arc::clone(&site), config.max_profile_links),
            paginator: PaginationResolver::new(
                Arc::clone(&site),
                config.max_pages,
                config.default_seed_pages,
            ),
            extractor: ContactExtractor::new(site),
            scroll: config.scroll.clone(),
            settle: config.settle.clone(),
            exhaustive_links: config.exhaustive_links,
            first_listing_done: AtomicBool::new(false),
            fallback_hops: AtomicU64::new(0),
        })
    }

    pub fn budget(&self) -> &Arc<CrawlBudget> {
        &self.budget
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    /// Contact-fallback items this run added to the queue.
    pub fn fallback_hops(&self) -> u64 {
        self.fallback_hops.load(Ordering::SeqCst)
    }

    /// Queues every start URL as listing page 1. Returns how many were new.
    pub async fn seed(&self) -> Result<usize, AppError> {
        let mut added = 0;
        for url in &self.seeds {
            if self.queue.enqueue(WorkItem::listing(url.clone(), 1)).await? {
                added += 1;
            }
        }
        tracing::info!(seeds = added, "Start URLs queued");
        Ok(added)
    }

    pub async fn process(&self, item: &WorkItem) -> Result<Outcome, AppError> {
        self.process_within(item, Duration::MAX).await
    }

    /// Like [`Crawler::process`], but gives up on reading the page after
    /// `limit`. The page is closed either way; navigation itself is bounded
    /// by the renderer.
    pub async fn process_within(
        &self,
        item: &WorkItem,
        limit: Duration,
    ) -> Result<Outcome, AppError> {
        match &item.stage {
            Stage::Listing => self.visit_listing(item, limit).await,
            Stage::Profile => {
                let outcome = self.visit_profile(item, limit).await?;
                pause(self.settle.profile_millis).await;
                Ok(outcome)
            }
            Stage::ContactFallback(context) => {
                let outcome = self.visit_contact(item, context, limit).await?;
                pause(self.settle.contact_millis).await;
                Ok(outcome)
            }
        }
    }

    // -- LISTING ------------------------------------------------------------

    async fn visit_listing(&self, item: &WorkItem, limit: Duration) -> Result<Outcome, AppError> {
        if self.budget.stop_requested() {
            tracing::debug!(url = %item.url, "Record cap reached, skipping listing");
            return Ok(Outcome::ListingSkipped);
        }

        let page = self.renderer.open(&item.url).await?;
        let result = within(limit, self.read_listing(&page, item)).await;
        close(page).await;
        result
    }

    async fn read_listing(&self, page: &R::Page, item: &WorkItem) -> Result<Outcome, AppError> {
        let base = page.url();
        let markup = page.content().await?;

        let first_pass = {
            let snapshot = PageSnapshot::new(base.clone(), markup);
            if self.harvester.anchor_links(&snapshot).is_empty() {
                None
            } else {
                Some(self.plan_listing(&snapshot, item))
            }
        };

        let plan = match first_pass {
            Some(plan) => plan,
            None => {
                match self.lazy_scroll(page).await {
                    Ok(steps) => tracing::debug!(url = %base, steps, "No profile anchors, scrolled"),
                    Err(e) => tracing::warn!(url = %base, error = %e, "Lazy scroll failed"),
                }
                let markup = page.content().await?;
                let snapshot = PageSnapshot::new(base.clone(), markup);
                self.plan_listing(&snapshot, item)
            }
        };

        if !self.first_listing_done.swap(true, Ordering::SeqCst) && plan.harvest.is_empty() {
            tracing::warn!(url = %base, "First listing page yielded no profile links");
            self.capture_debug(page).await;
        }

        if self.budget.stop_requested() {
            tracing::debug!(url = %base, "Record cap reached, dropping listing results");
            return Ok(Outcome::ListingSkipped);
        }

        let mut profiles = 0;
        for url in plan.harvest.links {
            if !same_site(&url, &base) {
                tracing::debug!(%url, listing = %base, "Skipping off-site profile link");
                continue;
            }
            if self.queue.enqueue(WorkItem::profile(url, item.page_index)).await? {
                profiles += 1;
            }
        }

        let mut pages = 0;
        for next in plan.next.into_iter().chain(plan.seeded) {
            if !same_site(&next.url, &base) {
                tracing::debug!(url = %next.url, listing = %base, "Skipping off-site listing page");
                continue;
            }
            if self.queue.enqueue(next).await? {
                pages += 1;
            }
        }

        tracing::info!(
            url = %base,
            page = item.page_index,
            strategies = ?plan.harvest.strategies,
            profiles,
            pages,
            "Listing processed"
        );
        Ok(Outcome::Listing { profiles, pages })
    }

    fn plan_listing(&self, snapshot: &PageSnapshot, item: &WorkItem) -> ListingPlan {
        ListingPlan {
            harvest: self.harvester.harvest(snapshot, self.exhaustive_links),
            next: self.paginator.next_page(snapshot, item),
            seeded: self.paginator.seed_pages(snapshot, &self.budget),
        }
    }

    /// Scrolls until the document stops growing or the step cap is hit.
    /// Returns the number of scrolls performed.
    async fn lazy_scroll(&self, page: &R::Page) -> Result<u32, AppError> {
        let mut last_height = None;
        for step in 0..self.scroll.max_steps {
            let height = page.scroll_to_bottom().await?;
            if last_height.is_some_and(|last| height <= last) {
                return Ok(step + 1);
            }
            last_height = Some(height);
            tokio::time::sleep(self.scroll.settle()).await;
        }
        Ok(self.scroll.max_steps)
    }

    async fn capture_debug(&self, page: &R::Page) {
        match page.screenshot().await {
            Ok(png) => {
                if let Err(e) = self.artifacts.put(DEBUG_SCREENSHOT, &png, "image/png").await {
                    tracing::warn!(error = %e, "Failed to store debug screenshot");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Debug screenshot unavailable"),
        }

        match page.content().await {
            Ok(html) => {
                if let Err(e) = self
                    .artifacts
                    .put(DEBUG_MARKUP, html.as_bytes(), "text/html; charset=utf-8")
                    .await
                {
                    tracing::warn!(error = %e, "Failed to store debug markup");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Debug markup unavailable"),
        }
    }

    // -- PROFILE ------------------------------------------------------------

    async fn visit_profile(&self, item: &WorkItem, limit: Duration) -> Result<Outcome, AppError> {
        let page = self.renderer.open(&item.url).await?;
        let result = within(limit, self.read_profile(&page, item)).await;
        close(page).await;
        result
    }

    async fn read_profile(&self, page: &R::Page, item: &WorkItem) -> Result<Outcome, AppError> {
        let current = page.url();
        let markup = page.content().await?;

        let (fields, contact_link) = {
            let snapshot = PageSnapshot::new(current.clone(), markup);
            let fields = self.extractor.extract(&snapshot);
            let link = if fields.email.is_empty() {
                self.extractor.contact_link(&snapshot)
            } else {
                None
            };
            (fields, link)
        };

        if !fields.email.is_empty() {
            let contact = assemble(
                &fields.email,
                &fields.name,
                normalize_phone(&fields.phone),
                current.as_str(),
                current.as_str(),
            );
            return self.emit(contact).await;
        }

        let Some(link) = contact_link else {
            tracing::debug!(url = %current, "No email and no contact link on profile");
            return Ok(Outcome::NoRecord);
        };

        let context = PartialContext {
            name: fields.name,
            phone: normalize_phone(&fields.phone),
            profile_url: current.to_string(),
        };
        let follow = WorkItem::contact_fallback(link.clone(), item.page_index, context);
        if self.queue.enqueue(follow).await? {
            self.fallback_hops.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(profile = %current, contact = %link, "Email missing, following contact link");
        }
        Ok(Outcome::FallbackQueued(link))
    }

    // -- CONTACT_FALLBACK ---------------------------------------------------

    async fn visit_contact(
        &self,
        item: &WorkItem,
        context: &PartialContext,
        limit: Duration,
    ) -> Result<Outcome, AppError> {
        let page = self.renderer.open(&item.url).await?;
        let result = within(limit, self.read_contact(&page, context)).await;
        close(page).await;
        result
    }

    async fn read_contact(
        &self,
        page: &R::Page,
        context: &PartialContext,
    ) -> Result<Outcome, AppError> {
        let current = page.url();
        let markup = page.content().await?;

        let (email, phone) = {
            let snapshot = PageSnapshot::new(current.clone(), markup);
            (self.extractor.email(&snapshot), self.extractor.phone(&snapshot))
        };

        if email.is_empty() {
            tracing::debug!(url = %current, profile = %context.profile_url, "No email on contact page");
            return Ok(Outcome::NoRecord);
        }

        let phone = match normalize_phone(&phone) {
            p if p.is_empty() => context.phone.clone(),
            p => p,
        };
        let contact = assemble(
            &email,
            &context.name,
            phone,
            &context.profile_url,
            current.as_str(),
        );
        self.emit(contact).await
    }

    async fn emit(&self, contact: ExtractedContact) -> Result<Outcome, AppError> {
        self.sink.append(&contact).await?;
        let total = self.budget.record_emitted();
        tracing::info!(
            profile = %contact.source_profile_url,
            contact = %contact.source_contact_url,
            records = total,
            "Contact extracted"
        );
        Ok(Outcome::Emitted(contact))
    }
}

fn assemble(
    email: &str,
    raw_name: &str,
    phone: String,
    profile_url: &str,
    contact_url: &str,
) -> ExtractedContact {
    let name = split_person_name(raw_name);
    ExtractedContact {
        email: email.to_lowercase(),
        first_name: name.first_name,
        last_name: name.last_name,
        phone,
        source_profile_url: profile_url.to_string(),
        source_contact_url: contact_url.to_string(),
        scraped_at: Utc::now(),
    }
}

/// Hosts equal once a leading `www.` is ignored.
fn same_site(a: &Url, b: &Url) -> bool {
    fn bare(url: &Url) -> Option<&str> {
        url.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h))
    }
    matches!((bare(a), bare(b)), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y))
}

async fn within<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(limit.as_secs())),
    }
}

async fn close<P: RenderedPage>(page: P) {
    if let Err(e) = page.close().await {
        tracing::debug!(error = %e, "Failed to close page");
    }
}

async fn pause(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

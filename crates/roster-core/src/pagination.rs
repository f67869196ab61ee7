//! Next-page discovery and one-shot bulk page seeding for listing pages.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::budget::CrawlBudget;
use crate::config::CompiledSite;
use crate::dom::{PageSnapshot, element_text};
use crate::models::WorkItem;
use crate::strategy::{Attempt, Cascade, Miss};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static NEXT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnext\b").expect("valid regex"));

pub const REL_NEXT: &str = "rel-next";
pub const ARIA_NEXT: &str = "aria-label-next";
pub const TEXT_NEXT: &str = "text-next";
pub const PAGE_NUMBER: &str = "page-number";

/// Resolves the next listing page and, once per scope, seeds the rest in bulk.
pub struct PaginationResolver {
    site: Arc<CompiledSite>,
    max_pages: u32,
    default_seed_pages: u32,
}

impl PaginationResolver {
    pub fn new(site: Arc<CompiledSite>, max_pages: u32, default_seed_pages: u32) -> Self {
        Self {
            site,
            max_pages,
            default_seed_pages,
        }
    }

    /// The "next" strategies for a page currently at `current_page`.
    ///
    /// The page-number strategy depends on the current index, so the cascade
    /// is assembled per call.
    fn next_cascade(&self, current_page: u32) -> Cascade<Url> {
        let site = Arc::clone(&self.site);
        Cascade::new()
            .then_fn(REL_NEXT, rel_next)
            .then_fn(ARIA_NEXT, aria_next)
            .then_fn(TEXT_NEXT, text_next)
            .then_fn(PAGE_NUMBER, move |page: &PageSnapshot| {
                smallest_page_after(&site, page, current_page)
            })
    }

    /// Next listing item, or `None` when there is no next page or it would
    /// exceed `max_pages`.
    pub fn next_page(&self, page: &PageSnapshot, current: &WorkItem) -> Option<WorkItem> {
        let hit = self.next_cascade(current.page_index).first(page).ok()?;
        let url = hit.value;
        if same_page(&url, page.base()) {
            return None;
        }

        let index = match self.site.page_number(&url) {
            Some(n) if n > current.page_index => n,
            _ => current.page_index + 1,
        };
        if index > self.max_pages {
            tracing::debug!(page = index, max_pages = self.max_pages, "Next page beyond maxPages");
            return None;
        }

        tracing::debug!(strategy = hit.strategy, %url, page = index, "Next listing page");
        Some(WorkItem::listing(url, index))
    }

    /// Bulk seeding for city-level listings.
    ///
    /// Fires at most once per seeding scope. Items cover page indexes
    /// `2..=min(max observed or default, max_pages)`, each carrying its own
    /// index.
    pub fn seed_pages(&self, page: &PageSnapshot, budget: &CrawlBudget) -> Vec<WorkItem> {
        let base = page.base();
        if !self.site.is_city_listing(base) {
            return Vec::new();
        }
        if !budget.try_claim_seeding(&listing_root(base)) {
            return Vec::new();
        }

        let observed = page
            .select(&ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| page.resolve(href))
            .filter_map(|url| self.site.page_number(&url))
            .max();
        let last = observed
            .unwrap_or(self.default_seed_pages)
            .min(self.max_pages);

        tracing::info!(
            listing = %base,
            ?observed,
            last_page = last,
            "Seeding listing pages in bulk"
        );

        (2..=last)
            .map(|n| WorkItem::listing(self.site.with_page(base, n), n))
            .collect()
    }
}

/// Host plus path: pages of one listing share it regardless of query.
pub fn listing_root(url: &Url) -> String {
    format!(
        "{}{}",
        url.host_str().unwrap_or_default(),
        url.path().trim_end_matches('/')
    )
}

fn same_page(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

fn anchors_resolved<'a>(page: &'a PageSnapshot) -> impl Iterator<Item = (scraper::ElementRef<'a>, Url)> + 'a {
    page.select(&ANCHOR).filter_map(move |a| {
        let url = page.resolve(a.value().attr("href")?)?;
        Some((a, url))
    })
}

fn rel_next(page: &PageSnapshot) -> Attempt<Url> {
    anchors_resolved(page)
        .find(|(a, _)| {
            a.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("next")))
        })
        .map(|(_, url)| url)
        .ok_or(Miss)
}

fn aria_next(page: &PageSnapshot) -> Attempt<Url> {
    anchors_resolved(page)
        .find(|(a, _)| {
            a.value()
                .attr("aria-label")
                .is_some_and(|label| NEXT_WORD.is_match(label))
        })
        .map(|(_, url)| url)
        .ok_or(Miss)
}

fn text_next(page: &PageSnapshot) -> Attempt<Url> {
    anchors_resolved(page)
        .find(|(a, _)| NEXT_WORD.is_match(&element_text(a)))
        .map(|(_, url)| url)
        .ok_or(Miss)
}

fn smallest_page_after(site: &CompiledSite, page: &PageSnapshot, current: u32) -> Attempt<Url> {
    anchors_resolved(page)
        .filter_map(|(_, url)| site.page_number(&url).map(|n| (n, url)))
        .filter(|(n, _)| *n > current)
        .min_by_key(|(n, _)| *n)
        .map(|(_, url)| url)
        .ok_or(Miss)
}

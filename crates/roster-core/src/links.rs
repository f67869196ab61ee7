//! Profile link discovery on listing pages.
//!
//! Strategies, in priority order:
//!
//! 1. anchors whose target is profile-shaped
//! 2. (lazy scroll, then 1 again; driven by the crawler since it awaits the page)
//! 3. elements carrying client-side router attributes
//! 4. `url` fields inside embedded JSON-LD blocks
//! 5. regex scan of the raw markup for absolute and root-relative paths
//!
//! Every candidate is resolved against the page URI and kept only when it is
//! profile-shaped and not an office page.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::config::CompiledSite;
use crate::dom::{PageSnapshot, resolve_href};
use crate::strategy::{Attempt, Cascade, Miss};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>\\)]+"#).expect("valid regex"));

static ROOT_RELATIVE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'(](/[^/\s"'<>\\)][^\s"'<>\\)]*)"#).expect("valid regex"));

pub const ANCHORS: &str = "anchors";
pub const NAVIGATION_ATTRIBUTES: &str = "navigation-attributes";
pub const STRUCTURED_DATA: &str = "structured-data";
pub const MARKUP_SCAN: &str = "markup-scan";

/// Links found on a page and the strategies that found them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub links: Vec<Url>,
    pub strategies: Vec<&'static str>,
}

impl Harvest {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

pub struct LinkHarvester {
    site: Arc<CompiledSite>,
    max_links: usize,
    cascade: Cascade<Vec<Url>>,
}

impl LinkHarvester {
    pub fn new(site: Arc<CompiledSite>, max_links: usize) -> Self {
        let cascade = Cascade::new()
            .then_fn(ANCHORS, {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| found(anchor_candidates(&site, page))
            })
            .then_fn(NAVIGATION_ATTRIBUTES, {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| found(navigation_candidates(&site, page))
            })
            .then_fn(STRUCTURED_DATA, {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| found(structured_data_candidates(&site, page))
            })
            .then_fn(MARKUP_SCAN, {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| found(markup_candidates(&site, page))
            });

        Self {
            site,
            max_links,
            cascade,
        }
    }

    /// Strategy 1 alone, for the check that decides whether to scroll.
    pub fn anchor_links(&self, page: &PageSnapshot) -> Vec<Url> {
        self.finish(anchor_candidates(&self.site, page))
    }

    /// Runs the cascade: first hit only, or every strategy when `exhaustive`.
    pub fn harvest(&self, page: &PageSnapshot, exhaustive: bool) -> Harvest {
        let hits = if exhaustive {
            self.cascade.all(page)
        } else {
            self.cascade.first(page).into_iter().collect()
        };

        let strategies = hits.iter().map(|h| h.strategy).collect();
        let links = self.finish(hits.into_iter().flat_map(|h| h.value).collect());
        Harvest { links, strategies }
    }

    /// Dedups by exact URI and applies the cap.
    fn finish(&self, candidates: Vec<Url>) -> Vec<Url> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|url| seen.insert(url.as_str().to_string()))
            .take(self.max_links)
            .collect()
    }
}

fn found(links: Vec<Url>) -> Attempt<Vec<Url>> {
    if links.is_empty() { Err(Miss) } else { Ok(links) }
}

fn keep(site: &CompiledSite, base: &Url, raw: &str) -> Option<Url> {
    resolve_href(base, raw).filter(|url| site.is_profile_url(url))
}

fn anchor_candidates(site: &CompiledSite, page: &PageSnapshot) -> Vec<Url> {
    page.select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| keep(site, page.base(), href))
        .collect()
}

fn navigation_candidates(site: &CompiledSite, page: &PageSnapshot) -> Vec<Url> {
    let Some(selector) = &site.navigation_selector else {
        return Vec::new();
    };
    page.select(selector)
        .flat_map(|el| {
            site.navigation_attributes
                .iter()
                .filter_map(move |attr| el.value().attr(attr))
        })
        .filter_map(|target| keep(site, page.base(), target))
        .collect()
}

fn structured_data_candidates(site: &CompiledSite, page: &PageSnapshot) -> Vec<Url> {
    let mut raw = Vec::new();
    for script in page.select(&JSON_LD) {
        let body: String = script.text().collect();
        match serde_json::from_str::<serde_json::Value>(body.trim()) {
            Ok(value) => collect_url_fields(&value, &mut raw),
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed JSON-LD block"),
        }
    }
    raw.iter()
        .filter_map(|u| keep(site, page.base(), u))
        .collect()
}

/// Every string-valued `url` field at any depth (covers `itemListElement[].url`
/// and `itemListElement[].item.url`).
fn collect_url_fields(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                match v {
                    serde_json::Value::String(s) if key == "url" => out.push(s.clone()),
                    _ => collect_url_fields(v, out),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_url_fields(item, out);
            }
        }
        _ => {}
    }
}

fn markup_candidates(site: &CompiledSite, page: &PageSnapshot) -> Vec<Url> {
    let markup = page.markup();
    let absolute = ABSOLUTE_URL.find_iter(markup).map(|m| m.as_str());
    let relative = ROOT_RELATIVE_URL
        .captures_iter(markup)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());
    absolute
        .chain(relative)
        .filter_map(|raw| keep(site, page.base(), raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    const BASE: &str = "https://www.example.com/fl/jacksonville/agents";

    fn harvester(max: usize) -> LinkHarvester {
        LinkHarvester::new(Arc::new(SiteProfile::default().compile().unwrap()), max)
    }

    fn page(body: &str) -> PageSnapshot {
        PageSnapshot::parse(BASE, &format!("<html><body>{body}</body></html>")).unwrap()
    }

    fn strs(urls: &[Url]) -> Vec<&str> {
        urls.iter().map(|u| u.as_str()).collect()
    }

    #[test]
    fn anchors_resolve_filter_and_dedup() {
        let page = page(
            r#"<a href="/fl/jacksonville/agent/jane-doe/aid-1">Jane</a>
               <a href="/fl/jacksonville/agent/jane-doe/aid-1#bio">Jane again</a>
               <a href="https://www.example.com/real-estate-agents/bob">Bob</a>
               <a href="/real-estate-agents/office/downtown">Office</a>
               <a href="/about">About</a>"#,
        );
        let harvest = harvester(500).harvest(&page, false);
        assert_eq!(harvest.strategies, vec![ANCHORS]);
        assert_eq!(
            strs(&harvest.links),
            vec![
                "https://www.example.com/fl/jacksonville/agent/jane-doe/aid-1",
                "https://www.example.com/real-estate-agents/bob",
            ]
        );
    }

    #[test]
    fn office_exclusion_takes_precedence() {
        let page = page(r#"<a href="/agent/offices/riverside">Riverside</a>"#);
        assert!(harvester(500).harvest(&page, false).is_empty());
    }

    #[test]
    fn falls_back_to_navigation_attributes() {
        let page = page(
            r#"<div data-href="/agent/jane">Jane</div>
               <button routerlink="/agent/bob">Bob</button>
               <a href="/about">About</a>"#,
        );
        let harvest = harvester(500).harvest(&page, false);
        assert_eq!(harvest.strategies, vec![NAVIGATION_ATTRIBUTES]);
        assert_eq!(harvest.links.len(), 2);
    }

    #[test]
    fn falls_back_to_structured_data() {
        let page = page(
            r#"<script type="application/ld+json">
               {"@type": "ItemList", "itemListElement": [
                   {"@type": "ListItem", "url": "/agent/jane"},
                   {"@type": "ListItem", "item": {"url": "https://www.example.com/agent/bob"}}
               ]}
               </script>
               <script type="application/ld+json">{ not json </script>"#,
        );
        let harvest = harvester(500).harvest(&page, false);
        assert_eq!(harvest.strategies, vec![STRUCTURED_DATA]);
        assert_eq!(
            strs(&harvest.links),
            vec![
                "https://www.example.com/agent/jane",
                "https://www.example.com/agent/bob",
            ]
        );
    }

    #[test]
    fn malformed_structured_data_is_ignored() {
        let page = page(r#"<script type="application/ld+json">{ "url": </script>"#);
        assert!(harvester(500).harvest(&page, false).is_empty());
    }

    #[test]
    fn falls_back_to_markup_scan() {
        let page = page(
            r#"<script>window.__DATA__ = {"agents": ["/agent/jane", "https://www.example.com/agent/bob"]};</script>"#,
        );
        let harvest = harvester(500).harvest(&page, false);
        assert_eq!(harvest.strategies, vec![MARKUP_SCAN]);
        assert_eq!(harvest.links.len(), 2);
    }

    #[test]
    fn exhaustive_unions_all_strategies() {
        let page = page(
            r#"<a href="/agent/jane">Jane</a>
               <div data-url="/agent/bob"></div>
               <script>var x = "/agent/carol";</script>"#,
        );
        let harvest = harvester(500).harvest(&page, true);
        assert!(harvest.strategies.contains(&ANCHORS));
        assert!(harvest.strategies.contains(&NAVIGATION_ATTRIBUTES));
        assert!(harvest.strategies.contains(&MARKUP_SCAN));
        let links = strs(&harvest.links);
        assert!(links.contains(&"https://www.example.com/agent/jane"));
        assert!(links.contains(&"https://www.example.com/agent/bob"));
        assert!(links.contains(&"https://www.example.com/agent/carol"));
    }

    #[test]
    fn results_are_capped() {
        let body: String = (0..20)
            .map(|i| format!(r#"<a href="/agent/a{i}">A</a>"#))
            .collect();
        assert_eq!(harvester(5).harvest(&page(&body), false).links.len(), 5);
    }

    #[test]
    fn anchor_links_only_checks_anchors() {
        let page = page(r#"<div data-href="/agent/jane">Jane</div>"#);
        let h = harvester(500);
        assert!(h.anchor_links(&page).is_empty());
        assert!(!h.harvest(&page, false).is_empty());
    }
}

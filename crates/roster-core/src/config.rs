use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::parse_selector;
use crate::error::AppError;

pub const DEFAULT_START_URL: &str = "https://www.coldwellbanker.com/fl/jacksonville/agents";

/// Site-specific selectors and URL shapes.
///
/// Defaults target the agent directory the tool was built for; every field
/// can be overridden from the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteProfile {
    /// Matches profile paths (must include a slug after the marker).
    pub profile_pattern: String,
    /// Office/brokerage pages that share the profile root. Excluded.
    pub office_pattern: String,
    /// City-level listing paths that trigger bulk page seeding.
    pub city_listing_pattern: String,
    /// Query parameter carrying the listing page number.
    pub page_param: String,
    /// Attributes client-side routers put navigation targets in.
    pub navigation_attributes: Vec<String>,
    pub name_selector: String,
    pub heading_selector: String,
    pub phone_selector: String,
    pub email_selector: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            profile_pattern: r"(?i)/(?:real-estate-agents?|agent)/[A-Za-z0-9][^?#\s]*".into(),
            office_pattern: r"(?i)/(?:real-estate-agents?|agents?)/(?:office|offices|brokerage)(?:/|$)"
                .into(),
            city_listing_pattern: r"(?i)^/[a-z]{2}/[^/]+/agents/?$".into(),
            page_param: "page".into(),
            navigation_attributes: vec![
                "data-href".into(),
                "data-url".into(),
                "data-link".into(),
                "routerlink".into(),
            ],
            name_selector: r#"h1[data-testid="office-name"]"#.into(),
            heading_selector: "h1, h2".into(),
            phone_selector: "p.MuiTypography-body1.css-1p1owym".into(),
            email_selector: r#"div[data-testid="emailDiv"] a[data-testid="emailLink"]"#.into(),
        }
    }
}

impl SiteProfile {
    /// Validates and compiles every pattern and selector.
    pub fn compile(&self) -> Result<CompiledSite, AppError> {
        let regex = |name: &str, pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::ConfigError(format!("Invalid {name} '{pattern}': {e}")))
        };

        if self.page_param.trim().is_empty() {
            return Err(AppError::ConfigError("pageParam must not be empty".into()));
        }

        let navigation_attributes = self
            .navigation_attributes
            .iter()
            .map(|attr| attr.trim().to_ascii_lowercase())
            .filter(|attr| !attr.is_empty())
            .collect::<Vec<_>>();
        let navigation_selector = if navigation_attributes.is_empty() {
            None
        } else {
            let css = navigation_attributes
                .iter()
                .map(|attr| format!("[{attr}]"))
                .collect::<Vec<_>>()
                .join(", ");
            Some(parse_selector(&css)?)
        };

        Ok(CompiledSite {
            profile_pattern: regex("profilePattern", &self.profile_pattern)?,
            office_pattern: regex("officePattern", &self.office_pattern)?,
            city_listing_pattern: regex("cityListingPattern", &self.city_listing_pattern)?,
            page_param: self.page_param.trim().to_string(),
            navigation_attributes,
            navigation_selector,
            name_selector: parse_selector(&self.name_selector)?,
            heading_selector: parse_selector(&self.heading_selector)?,
            phone_selector: parse_selector(&self.phone_selector)?,
            email_selector: parse_selector(&self.email_selector)?,
        })
    }
}

/// A [`SiteProfile`] with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledSite {
    pub profile_pattern: Regex,
    pub office_pattern: Regex,
    pub city_listing_pattern: Regex,
    pub page_param: String,
    pub navigation_attributes: Vec<String>,
    /// Matches any element carrying one of `navigation_attributes`.
    pub navigation_selector: Option<Selector>,
    pub name_selector: Selector,
    pub heading_selector: Selector,
    pub phone_selector: Selector,
    pub email_selector: Selector,
}

impl CompiledSite {
    /// Profile-shaped and not an office page.
    pub fn is_profile_url(&self, url: &Url) -> bool {
        let path = url.path();
        self.profile_pattern.is_match(path) && !self.office_pattern.is_match(path)
    }

    pub fn is_city_listing(&self, url: &Url) -> bool {
        self.city_listing_pattern.is_match(url.path())
    }

    /// Numeric value of the page parameter, if present.
    pub fn page_number(&self, url: &Url) -> Option<u32> {
        url.query_pairs()
            .find(|(k, _)| k == self.page_param.as_str())
            .and_then(|(_, v)| v.trim().parse().ok())
    }

    /// `url` with the page parameter set to `page`, other parameters kept.
    pub fn with_page(&self, url: &Url, page: u32) -> Url {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != self.page_param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut out = url.clone();
        out.set_fragment(None);
        {
            let mut pairs = out.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair(&self.page_param, &page.to_string());
        }
        out
    }
}

/// Whether the one-shot bulk seeding latch is per run or per listing root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeedScope {
    #[default]
    Run,
    ListingRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollConfig {
    /// Upper bound on scroll-and-wait iterations.
    pub max_steps: u32,
    /// Wait after each scroll for lazy content to lay out.
    pub settle_millis: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_steps: 12,
            settle_millis: 800,
        }
    }
}

impl ScrollConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }
}

/// Pause a worker takes after finishing a page of each kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettleConfig {
    pub profile_millis: u64,
    pub contact_millis: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            profile_millis: 250,
            contact_millis: 200,
        }
    }
}

/// A seed entry: either `"https://..."` or `{"url": "https://..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartUrl {
    Plain(String),
    Object { url: String },
}

impl StartUrl {
    pub fn as_str(&self) -> &str {
        match self {
            StartUrl::Plain(url) | StartUrl::Object { url } => url,
        }
    }
}

/// Crawl-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlConfig {
    pub start_urls: Vec<StartUrl>,
    /// Highest listing page index either pagination mechanism may produce.
    pub max_pages: u32,
    /// Worker pool width.
    pub max_concurrency: usize,
    /// Stop discovering new listing work once this many records are emitted.
    pub max_records: Option<u64>,
    /// Cap on profile links harvested from a single listing page.
    pub max_profile_links: usize,
    /// Run every link strategy instead of stopping at the first hit.
    pub exhaustive_links: bool,
    /// Page count assumed by bulk seeding when the page shows no page numbers.
    pub default_seed_pages: u32,
    pub seed_scope: SeedScope,
    pub scroll: ScrollConfig,
    pub settle: SettleConfig,
    /// Per-navigation timeout handed to the renderer.
    pub navigation_timeout_secs: u64,
    /// Upper bound on processing one work item.
    pub handler_timeout_secs: u64,
    /// Proxy URL handed to the renderer.
    pub proxy: Option<String>,
    pub site: SiteProfile,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_urls: vec![StartUrl::Object {
                url: DEFAULT_START_URL.into(),
            }],
            max_pages: 200,
            max_concurrency: 5,
            max_records: None,
            max_profile_links: 500,
            exhaustive_links: false,
            default_seed_pages: 25,
            seed_scope: SeedScope::Run,
            scroll: ScrollConfig::default(),
            settle: SettleConfig::default(),
            navigation_timeout_secs: 45,
            handler_timeout_secs: 90,
            proxy: None,
            site: SiteProfile::default(),
        }
    }
}

impl CrawlConfig {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config)
    }

    /// Parses and validates the seed URIs.
    pub fn seed_urls(&self) -> Result<Vec<Url>, AppError> {
        if self.start_urls.is_empty() {
            return Err(AppError::ConfigError("startUrls must not be empty".into()));
        }
        self.start_urls
            .iter()
            .map(|s| {
                let url = Url::parse(s.as_str()).map_err(|e| {
                    AppError::ConfigError(format!("Invalid start URL '{}': {e}", s.as_str()))
                })?;
                match url.scheme() {
                    "http" | "https" => Ok(url),
                    scheme => Err(AppError::ConfigError(format!(
                        "Start URL scheme '{scheme}' is not allowed (only http/https)"
                    ))),
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrency == 0 {
            return Err(AppError::ConfigError("maxConcurrency must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(AppError::ConfigError("maxPages must be at least 1".into()));
        }
        if self.max_profile_links == 0 {
            return Err(AppError::ConfigError(
                "maxProfileLinks must be at least 1".into(),
            ));
        }
        if self.handler_timeout_secs == 0 || self.navigation_timeout_secs == 0 {
            return Err(AppError::ConfigError("timeouts must be at least 1 second".into()));
        }
        self.seed_urls()?;
        self.site.compile()?;
        Ok(())
    }
}

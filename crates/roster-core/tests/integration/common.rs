use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use roster_core::config::{ScrollConfig, SettleConfig, StartUrl};
use roster_core::{AppError, CrawlConfig, RenderedPage, Renderer};
use url::Url;

pub const LISTING: &str = "https://www.example.com/fl/jacksonville/agents";
pub const AGENT_ROOT: &str = "https://www.example.com/fl/jacksonville/agent";

/// Serves the pages under `tests/fixtures` as if they were a live site.
#[derive(Clone)]
pub struct FixtureRenderer {
    pages: Arc<HashMap<String, &'static str>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl FixtureRenderer {
    pub fn jacksonville() -> Self {
        let pages: HashMap<String, &'static str> = [
            (LISTING.to_string(), include_str!("../fixtures/listing_page1.html")),
            (format!("{LISTING}?page=2"), include_str!("../fixtures/listing_page2.html")),
            (format!("{LISTING}?page=3"), include_str!("../fixtures/listing_page3.html")),
            (
                format!("{AGENT_ROOT}/jane-public/aid-1"),
                include_str!("../fixtures/profile_jane.html"),
            ),
            (
                format!("{AGENT_ROOT}/marcus-lee/aid-2"),
                include_str!("../fixtures/profile_marcus.html"),
            ),
            (
                format!("{AGENT_ROOT}/marcus-lee/aid-2/contact"),
                include_str!("../fixtures/contact_marcus.html"),
            ),
            (
                format!("{AGENT_ROOT}/harriet-vance/aid-3"),
                include_str!("../fixtures/profile_harriet.html"),
            ),
            (
                format!("{AGENT_ROOT}/nora-king/aid-4"),
                include_str!("../fixtures/profile_nora.html"),
            ),
        ]
        .into_iter()
        .collect();

        Self {
            pages: Arc::new(pages),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Exact match first, then the same URL without its query string.
    fn lookup(&self, url: &Url) -> Option<&'static str> {
        if let Some(html) = self.pages.get(url.as_str()) {
            return Some(html);
        }
        let mut bare = url.clone();
        bare.set_query(None);
        self.pages.get(bare.as_str()).copied()
    }
}

pub struct FixturePage {
    url: Url,
    html: &'static str,
}

impl Renderer for FixtureRenderer {
    type Page = FixturePage;

    async fn open(&self, url: &Url) -> Result<FixturePage, AppError> {
        self.opened.lock().unwrap().push(url.to_string());
        let html = self
            .lookup(url)
            .ok_or_else(|| AppError::NavigationError(format!("404 Not Found: {url}")))?;
        Ok(FixturePage {
            url: url.clone(),
            html,
        })
    }
}

impl RenderedPage for FixturePage {
    fn url(&self) -> Url {
        self.url.clone()
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self.html.to_string())
    }

    async fn scroll_to_bottom(&self) -> Result<u64, AppError> {
        Ok(self.html.len() as u64)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AppError> {
        Err(AppError::Unsupported("fixture pages have no pixels".into()))
    }

    async fn close(self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Default settings minus every politeness delay.
pub fn fast_config() -> CrawlConfig {
    CrawlConfig {
        start_urls: vec![StartUrl::Object {
            url: LISTING.to_string(),
        }],
        scroll: ScrollConfig {
            max_steps: 2,
            settle_millis: 0,
        },
        settle: SettleConfig {
            profile_millis: 0,
            contact_millis: 0,
        },
        ..CrawlConfig::default()
    }
}

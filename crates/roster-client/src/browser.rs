use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use roster_core::error::AppError;
use roster_core::traits::{RenderedPage, Renderer};
use url::Url;

const SCROLL_TO_BOTTOM: &str = r#"(() => {
    window.scrollTo(0, document.body.scrollHeight);
    return document.body.scrollHeight;
})()"#;

/// Headless-Chromium renderer driven over the Chrome DevTools Protocol.
///
/// Unlike [`super::HttpRenderer`], pages run their JavaScript, so
/// client-rendered listings and lazily loaded results can be scrolled into
/// view before the markup is read.
///
/// A single Chromium process is shared across all clones; each
/// [`Renderer::open`] opens a new tab, which [`RenderedPage::close`] closes.
///
/// # Example
///
/// ```rust,no_run
/// use roster_client::BrowserRenderer;
/// use roster_core::traits::{RenderedPage, Renderer};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = BrowserRenderer::new().await?;
/// let page = renderer.open(&"https://example.com".parse()?).await?;
/// let html = page.content().await?;
/// println!("{}", &html[..200]);
/// page.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserRenderer {
    browser: Arc<Browser>,
    timeout: Duration,
}

impl BrowserRenderer {
    /// Launches headless Chromium with a **45 s** navigation timeout and no proxy.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH` (or the
    /// default locations checked by `chromiumoxide`).
    pub async fn new() -> Result<Self, AppError> {
        Self::launch(Duration::from_secs(45), None).await
    }

    /// Launches headless Chromium with a custom navigation timeout and an
    /// optional `--proxy-server`.
    pub async fn launch(timeout: Duration, proxy: Option<&str>) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags, so prefer the real binary when we can find it.
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .window_size(1366, 900);
        if let Some(proxy) = proxy {
            tracing::info!(%proxy, "Routing browser traffic through proxy");
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        let config = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            timeout,
        })
    }
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when it points at an existing file. If nothing is
/// found, `chromiumoxide` does its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

/// One open browser tab.
pub struct BrowserPage {
    page: Page,
    url: Url,
}

impl Renderer for BrowserRenderer {
    type Page = BrowserPage;

    async fn open(&self, url: &Url) -> Result<BrowserPage, AppError> {
        let timeout = self.timeout;

        // The tab is created blank so that a navigation timeout still leaves
        // a handle to close.
        let page = tokio::time::timeout(timeout, self.browser.new_page("about:blank"))
            .await
            .map_err(|_| AppError::Timeout(timeout.as_secs()))?
            .map_err(|e| AppError::RenderError(format!("Failed to open tab: {e}")))?;

        let navigated = tokio::time::timeout(timeout, async {
            page.goto(url.as_str()).await.map_err(|e| {
                AppError::NavigationError(format!("Failed to navigate to {url}: {e}"))
            })?;
            // <body> present is the minimal signal that the DOM is usable.
            page.find_element("body")
                .await
                .map_err(|e| AppError::RenderError(format!("Page did not render body: {e}")))?;
            Ok::<(), AppError>(())
        })
        .await
        .unwrap_or(Err(AppError::Timeout(timeout.as_secs())));

        if let Err(e) = navigated {
            if let Err(close_err) = page.close().await {
                tracing::debug!(%url, error = %close_err, "Failed to close abandoned tab");
            }
            return Err(e);
        }

        let final_url = match page.url().await {
            Ok(Some(current)) => Url::parse(&current).unwrap_or_else(|_| url.clone()),
            _ => url.clone(),
        };

        Ok(BrowserPage {
            page,
            url: final_url,
        })
    }
}

impl RenderedPage for BrowserPage {
    fn url(&self) -> Url {
        self.url.clone()
    }

    async fn content(&self) -> Result<String, AppError> {
        self.page
            .content()
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to read page content: {e}")))
    }

    async fn scroll_to_bottom(&self) -> Result<u64, AppError> {
        let height: f64 = self
            .page
            .evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(|e| AppError::RenderError(format!("Scroll failed: {e}")))?
            .into_value()
            .map_err(|e| AppError::RenderError(format!("Unexpected scroll height: {e}")))?;
        Ok(height.max(0.0) as u64)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AppError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| AppError::RenderError(format!("Screenshot failed: {e}")))
    }

    async fn close(self) -> Result<(), AppError> {
        self.page
            .close()
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to close tab: {e}")))
    }
}

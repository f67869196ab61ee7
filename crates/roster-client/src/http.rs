use std::time::Duration;

use reqwest::{Client, Proxy};
use roster_core::error::AppError;
use roster_core::traits::{RenderedPage, Renderer};
use url::Url;

const USER_AGENT: &str = "Roster/0.1 (directory crawler)";

/// Plain-HTTP renderer using reqwest.
///
/// Downloads raw HTML without running scripts. Good enough for directories
/// that render server-side; use the browser renderer for everything else.
/// Proxy routing is explicit: environment proxy variables are ignored.
#[derive(Clone)]
pub struct HttpRenderer {
    client: Client,
    timeout_secs: u64,
}

impl HttpRenderer {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(45), None)
    }

    pub fn with_timeout(timeout: Duration, proxy: Option<&str>) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);

        builder = match proxy {
            Some(proxy) => builder.proxy(
                Proxy::all(proxy)
                    .map_err(|e| AppError::ConfigError(format!("Invalid proxy {proxy}: {e}")))?,
            ),
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

impl Renderer for HttpRenderer {
    type Page = StaticPage;

    async fn open(&self, url: &Url) -> Result<StaticPage, AppError> {
        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::NavigationError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NavigationError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to read response body: {e}")))?;

        Ok(StaticPage {
            url: final_url,
            html,
        })
    }
}

/// A downloaded document. Nothing loads after the response, so scrolling
/// never reveals more markup.
#[derive(Debug, Clone)]
pub struct StaticPage {
    url: Url,
    html: String,
}

impl RenderedPage for StaticPage {
    fn url(&self) -> Url {
        self.url.clone()
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self.html.clone())
    }

    async fn scroll_to_bottom(&self) -> Result<u64, AppError> {
        Ok(self.html.len() as u64)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AppError> {
        Err(AppError::Unsupported(
            "screenshots need the browser renderer".into(),
        ))
    }

    async fn close(self) -> Result<(), AppError> {
        Ok(())
    }
}

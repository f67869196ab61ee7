//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::error::AppError;
use crate::models::ExtractedContact;
use crate::traits::{ArtifactStore, RecordSink, RenderedPage, Renderer};

fn key(url: &str) -> String {
    Url::parse(url).unwrap().to_string()
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Site {
    /// Markup per URL. Later entries appear after each scroll.
    pages: HashMap<String, Vec<String>>,
    redirects: HashMap<String, String>,
    failures: HashMap<String, String>,
    screenshot: Option<Vec<u8>>,
}

/// Serves canned markup per URL and records every navigation.
#[derive(Clone, Default)]
pub struct MockRenderer {
    site: Arc<Mutex<Site>>,
    pub opened: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<usize>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.lazy_page(url, &[html])
    }

    /// A page whose markup grows as it is scrolled.
    pub fn lazy_page(self, url: &str, stages: &[&str]) -> Self {
        self.site
            .lock()
            .unwrap()
            .pages
            .insert(key(url), stages.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn redirect(self, from: &str, to: &str) -> Self {
        self.site
            .lock()
            .unwrap()
            .redirects
            .insert(key(from), key(to));
        self
    }

    pub fn failing(self, url: &str, error: &str) -> Self {
        self.site
            .lock()
            .unwrap()
            .failures
            .insert(key(url), error.to_string());
        self
    }

    pub fn with_screenshot(self, png: &[u8]) -> Self {
        self.site.lock().unwrap().screenshot = Some(png.to_vec());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        *self.closed.lock().unwrap()
    }
}

impl Renderer for MockRenderer {
    type Page = MockPage;

    async fn open(&self, url: &Url) -> Result<MockPage, AppError> {
        self.opened.lock().unwrap().push(url.to_string());

        let site = self.site.lock().unwrap();
        if let Some(error) = site.failures.get(url.as_str()) {
            return Err(AppError::NavigationError(error.clone()));
        }
        let target = site
            .redirects
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| url.to_string());
        let stages = site
            .pages
            .get(&target)
            .cloned()
            .ok_or_else(|| AppError::NavigationError(format!("404 Not Found: {target}")))?;

        Ok(MockPage {
            url: Url::parse(&target).unwrap(),
            stages,
            stage: Mutex::new(0),
            screenshot: site.screenshot.clone(),
            closed: Arc::clone(&self.closed),
        })
    }
}

pub struct MockPage {
    url: Url,
    stages: Vec<String>,
    stage: Mutex<usize>,
    screenshot: Option<Vec<u8>>,
    closed: Arc<Mutex<usize>>,
}

impl RenderedPage for MockPage {
    fn url(&self) -> Url {
        self.url.clone()
    }

    async fn content(&self) -> Result<String, AppError> {
        let stage = *self.stage.lock().unwrap();
        Ok(self.stages[stage].clone())
    }

    async fn scroll_to_bottom(&self) -> Result<u64, AppError> {
        let mut stage = self.stage.lock().unwrap();
        if *stage + 1 < self.stages.len() {
            *stage += 1;
        }
        Ok(1000 * (*stage as u64 + 1))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AppError> {
        self.screenshot
            .clone()
            .ok_or_else(|| AppError::Unsupported("screenshot".into()))
    }

    async fn close(self) -> Result<(), AppError> {
        *self.closed.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockArtifactStore
// ---------------------------------------------------------------------------

/// Recorded artifact: (name, bytes, content_type).
pub type StoredArtifact = (String, Vec<u8>, String);

#[derive(Clone, Default)]
pub struct MockArtifactStore {
    pub stored: Arc<Mutex<Vec<StoredArtifact>>>,
}

impl MockArtifactStore {
    pub fn names(&self) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _, _)| name.clone())
            .collect()
    }
}

impl ArtifactStore for MockArtifactStore {
    async fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<(), AppError> {
        self.stored
            .lock()
            .unwrap()
            .push((name.to_string(), bytes.to_vec(), content_type.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingSink
// ---------------------------------------------------------------------------

/// Sink whose appends always fail.
#[derive(Clone, Default)]
pub struct FailingSink {
    pub attempts: Arc<Mutex<usize>>,
}

impl RecordSink for FailingSink {
    async fn append(&self, _contact: &ExtractedContact) -> Result<(), AppError> {
        *self.attempts.lock().unwrap() += 1;
        Err(AppError::StoreError("disk full".into()))
    }

    async fn records(&self) -> Result<Vec<ExtractedContact>, AppError> {
        Ok(vec![])
    }
}

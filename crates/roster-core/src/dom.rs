//! Parsed snapshot of a rendered page.
//!
//! The renderer hands back raw markup; every selector query the extractors
//! run goes through a [`PageSnapshot`]. `scraper::Html` is not `Send`, so a
//! snapshot must be built and dropped between awaits, never held across one.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::AppError;
use crate::text::normalize_whitespace;

pub struct PageSnapshot {
    base: Url,
    markup: String,
    document: Html,
}

impl PageSnapshot {
    pub fn new(base: Url, markup: String) -> Self {
        let document = Html::parse_document(&markup);
        Self {
            base,
            markup,
            document,
        }
    }

    pub fn parse(base: &str, markup: &str) -> Result<Self, AppError> {
        let base = Url::parse(base)
            .map_err(|e| AppError::Generic(format!("Invalid page URL '{base}': {e}")))?;
        Ok(Self::new(base, markup.to_string()))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Raw markup exactly as the renderer returned it.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.document.select(selector)
    }

    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.document.select(selector).next()
    }

    /// Text content of the whole document, whitespace-collapsed.
    pub fn full_text(&self) -> String {
        let raw: Vec<&str> = self.document.root_element().text().collect();
        normalize_whitespace(&raw.join(" "))
    }

    /// Resolves `href` against the page URI.
    ///
    /// Returns `None` for script/mail/phone schemes, bare fragments, and
    /// anything that does not end up as http(s).
    pub fn resolve(&self, href: &str) -> Option<Url> {
        resolve_href(&self.base, href)
    }
}

pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => {
            url.set_fragment(None);
            Some(url)
        }
        _ => None,
    }
}

/// Visible text of an element, whitespace-collapsed.
pub fn element_text(element: &ElementRef<'_>) -> String {
    let raw: Vec<&str> = element.text().collect();
    normalize_whitespace(&raw.join(" "))
}

/// Parses a selector from configuration.
pub fn parse_selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ConfigError(format!("Invalid selector '{css}': {e}")))
}

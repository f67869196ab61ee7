//! Name, phone, and email extraction from profile and contact pages.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use crate::config::CompiledSite;
use crate::dom::{PageSnapshot, element_text, resolve_href};
use crate::strategy::{Attempt, Cascade, Miss, non_empty};
use crate::text::normalize_whitespace;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static CONTACT_CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a, button").expect("valid selector"));

static US_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?[0-9]{3}\)?[\s.-]?[0-9]{3}[\s.-]?[0-9]{4}").expect("valid regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid regex")
});

static CONTACT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)contact").expect("valid regex"));

/// Fields pulled from one page. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFields {
    pub name: String,
    /// Phone exactly as found on the page, not yet normalized.
    pub phone: String,
    /// Lower-cased.
    pub email: String,
}

pub struct ContactExtractor {
    site: Arc<CompiledSite>,
    name: Cascade<String>,
    phone: Cascade<String>,
    email: Cascade<String>,
}

impl ContactExtractor {
    pub fn new(site: Arc<CompiledSite>) -> Self {
        let name = Cascade::new()
            .then_fn("name-marker", {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| first_text(page, &site.name_selector)
            })
            .then_fn("first-heading", {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| first_text(page, &site.heading_selector)
            });

        let phone = Cascade::new()
            .then_fn("phone-marker", {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| first_text(page, &site.phone_selector)
            })
            .then_fn("tel-link", tel_link)
            .then_fn("text-scan", phone_in_text);

        let email = Cascade::new()
            .then_fn("email-marker", {
                let site = Arc::clone(&site);
                move |page: &PageSnapshot| {
                    page.select(&site.email_selector)
                        .find_map(|a| mailto_target(&a))
                        .ok_or(Miss)
                }
            })
            .then_fn("mailto-link", |page: &PageSnapshot| {
                page.select(&ANCHOR)
                    .find_map(|a| mailto_target(&a))
                    .ok_or(Miss)
            })
            .then_fn("markup-scan", |page: &PageSnapshot| {
                EMAIL
                    .find_iter(page.markup())
                    .map(|m| m.as_str().to_lowercase())
                    .find(|email| !is_asset_name(email))
                    .ok_or(Miss)
            });

        Self {
            site,
            name,
            phone,
            email,
        }
    }

    pub fn name(&self, page: &PageSnapshot) -> String {
        self.name.first_or_empty(page)
    }

    pub fn phone(&self, page: &PageSnapshot) -> String {
        self.phone.first_or_empty(page)
    }

    pub fn email(&self, page: &PageSnapshot) -> String {
        self.email.first_or_empty(page)
    }

    pub fn extract(&self, page: &PageSnapshot) -> ContactFields {
        ContactFields {
            name: self.name(page),
            phone: self.phone(page),
            email: self.email(page),
        }
    }

    /// A "contact" anchor with a navigable target, or a "contact" button
    /// carrying a navigation attribute. Anchors are preferred.
    pub fn contact_link(&self, page: &PageSnapshot) -> Option<Url> {
        let candidates: Vec<ElementRef<'_>> = page
            .select(&CONTACT_CANDIDATES)
            .filter(|el| CONTACT_WORD.is_match(&element_text(el)))
            .collect();

        let anchor = candidates
            .iter()
            .filter(|el| el.value().name() == "a")
            .find_map(|el| el.value().attr("href").and_then(|href| page.resolve(href)));
        if anchor.is_some() {
            return anchor;
        }

        candidates
            .iter()
            .filter(|el| el.value().name() == "button")
            .find_map(|el| {
                self.site
                    .navigation_attributes
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .find_map(|target| resolve_href(page.base(), target))
            })
    }
}

fn first_text(page: &PageSnapshot, selector: &Selector) -> Attempt<String> {
    page.select_first(selector)
        .map(|el| element_text(&el))
        .ok_or(Miss)
        .and_then(non_empty)
}

fn strip_scheme<'a>(href: &'a str, scheme: &str) -> Option<&'a str> {
    let href = href.trim();
    let head = href.get(..scheme.len())?;
    if head.eq_ignore_ascii_case(scheme) {
        Some(&href[scheme.len()..])
    } else {
        None
    }
}

fn tel_link(page: &PageSnapshot) -> Attempt<String> {
    page.select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| strip_scheme(href, "tel:"))
        .map(normalize_whitespace)
        .ok_or(Miss)
        .and_then(non_empty)
}

fn phone_in_text(page: &PageSnapshot) -> Attempt<String> {
    US_PHONE
        .find(&page.full_text())
        .map(|m| m.as_str().to_string())
        .ok_or(Miss)
}

/// Retina asset names (`logo@2x.png`) look like addresses to the regex.
fn is_asset_name(candidate: &str) -> bool {
    const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif"];
    candidate
        .rsplit('.')
        .next()
        .is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext))
}

/// Address from a `mailto:` anchor, query parameters dropped, lower-cased.
fn mailto_target(anchor: &ElementRef<'_>) -> Option<String> {
    let href = anchor.value().attr("href")?;
    let rest = strip_scheme(href, "mailto:")?;
    let address = rest.split('?').next().unwrap_or_default().trim().to_lowercase();
    if address.is_empty() { None } else { Some(address) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use crate::text::normalize_phone;

    fn extractor() -> ContactExtractor {
        ContactExtractor::new(Arc::new(SiteProfile::default().compile().unwrap()))
    }

    fn page(body: &str) -> PageSnapshot {
        PageSnapshot::parse(
            "https://www.example.com/agent/jane-doe",
            &format!("<html><body>{body}</body></html>"),
        )
        .unwrap()
    }

    #[test]
    fn name_prefers_marker_over_heading() {
        let p = page(
            r#"<h2>Featured Listings</h2>
               <h1 data-testid="office-name">  Jane   Doe, Realtor® </h1>"#,
        );
        assert_eq!(extractor().name(&p), "Jane Doe, Realtor®");
    }

    #[test]
    fn name_falls_back_to_first_heading() {
        let p = page("<h2>Bob Smith</h2><h1>Other</h1>");
        assert_eq!(extractor().name(&p), "Bob Smith");
        assert_eq!(extractor().name(&page("<p>none</p>")), "");
    }

    #[test]
    fn phone_cascade_order() {
        let e = extractor();
        let marker = page(
            r#"<p class="MuiTypography-root MuiTypography-body1 css-1p1owym">(904) 555-0000</p>
               <a href="tel:+19045551111">Call</a>"#,
        );
        assert_eq!(e.phone(&marker), "(904) 555-0000");

        let tel = page(r#"<a href="TEL: 904.555.1111">Call</a><p>904-555-2222</p>"#);
        assert_eq!(e.phone(&tel), "904.555.1111");

        let text = page("<p>Office: <span>904-555-2222</span></p>");
        assert_eq!(e.phone(&text), "904-555-2222");

        assert_eq!(e.phone(&page("<p>no phone</p>")), "");
    }

    #[test]
    fn phone_text_scan_ignores_non_ascii_digits() {
        let e = extractor();
        // Arabic-Indic digits would normalize to nothing.
        let p = page("<p>٩٠٤-٥٥٥-٢٢٢٢</p><p>Cell 904-555-3333</p>");
        assert_eq!(e.phone(&p), "904-555-3333");
        assert_eq!(normalize_phone(&e.phone(&p)), "+19045553333");
    }

    #[test]
    fn email_cascade_order() {
        let e = extractor();
        let marker = page(
            r#"<a href="mailto:other@example.com">x</a>
               <div data-testid="emailDiv"><a data-testid="emailLink" href="mailto:Jane.Doe@Example.com?subject=Hi">Email</a></div>"#,
        );
        assert_eq!(e.email(&marker), "jane.doe@example.com");

        let mailto = page(r#"<a href="MAILTO:Bob@Example.COM">Email Bob</a>"#);
        assert_eq!(e.email(&mailto), "bob@example.com");

        let markup = page(r#"<script>var agent = {"email":"Carol@Brokerage.NET"};</script>"#);
        assert_eq!(e.email(&markup), "carol@brokerage.net");

        assert_eq!(e.email(&page("<p>nothing</p>")), "");
    }

    #[test]
    fn markup_scan_skips_asset_names() {
        let p = page(
            r#"<img srcset="/img/logo@2x.png 2x"><script>var e = "jane@example.com";</script>"#,
        );
        assert_eq!(extractor().email(&p), "jane@example.com");
    }

    #[test]
    fn marker_without_mailto_falls_through() {
        let p = page(
            r#"<div data-testid="emailDiv"><a data-testid="emailLink" href="/contact">Email</a></div>
               <a href="mailto:jane@example.com">jane</a>"#,
        );
        assert_eq!(extractor().email(&p), "jane@example.com");
    }

    #[test]
    fn contact_anchor_preferred() {
        let p = page(
            r#"<button data-href="/agent/jane-doe/button-contact">Contact</button>
               <a href="/agent/jane-doe/contact?src=profile">Contact Jane</a>"#,
        );
        assert_eq!(
            extractor().contact_link(&p).unwrap().as_str(),
            "https://www.example.com/agent/jane-doe/contact?src=profile"
        );
    }

    #[test]
    fn contact_button_with_navigation_attribute() {
        let p = page(r#"<button data-href="/agent/jane-doe/contact">CONTACT ME</button>"#);
        assert_eq!(
            extractor().contact_link(&p).unwrap().as_str(),
            "https://www.example.com/agent/jane-doe/contact"
        );
    }

    #[test]
    fn contact_requires_navigable_target() {
        let p = page(
            r#"<a href="javascript:void(0)">Contact</a>
               <button>Contact</button>
               <a href="/about">About us</a>"#,
        );
        assert!(extractor().contact_link(&p).is_none());
    }
}

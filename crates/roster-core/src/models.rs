use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// The three page types the crawl distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageKind {
    Listing,
    Profile,
    ContactFallback,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Listing => "LISTING",
            PageKind::Profile => "PROFILE",
            PageKind::ContactFallback => "CONTACT_FALLBACK",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a PROFILE visit learned before it had to hop to a contact page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialContext {
    /// Raw display name as extracted (suffixes not yet stripped).
    pub name: String,
    /// Phone, already normalized.
    pub phone: String,
    pub profile_url: String,
}

/// Page kind plus the payload that only some kinds carry.
///
/// A contact-fallback stage cannot exist without the context of the profile
/// visit that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Listing,
    Profile,
    ContactFallback(PartialContext),
}

/// A unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: Url,
    /// Listing page number this item descends from (always >= 1).
    pub page_index: u32,
    pub stage: Stage,
}

impl WorkItem {
    pub fn listing(url: Url, page_index: u32) -> Self {
        Self {
            url: normalize_url(url),
            page_index: page_index.max(1),
            stage: Stage::Listing,
        }
    }

    pub fn profile(url: Url, page_index: u32) -> Self {
        Self {
            url: normalize_url(url),
            page_index: page_index.max(1),
            stage: Stage::Profile,
        }
    }

    pub fn contact_fallback(url: Url, page_index: u32, context: PartialContext) -> Self {
        Self {
            url: normalize_url(url),
            page_index: page_index.max(1),
            stage: Stage::ContactFallback(context),
        }
    }

    pub fn kind(&self) -> PageKind {
        match self.stage {
            Stage::Listing => PageKind::Listing,
            Stage::Profile => PageKind::Profile,
            Stage::ContactFallback(_) => PageKind::ContactFallback,
        }
    }

    pub fn partial_context(&self) -> Option<&PartialContext> {
        match &self.stage {
            Stage::ContactFallback(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// Queue identity for this item.
    ///
    /// Profile and contact pages are keyed without their query string.
    /// Listing pages keep it because pagination lives there.
    pub fn dedup_key(&self) -> String {
        let mut url = self.url.clone();
        if self.kind() != PageKind::Listing {
            url.set_query(None);
        }
        format!("{}:{}", self.kind(), url)
    }
}

/// Drops the fragment; everything else is already canonical after `Url::parse`.
pub fn normalize_url(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// A contact pulled from a profile (and possibly its contact page).
///
/// Only ever built with a non-empty email; written once to the sink and
/// never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Best-effort `+1XXXXXXXXXX` phone, or empty.
    pub phone: String,
    pub source_profile_url: String,
    pub source_contact_url: String,
    pub scraped_at: DateTime<Utc>,
}

/// One line of the campaign export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "EMAIL")]
    pub email: String,
    #[serde(rename = "FIRSTNAME")]
    pub first_name: String,
    #[serde(rename = "LASTNAME")]
    pub last_name: String,
    #[serde(rename = "SMS")]
    pub sms: String,
}

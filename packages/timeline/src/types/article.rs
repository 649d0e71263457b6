//! Raw article types - what the crawler hands to the curation core.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A news article mentioning a figure.
///
/// Produced once by the ingest step and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    /// Stable, globally unique id (article id or URL hash)
    pub source_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub subtitle: String,

    #[serde(default)]
    pub body: String,

    /// Publication date, possibly only partially known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<PublicationDate>,

    /// When the ingest step recorded the article (absent on legacy rows)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

impl RawArticle {
    /// Create a new article with empty text fields.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: String::new(),
            subtitle: String::new(),
            body: String::new(),
            publication_date: None,
            ingested_at: None,
        }
    }

    /// Derive a stable source id from the article URL (SHA-256 hex).
    pub fn source_id_for_url(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_publication_date(mut self, date: PublicationDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_ingested_at(mut self, at: DateTime<Utc>) -> Self {
        self.ingested_at = Some(at);
        self
    }
}

/// A publication date known to year, month, or day precision.
///
/// Serialized as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PublicationDate {
    Year(i32),
    Month { year: i32, month: u32 },
    Day(NaiveDate),
}

impl PublicationDate {
    /// Parse a canonical date string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('-').collect();
        let digits = |p: &str, len: usize| p.len() == len && p.bytes().all(|b| b.is_ascii_digit());
        match *parts.as_slice() {
            [y] if digits(y, 4) => y.parse().ok().map(Self::Year),
            [y, m] if digits(y, 4) && digits(m, 2) => {
                let year = y.parse().ok()?;
                let month = m.parse().ok()?;
                (1..=12).contains(&month).then_some(Self::Month { year, month })
            }
            [y, m, d] if digits(y, 4) && digits(m, 2) && digits(d, 2) => NaiveDate::from_ymd_opt(
                y.parse().ok()?,
                m.parse().ok()?,
                d.parse().ok()?,
            )
            .map(Self::Day),
            _ => None,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Self::Year(y) => *y,
            Self::Month { year, .. } => *year,
            Self::Day(d) => d.year(),
        }
    }

    /// Month, if known.
    pub fn month(&self) -> Option<u32> {
        match self {
            Self::Year(_) => None,
            Self::Month { month, .. } => Some(*month),
            Self::Day(d) => Some(d.month()),
        }
    }

    /// Full date, if known.
    pub fn day(&self) -> Option<NaiveDate> {
        match self {
            Self::Day(d) => Some(*d),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year(y) => write!(f, "{:04}", y),
            Self::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Self::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for PublicationDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicationDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Crawled rows sometimes carry a time component ("2022-08-15T09:00:00")
        let date_part = raw.split(['T', ' ']).next().unwrap_or_default();
        Self::parse(date_part)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid publication date: {raw}")))
    }
}

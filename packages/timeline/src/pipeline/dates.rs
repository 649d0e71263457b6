//! Date validation and normalization for timeline points.
//!
//! Extracted dates arrive as whatever the model wrote: canonical strings,
//! Korean forms (`2022년 7월`), relative phrases (`지난달`, "last year") or
//! bare month names. [`DateNormalizer`] reconciles them against the
//! article's publication date; [`is_valid_date`] is the final gate.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::DateValidationError;
use crate::types::article::PublicationDate;

/// Whether `s` is exactly `YYYY`, `YYYY-MM` or `YYYY-MM-DD` and names a
/// real calendar year, month or day.
pub fn is_valid_date(s: &str) -> bool {
    let Some(caps) = canonical_re().captures(s) else {
        return false;
    };
    let Ok(year) = caps[1].parse::<i32>() else {
        return false;
    };
    let Some(month) = caps.get(2) else {
        return true;
    };
    let Ok(month) = month.as_str().parse::<u32>() else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }
    match caps.get(3).map(|d| d.as_str().parse::<u32>()) {
        Some(Ok(day)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
        Some(Err(_)) => false,
        None => true,
    }
}

/// Reconciles extracted date expressions with one article's context.
#[derive(Debug, Clone)]
pub struct DateNormalizer<'a> {
    published: Option<PublicationDate>,
    body: &'a str,
    max_year_drift: i32,
}

/// Year, optional month, optional day, before calendar validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateParts {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl DateParts {
    fn year(year: i32) -> Self {
        Self { year, month: None, day: None }
    }

    fn month(year: i32, month: u32) -> Self {
        Self { year, month: Some(month), day: None }
    }

    fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }

    fn render(&self) -> Result<String, DateValidationError> {
        let rendered = match (self.month, self.day) {
            (None, _) => format!("{:04}", self.year),
            (Some(m), None) => format!("{:04}-{:02}", self.year, m),
            (Some(m), Some(d)) => format!("{:04}-{:02}-{:02}", self.year, m, d),
        };
        if is_valid_date(&rendered) {
            Ok(rendered)
        } else {
            Err(DateValidationError::Calendar(rendered))
        }
    }
}

const YEAR_PHRASES: &[(&str, i32)] = &[
    ("this year", 0),
    ("current year", 0),
    ("올해", 0),
    ("금년", 0),
    ("last year", -1),
    ("previous year", -1),
    ("작년", -1),
    ("지난해", -1),
    ("지난 해", -1),
    ("전년", -1),
    ("next year", 1),
    ("coming year", 1),
    ("내년", 1),
    ("다음 해", 1),
    ("이듬해", 1),
];

const MONTH_PHRASES: &[(&str, i32)] = &[
    ("this month", 0),
    ("current month", 0),
    ("이번 달", 0),
    ("이번달", 0),
    ("이달", 0),
    ("last month", -1),
    ("previous month", -1),
    ("지난달", -1),
    ("지난 달", -1),
    ("전월", -1),
    ("next month", 1),
    ("coming month", 1),
    ("다음 달", 1),
    ("다음달", 1),
    ("내달", 1),
];

const DAY_PHRASES: &[(&str, i64)] = &[
    ("today", 0),
    ("오늘", 0),
    ("yesterday", -1),
    ("어제", -1),
    ("tomorrow", 1),
    ("내일", 1),
];

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Direction of a relative modifier in front of a month ("last November").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonthAnchor {
    /// No modifier or "this": the article's year
    Current,
    /// "last", "지난": the most recent such month before the article
    Previous,
    /// "next", "오는": the first such month after the article
    Following,
    /// Explicit year offset ("작년 11월" = November of last year)
    YearOffset(i32),
}

impl<'a> DateNormalizer<'a> {
    pub fn new(published: Option<PublicationDate>, body: &'a str, max_year_drift: i32) -> Self {
        Self {
            published,
            body,
            max_year_drift,
        }
    }

    /// Normalize one extracted date expression.
    pub fn normalize(&self, raw: &str) -> Result<String, DateValidationError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(DateValidationError::Empty);
        }

        if let Some(parts) = self.resolve_relative(text)? {
            return parts.render();
        }
        if let Some(parts) = self.resolve_named_month(text)? {
            return parts.render();
        }
        self.accept_absolute(text)
    }

    /// Accept an absolute date (canonical, Korean or dotted form), applying
    /// the year plausibility correction.
    pub fn accept_absolute(&self, text: &str) -> Result<String, DateValidationError> {
        let parts = parse_absolute(text.trim())
            .ok_or_else(|| DateValidationError::Format(text.trim().to_string()))?;
        self.correct_drift(parts).render()
    }

    fn reference(&self, expression: &str) -> Result<PublicationDate, DateValidationError> {
        self.published
            .ok_or_else(|| DateValidationError::MissingReference(expression.to_string()))
    }

    fn reference_month(&self, expression: &str) -> Result<(i32, u32), DateValidationError> {
        let published = self.reference(expression)?;
        published
            .month()
            .map(|m| (published.year(), m))
            .ok_or_else(|| DateValidationError::MissingReference(expression.to_string()))
    }

    /// "this year", "지난달", "yesterday"...
    fn resolve_relative(&self, text: &str) -> Result<Option<DateParts>, DateValidationError> {
        let lower = text.to_lowercase();

        if let Some((_, offset)) = YEAR_PHRASES.iter().find(|(p, _)| *p == lower) {
            let published = self.reference(text)?;
            return Ok(Some(DateParts::year(published.year() + offset)));
        }

        if let Some((_, offset)) = MONTH_PHRASES.iter().find(|(p, _)| *p == lower) {
            let (year, month) = self.reference_month(text)?;
            let (year, month) = shift_month(year, month, *offset);
            return Ok(Some(DateParts::month(year, month)));
        }

        if let Some((_, offset)) = DAY_PHRASES.iter().find(|(p, _)| *p == lower) {
            let day = self
                .reference(text)?
                .day()
                .ok_or_else(|| DateValidationError::MissingReference(text.to_string()))?;
            let shifted = day + Duration::days(*offset);
            return Ok(Some(DateParts::from_date(shifted)));
        }

        Ok(None)
    }

    /// Month without a year: "11월", "지난 11월", "작년 11월 3일", "next May".
    fn resolve_named_month(&self, text: &str) -> Result<Option<DateParts>, DateValidationError> {
        let (anchor, month, day, explicit_year) =
            if let Some(caps) = korean_month_re().captures(text) {
                let anchor = match caps.name("rel").map(|m| m.as_str()) {
                    None | Some("올해") | Some("금년") | Some("이번") => MonthAnchor::Current,
                    Some("지난") => MonthAnchor::Previous,
                    Some("오는") | Some("다음") => MonthAnchor::Following,
                    Some("작년") | Some("지난해") => MonthAnchor::YearOffset(-1),
                    Some(_) => MonthAnchor::YearOffset(1),
                };
                let Ok(month) = caps["month"].parse::<u32>() else {
                    return Ok(None);
                };
                let day = caps.name("day").and_then(|d| d.as_str().parse::<u32>().ok());
                (anchor, month, day, None)
            } else if let Some(caps) = english_month_re().captures(text) {
                let Some(month) = month_from_name(&caps["month"]) else {
                    return Ok(None);
                };
                let anchor = match caps.name("rel").map(|m| m.as_str().to_lowercase()).as_deref() {
                    Some("last") | Some("previous") => MonthAnchor::Previous,
                    Some("next") | Some("coming") => MonthAnchor::Following,
                    _ => MonthAnchor::Current,
                };
                let day = caps.name("day").and_then(|d| d.as_str().parse::<u32>().ok());
                let year = caps.name("year").and_then(|y| y.as_str().parse::<i32>().ok());
                (anchor, month, day, year)
            } else {
                return Ok(None);
            };

        if !(1..=12).contains(&month) {
            return Err(DateValidationError::Calendar(text.to_string()));
        }

        if let Some(year) = explicit_year {
            let parts = DateParts { year, month: Some(month), day };
            return Ok(Some(self.correct_drift(parts)));
        }

        let year = match anchor {
            MonthAnchor::Current => self.reference(text)?.year(),
            MonthAnchor::YearOffset(offset) => self.reference(text)?.year() + offset,
            MonthAnchor::Previous => {
                let (year, current) = self.reference_month(text)?;
                if month < current {
                    year
                } else {
                    year - 1
                }
            }
            MonthAnchor::Following => {
                let (year, current) = self.reference_month(text)?;
                if month > current {
                    year
                } else {
                    year + 1
                }
            }
        };

        Ok(Some(DateParts { year, month: Some(month), day }))
    }

    /// Replace an implausible absolute year with the article's year.
    ///
    /// A year further than `max_year_drift` from the publication year is
    /// kept only when the body itself mentions it.
    fn correct_drift(&self, parts: DateParts) -> DateParts {
        let Some(published) = self.published else {
            return parts;
        };
        let reference = published.year();
        if (parts.year - reference).abs() <= self.max_year_drift
            || mentions_year(self.body, parts.year)
        {
            return parts;
        }
        tracing::debug!(
            extracted = parts.year,
            published = reference,
            "correcting implausible year"
        );
        DateParts {
            year: reference,
            ..parts
        }
    }
}

fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let full = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    MONTH_NAMES
        .iter()
        .zip(full.iter())
        .position(|(short, long)| long.starts_with(lower.as_str()) && lower.starts_with(short))
        .map(|i| i as u32 + 1)
}

/// Whether `year` appears in `body` as a standalone 4-digit number.
fn mentions_year(body: &str, year: i32) -> bool {
    let needle = format!("{:04}", year);
    body.match_indices(&needle).any(|(idx, _)| {
        let before = body[..idx].chars().next_back();
        let after = body[idx + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

fn parse_absolute(text: &str) -> Option<DateParts> {
    let caps = canonical_re()
        .captures(text)
        .or_else(|| korean_absolute_re().captures(text))
        .or_else(|| dotted_re().captures(text))?;
    let year = caps[1].parse().ok()?;
    let month = match caps.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    let day = match caps.get(3) {
        Some(d) => Some(d.as_str().parse().ok()?),
        None => None,
    };
    Some(DateParts { year, month, day })
}

fn canonical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]{4})(?:-([0-9]{2})(?:-([0-9]{2}))?)?$").expect("valid regex"))
}

fn korean_absolute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([0-9]{4})\s*년(?:\s*([0-9]{1,2})\s*월(?:\s*([0-9]{1,2})\s*일)?)?(?:\s*(?:초|중순|하순|말|경|쯤))?$",
        )
        .expect("valid regex")
    })
}

fn dotted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{4})[./]\s?([0-9]{1,2})(?:[./]\s?([0-9]{1,2}))?\.?$").expect("valid regex")
    })
}

fn korean_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<rel>지난해|지난|작년|올해|금년|이번|내년|오는|다음)\s*)?(?P<month>[0-9]{1,2})\s*월(?:\s*(?P<day>[0-9]{1,2})\s*일)?(?:\s*(?:초|중순|하순|말|경|쯤))?$",
        )
        .expect("valid regex")
    })
}

fn english_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?P<rel>last|previous|this|current|next|coming)\s+)?(?:(?:early|mid|late)[-\s]+)?(?P<month>[a-z]{3,9})\.?(?:\s+(?P<day>[0-9]{1,2})(?:st|nd|rd|th)?)?(?:,?\s+(?P<year>[0-9]{4}))?$",
        )
        .expect("valid regex")
    })
}

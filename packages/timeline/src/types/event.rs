//! Event types - candidate and curated timeline entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A biographical event, possibly spread over several dated moments.
///
/// The same type is used for fresh candidates (no category yet) and for
/// curated entries. `event_years` is derived from the points and is
/// refreshed by every constructor and mutator, so it can never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event_title")]
    pub title: String,

    #[serde(rename = "event_summary", default)]
    pub summary: String,

    #[serde(rename = "timeline_points")]
    points: Vec<TimelinePoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    #[serde(default)]
    event_years: Vec<i32>,
}

impl Event {
    /// Create an uncategorized event.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        points: Vec<TimelinePoint>,
    ) -> Self {
        let mut event = Self {
            title: title.into(),
            summary: summary.into(),
            points,
            main_category: None,
            subcategory: None,
            event_years: Vec::new(),
        };
        event.refresh_years();
        event
    }

    /// Assign the taxonomy pair.
    pub fn with_category(
        mut self,
        main_category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        self.main_category = Some(main_category.into());
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn points(&self) -> &[TimelinePoint] {
        &self.points
    }

    /// Distinct years touched by the points, newest first.
    pub fn years(&self) -> &[i32] {
        &self.event_years
    }

    /// Every source id cited anywhere in the event.
    pub fn source_ids(&self) -> BTreeSet<String> {
        self.points
            .iter()
            .flat_map(|p| p.source_ids.iter().cloned())
            .collect()
    }

    /// Order points chronologically; equal dates keep their relative order.
    pub fn sort_points(&mut self) {
        self.points.sort_by(|a, b| a.date.cmp(&b.date));
    }

    /// Recompute `event_years` from the point dates.
    ///
    /// Called after deserializing untrusted input as well, since the
    /// field may be missing or stale there.
    pub fn refresh_years(&mut self) {
        self.event_years = derive_years(&self.points);
    }
}

/// One dated moment of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub date: String,

    #[serde(alias = "event", default)]
    pub description: String,

    /// Articles that evidence this point; never empty once curated
    #[serde(rename = "sourceIds", alias = "source_ids", default)]
    pub source_ids: BTreeSet<String>,
}

impl TimelinePoint {
    pub fn new(date: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
            source_ids: BTreeSet::new(),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_ids.insert(source_id.into());
        self
    }

    /// Whether two points describe the same moment.
    pub fn same_moment(&self, other: &TimelinePoint) -> bool {
        self.date == other.date && self.description.trim() == other.description.trim()
    }

    /// Year prefix of the date, if it parses.
    pub fn year(&self) -> Option<i32> {
        let prefix = self.date.get(..4)?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok()
    }
}

fn derive_years(points: &[TimelinePoint]) -> Vec<i32> {
    let years: BTreeSet<i32> = points.iter().filter_map(TimelinePoint::year).collect();
    years.into_iter().rev().collect()
}

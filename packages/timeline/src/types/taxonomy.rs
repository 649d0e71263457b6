//! The fixed two-level event taxonomy.

use indexmap::IndexMap;
use serde::Serialize;

/// Main categories and their subcategories, in display order.
///
/// Fixed at startup; the curation path never invents or corrects a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Taxonomy {
    categories: IndexMap<String, Vec<String>>,
}

const STANDARD: &[(&str, &[&str])] = &[
    (
        "Creative Works",
        &["Music", "Film & TV", "Publications & Art", "Awards & Honors"],
    ),
    (
        "Live & Broadcast",
        &["Concerts & Tours", "Broadcast Appearances", "Fan Events"],
    ),
    (
        "Public Activities",
        &[
            "Endorsements & Ambassadorships",
            "Philanthropy & Social Causes",
            "Media Interviews",
        ],
    ),
    (
        "Personal Milestones",
        &[
            "Education & Early Life",
            "Relationships & Family",
            "Health & Military Service",
        ],
    ),
    (
        "Career & Legal",
        &["Agency & Contracts", "Legal & Controversies", "Business Ventures"],
    ),
];

impl Taxonomy {
    /// Build a taxonomy from `(main, [sub...])` entries.
    pub fn new<M, S, I>(entries: impl IntoIterator<Item = (M, I)>) -> Self
    where
        M: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self {
            categories: entries
                .into_iter()
                .map(|(main, subs)| (main.into(), subs.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// The production taxonomy.
    pub fn standard() -> Self {
        Self::new(STANDARD.iter().map(|(main, subs)| (*main, subs.iter().copied())))
    }

    /// Whether `main` is a known main category.
    pub fn has_main(&self, main: &str) -> bool {
        self.categories.contains_key(main)
    }

    /// Exact membership check for a pair.
    pub fn contains(&self, main: &str, sub: &str) -> bool {
        self.categories
            .get(main)
            .is_some_and(|subs| subs.iter().any(|s| s == sub))
    }

    pub fn subcategories(&self, main: &str) -> Option<&[String]> {
        self.categories.get(main).map(Vec::as_slice)
    }

    pub fn main_categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// JSON rendering embedded in classification prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.categories).unwrap_or_default()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

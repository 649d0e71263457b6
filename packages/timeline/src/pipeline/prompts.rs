//! LLM prompts for the curation pipeline.
//!
//! Each call site has a fixed system prompt and a formatted user prompt.
//! [`PromptKind::of`] maps a system prompt back to its call site, which
//! lets test doubles script answers per stage.

use crate::types::{article::RawArticle, event::Event, taxonomy::Taxonomy};

/// System prompt for event extraction.
pub const EXTRACT_SYSTEM: &str = r#"You extract biographical timeline events about a public figure from Korean news articles.

Return ONLY a JSON object:
{
    "events": [
        {
            "event_title": "short, specific title",
            "event_summary": "1-2 sentence summary",
            "timeline_points": [
                {"date": "YYYY | YYYY-MM | YYYY-MM-DD", "description": "what happened on that date"}
            ]
        }
    ]
}

Rules:
- Only include events that concern the figure directly.
- Dates MUST be exactly one of: YYYY, YYYY-MM, YYYY-MM-DD (zero-padded). Use the
  coarsest granularity the article supports; never invent a day or month.
- Resolve relative expressions ("last month", "지난달", "올해") against the
  publication date when possible. If you cannot, copy the expression verbatim.
- Separate happenings are separate events. Two different award wins, or a
  concert and an award, are two event objects, never one.
- One event may have several timeline points when it unfolds over time
  (e.g. announced, then released).
- If the article contains no such events, return {"events": []}."#;

/// System prompt for taxonomy classification.
pub const CLASSIFY_SYSTEM: &str = r#"You classify a biographical event into a fixed two-level taxonomy.

Return ONLY a JSON object:
{"main_category": "<main category>", "subcategory": "<subcategory>"}

Both values MUST be copied exactly from the taxonomy, and the subcategory
MUST belong to the chosen main category. Do not invent categories."#;

/// System prompt for the MERGE / ADD_AS_NEW decision.
pub const CURATE_SYSTEM: &str = r#"You maintain a curated, deduplicated timeline of events for one subcategory.

Given the existing curated events and one new candidate event, decide whether
the candidate describes the SAME real-world event as one existing entry.

Return ONLY one of these JSON objects:
{"decision": "MERGE", "target_event_title": "<exact event_title of the existing event>", "updated_event_json": <complete event object>}
{"decision": "ADD_AS_NEW"}

When merging, updated_event_json must be the COMPLETE replacement event
(event_title, event_summary, timeline_points):
- keep every existing timeline point and add the candidate's new ones;
- when a candidate point has the same date and description as an existing
  point, keep one point and union their sourceIds;
- keep timeline_points sorted chronologically;
- never drop sourceIds.
If unsure, answer ADD_AS_NEW."#;

/// System prompt for the optional date-resolution fallback.
pub const RESOLVE_DATE_SYSTEM: &str = r#"You convert a date expression from a Korean news article into a canonical date.

Return ONLY a JSON object:
{"date": "YYYY | YYYY-MM | YYYY-MM-DD"}
or {"date": null} if the expression cannot be resolved.

Use the publication date as the reference for relative expressions. Never
add precision the expression does not carry."#;

/// Which pipeline stage a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Extract,
    Classify,
    Curate,
    ResolveDate,
    Other,
}

impl PromptKind {
    /// Identify the stage from its system prompt.
    pub fn of(system_prompt: &str) -> Self {
        match system_prompt {
            EXTRACT_SYSTEM => Self::Extract,
            CLASSIFY_SYSTEM => Self::Classify,
            CURATE_SYSTEM => Self::Curate,
            RESOLVE_DATE_SYSTEM => Self::ResolveDate,
            _ => Self::Other,
        }
    }
}

/// User prompt for extraction.
pub fn format_extract_prompt(figure_id: &str, article: &RawArticle, max_chars: usize) -> String {
    let published = article
        .publication_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Figure: {figure}\nPublication date: {published}\n\nTitle: {title}\nSubtitle: {subtitle}\n\nBody:\n{body}",
        figure = figure_id,
        published = published,
        title = article.title,
        subtitle = article.subtitle,
        body = truncate_chars(&article.body, max_chars),
    )
}

/// User prompt for classification.
pub fn format_classify_prompt(event: &Event, taxonomy: &Taxonomy) -> String {
    format!(
        "Taxonomy (main category -> subcategories):\n{taxonomy}\n\nEvent:\n{event}",
        taxonomy = taxonomy.to_prompt_json(),
        event = event_json(event),
    )
}

/// User prompt for the merge decision.
pub fn format_curate_prompt(subcategory: &str, existing: &[Event], candidate: &Event) -> String {
    let existing_json = serde_json::to_string_pretty(existing).unwrap_or_else(|_| "[]".into());
    format!(
        "Subcategory: {subcategory}\n\nExisting curated events:\n{existing}\n\nNew candidate event:\n{candidate}",
        subcategory = subcategory,
        existing = existing_json,
        candidate = event_json(candidate),
    )
}

/// User prompt for date resolution.
pub fn format_resolve_date_prompt(expression: &str, published: &str, context: &str) -> String {
    format!(
        "Publication date: {published}\nDate expression: {expression}\nSentence: {context}"
    )
}

fn event_json(event: &Event) -> String {
    serde_json::to_string_pretty(event).unwrap_or_default()
}

/// Truncate on a char boundary (article bodies are mostly Hangul).
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::article::PublicationDate;
    use crate::types::event::TimelinePoint;

    #[test]
    fn test_prompt_kind_roundtrip() {
        assert_eq!(PromptKind::of(EXTRACT_SYSTEM), PromptKind::Extract);
        assert_eq!(PromptKind::of(CLASSIFY_SYSTEM), PromptKind::Classify);
        assert_eq!(PromptKind::of(CURATE_SYSTEM), PromptKind::Curate);
        assert_eq!(PromptKind::of(RESOLVE_DATE_SYSTEM), PromptKind::ResolveDate);
        assert_eq!(PromptKind::of("You are a helpful assistant."), PromptKind::Other);
    }

    #[test]
    fn test_truncate_chars_respects_hangul() {
        assert_eq!(truncate_chars("아이유 콘서트", 3), "아이유");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_extract_prompt_includes_context() {
        let article = RawArticle::new("A1")
            .with_title("아이유 콘서트")
            .with_body("본문")
            .with_publication_date(PublicationDate::parse("2022-08-15").unwrap());
        let prompt = format_extract_prompt("iu", &article, 100);
        assert!(prompt.contains("Publication date: 2022-08-15"));
        assert!(prompt.contains("아이유 콘서트"));
    }

    #[test]
    fn test_curate_prompt_lists_existing() {
        let existing = vec![Event::new(
            "Golden Hour concert",
            "",
            vec![TimelinePoint::new("2022-07-10", "concert").with_source("A1")],
        )];
        let candidate = Event::new("Concert", "", vec![]);
        let prompt = format_curate_prompt("Music", &existing, &candidate);
        assert!(prompt.contains("Subcategory: Music"));
        assert!(prompt.contains("Golden Hour concert"));
    }
}

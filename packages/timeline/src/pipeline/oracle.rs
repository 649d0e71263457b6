//! Validating adapter around the completion service.
//!
//! Every LLM decision point goes through [`ask`], which never assumes the
//! answer is well-formed: the caller always gets a tagged [`Oracle`]
//! result and chooses its own fallback.

use serde::de::DeserializeOwned;

use crate::error::CompletionError;
use crate::traits::ai::{CompletionOptions, TextCompletionService};

/// Outcome of one completion call, parsed into `T`.
#[derive(Debug)]
pub enum Oracle<T> {
    /// The answer decoded into the expected schema.
    Parsed(T),

    /// The service answered, but not with a usable `T`.
    ParseError { reason: String, raw: String },

    /// The service itself failed.
    ServiceError(CompletionError),
}

/// Ask for a JSON answer and decode it as `T`.
pub async fn ask<T, A>(ai: &A, system: &str, user: &str) -> Oracle<T>
where
    T: DeserializeOwned,
    A: TextCompletionService + ?Sized,
{
    match ai.complete(system, user, CompletionOptions::json()).await {
        Ok(raw) => match parse_json_response::<T>(&raw) {
            Ok(value) => Oracle::Parsed(value),
            Err(reason) => Oracle::ParseError { reason, raw },
        },
        Err(e) => Oracle::ServiceError(e),
    }
}

/// Decode a model answer that should contain one JSON value.
///
/// Accepts bare JSON, JSON inside a markdown code block, and JSON
/// surrounded by prose (the outermost `{...}` span is tried last).
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty response".to_string());
    }

    let first_error = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    let unfenced = strip_code_fence(trimmed);
    if unfenced != trimmed {
        if let Ok(value) = serde_json::from_str(unfenced) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&unfenced[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(first_error)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string ("json") up to the first newline
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}

//! Event classification into the fixed taxonomy.
//!
//! Fail-closed: a pair that is not an exact member of the taxonomy is
//! rejected and the event is skipped. There is deliberately no fuzzy
//! matching and no default bucket on this path.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ClassificationRejected;
use crate::pipeline::oracle::{ask, Oracle};
use crate::pipeline::prompts::{format_classify_prompt, CLASSIFY_SYSTEM};
use crate::traits::ai::TextCompletionService;
use crate::types::{event::Event, taxonomy::Taxonomy};

#[derive(Debug, Clone, Deserialize)]
struct AIClassification {
    main_category: String,
    subcategory: String,
}

/// A validated taxonomy pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Classification {
    pub main_category: String,
    pub subcategory: String,
}

/// Assigns `(main category, subcategory)` pairs.
pub struct EventClassifier<A: TextCompletionService> {
    ai: Arc<A>,
    taxonomy: Taxonomy,
}

impl<A: TextCompletionService> EventClassifier<A> {
    pub fn new(ai: Arc<A>, taxonomy: Taxonomy) -> Self {
        Self { ai, taxonomy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify one event.
    pub async fn classify(&self, event: &Event) -> Result<Classification, ClassificationRejected> {
        let user = format_classify_prompt(event, &self.taxonomy);
        let answer = match ask::<AIClassification, _>(&*self.ai, CLASSIFY_SYSTEM, &user).await {
            Oracle::Parsed(answer) => answer,
            Oracle::ParseError { reason, .. } => {
                return Err(self.reject(event, ClassificationRejected::Parse(reason)))
            }
            Oracle::ServiceError(e) => return Err(self.reject(event, e.into())),
        };

        let main_category = answer.main_category.trim().to_string();
        let subcategory = answer.subcategory.trim().to_string();

        if !self.taxonomy.has_main(&main_category) {
            return Err(self.reject(
                event,
                ClassificationRejected::UnknownMainCategory { main_category },
            ));
        }
        if !self.taxonomy.contains(&main_category, &subcategory) {
            return Err(self.reject(
                event,
                ClassificationRejected::SubcategoryMismatch {
                    main_category,
                    subcategory,
                },
            ));
        }

        debug!(event = %event.title, %main_category, %subcategory, "Classified event");
        Ok(Classification {
            main_category,
            subcategory,
        })
    }

    fn reject(&self, event: &Event, reason: ClassificationRejected) -> ClassificationRejected {
        warn!(event = %event.title, %reason, "Classification rejected; skipping event");
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prompts::PromptKind;
    use crate::testing::{event, MockCompletion};
    use serde_json::json;

    fn classifier(ai: MockCompletion) -> EventClassifier<MockCompletion> {
        EventClassifier::new(
            Arc::new(ai),
            Taxonomy::new([("A", vec!["X", "Y"]), ("B", vec!["Z"])]),
        )
    }

    #[tokio::test]
    async fn test_exact_pair_accepted() {
        let c = classifier(MockCompletion::new().respond(
            PromptKind::Classify,
            json!({"main_category": "A", "subcategory": "Y"}),
        ));
        let result = c.classify(&event("e", "2022", "d", "S1")).await.unwrap();
        assert_eq!(result.main_category, "A");
        assert_eq!(result.subcategory, "Y");
    }

    #[tokio::test]
    async fn test_cross_category_pair_rejected() {
        let c = classifier(MockCompletion::new().respond(
            PromptKind::Classify,
            json!({"main_category": "A", "subcategory": "Z"}),
        ));
        let result = c.classify(&event("e", "2022", "d", "S1")).await;
        assert!(matches!(
            result,
            Err(ClassificationRejected::SubcategoryMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_hallucinated_main_rejected() {
        let c = classifier(MockCompletion::new().respond(
            PromptKind::Classify,
            json!({"main_category": "Music", "subcategory": "X"}),
        ));
        let result = c.classify(&event("e", "2022", "d", "S1")).await;
        assert!(matches!(
            result,
            Err(ClassificationRejected::UnknownMainCategory { .. })
        ));
    }

    #[tokio::test]
    async fn test_near_miss_not_corrected() {
        let c = classifier(MockCompletion::new().respond(
            PromptKind::Classify,
            json!({"main_category": "a", "subcategory": "x"}),
        ));
        assert!(c.classify(&event("e", "2022", "d", "S1")).await.is_err());
    }

    #[tokio::test]
    async fn test_service_and_parse_failures_rejected() {
        let c = classifier(MockCompletion::new().fail_for(PromptKind::Classify, "timeout"));
        assert!(matches!(
            c.classify(&event("e", "2022", "d", "S1")).await,
            Err(ClassificationRejected::Service(_))
        ));

        let c = classifier(
            MockCompletion::new().respond(PromptKind::Classify, json!({"category": "A"})),
        );
        assert!(matches!(
            c.classify(&event("e", "2022", "d", "S1")).await,
            Err(ClassificationRejected::Parse(_))
        ));
    }
}

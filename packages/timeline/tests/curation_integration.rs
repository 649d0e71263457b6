//! End-to-end curation scenarios against the in-memory store.

use serde_json::json;
use std::sync::Arc;

use timeline::pipeline::PromptKind;
use timeline::testing::{article, event, MockCompletion};
use timeline::{
    Classification, CurationEngine, MemoryStore, TimelineConfig, TimelinePipeline,
};

fn concert_extraction(description: &str) -> serde_json::Value {
    json!({"events": [{
        "event_title": "Golden Hour concert",
        "event_summary": "Stadium concert in Seoul",
        "timeline_points": [{"date": "2022-07-10", "description": description}]
    }]})
}

fn creative(sub: &str) -> serde_json::Value {
    json!({"main_category": "Creative Works", "subcategory": sub})
}

#[tokio::test]
async fn test_first_article_builds_timeline() {
    let store = Arc::new(MemoryStore::new());
    let ai = MockCompletion::new()
        .respond(
            PromptKind::Extract,
            json!({"events": [
                {
                    "event_title": "Golden Hour concert",
                    "event_summary": "Stadium concert in Seoul",
                    "timeline_points": [{"date": "2022-07-10", "description": "Held stadium concert"}]
                },
                {
                    "event_title": "Best Female Artist award",
                    "event_summary": "Won an award last month",
                    "timeline_points": [{"date": "last month", "description": "Won Best Female Artist"}]
                }
            ]}),
        )
        .respond(PromptKind::Classify, creative("Music"))
        .respond(PromptKind::Classify, creative("Awards & Honors"));
    let ai = Arc::new(ai);
    let pipeline = TimelinePipeline::new(store.clone(), ai.clone(), TimelineConfig::default());

    pipeline
        .ledger()
        .record_article(
            "iu",
            &article("A1", "2022-08-15", "7월 10일 콘서트를 열었고, 지난달 시상식에서 수상했다."),
        )
        .await
        .unwrap();

    let report = pipeline.process_figure("iu").await.unwrap();
    assert_eq!(report.events_extracted, 2);
    assert_eq!(report.appends, 2);
    assert_eq!(report.merges, 0);
    assert!(report.is_success());
    // Empty subcategories never ask for a decision
    assert!(ai.calls_of(PromptKind::Curate).is_empty());

    let doc = pipeline.timeline().load("iu", "Creative Works").await.unwrap();
    let music = doc.events("Music");
    let awards = doc.events("Awards & Honors");
    assert_eq!(music.len(), 1);
    assert_eq!(awards.len(), 1);
    assert_eq!(music[0].points()[0].date, "2022-07-10");
    assert_eq!(awards[0].points()[0].date, "2022-07");
    for e in music.iter().chain(awards) {
        assert_eq!(e.source_ids().into_iter().collect::<Vec<_>>(), vec!["A1"]);
        assert_eq!(e.years(), &[2022]);
    }

    assert!(pipeline.ledger().is_processed("iu", "A1").await.unwrap());
    assert!(pipeline.ledger().fetch_unprocessed("iu").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_article_merges_into_existing_event() {
    let store = Arc::new(MemoryStore::new());
    let ai = MockCompletion::new()
        .respond(PromptKind::Extract, concert_extraction("Held stadium concert"))
        .respond(
            PromptKind::Extract,
            concert_extraction("Held stadium concert for 50,000 fans"),
        )
        .respond(PromptKind::Classify, creative("Music"))
        .respond(PromptKind::Classify, creative("Music"))
        .respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Golden Hour concert",
                "updated_event_json": {
                    "event_title": "Golden Hour concert",
                    "event_summary": "Stadium concert in Seoul for 50,000 fans",
                    "timeline_points": [{
                        "date": "2022-07-10",
                        "description": "Held stadium concert for 50,000 fans",
                        "sourceIds": ["A1", "A2"]
                    }]
                }
            }),
        );
    let pipeline = TimelinePipeline::new(store, Arc::new(ai), TimelineConfig::default());

    for (id, published) in [("A1", "2022-07-11"), ("A2", "2022-07-12")] {
        pipeline
            .ledger()
            .record_article("iu", &article(id, published, "콘서트"))
            .await
            .unwrap();
    }

    let report = pipeline.process_figure("iu").await.unwrap();
    assert_eq!(report.articles_processed, 2);
    assert_eq!(report.appends, 1);
    assert_eq!(report.merges, 1);

    let music = pipeline
        .timeline()
        .events("iu", "Creative Works", "Music")
        .await
        .unwrap();
    assert_eq!(music.len(), 1);
    let ids: Vec<_> = music[0].points()[0].source_ids.iter().cloned().collect();
    assert_eq!(ids, vec!["A1", "A2"]);
    assert_eq!(music[0].summary, "Stadium concert in Seoul for 50,000 fans");
}

#[tokio::test]
async fn test_add_then_merge_unions_sources_without_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let ai = MockCompletion::new()
        .respond(PromptKind::Curate, json!({"decision": "ADD_AS_NEW"}))
        .respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Golden Hour concert",
                "updated_event_json": {
                    "event_title": "Golden Hour concert",
                    "timeline_points": [{"date": "2022-07-10", "description": "Held concert"}]
                }
            }),
        );
    let engine = CurationEngine::new(Arc::new(ai), store, TimelineConfig::default());
    let music = Classification {
        main_category: "Creative Works".to_string(),
        subcategory: "Music".to_string(),
    };

    engine
        .curate("iu", &music, event("Eight single", "2020-05", "Released single", "A0"))
        .await
        .unwrap();
    let first = engine
        .curate("iu", &music, event("Golden Hour concert", "2022-07-10", "Held concert", "A1"))
        .await
        .unwrap();
    let second = engine
        .curate("iu", &music, event("Golden Hour concert", "2022-07-10", "Held concert", "A2"))
        .await
        .unwrap();
    assert!(!first.is_merge());
    assert!(second.is_merge());

    let events = engine
        .timeline()
        .events("iu", "Creative Works", "Music")
        .await
        .unwrap();
    let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Eight single", "Golden Hour concert"]);

    let concert = &events[1];
    let ids: Vec<_> = concert.points()[0].source_ids.iter().cloned().collect();
    assert_eq!(ids, vec!["A1", "A2"]);
}

#[tokio::test]
async fn test_rerun_skips_processed_articles() {
    let store = Arc::new(MemoryStore::new());
    let ai = Arc::new(
        MockCompletion::new()
            .respond(PromptKind::Extract, concert_extraction("Held concert"))
            .respond(PromptKind::Classify, creative("Music")),
    );
    let pipeline = TimelinePipeline::new(store, ai.clone(), TimelineConfig::default());
    pipeline
        .ledger()
        .record_article("iu", &article("A1", "2022-07-11", ""))
        .await
        .unwrap();

    pipeline.process_figure("iu").await.unwrap();
    let rerun = pipeline.process_figure("iu").await.unwrap();

    assert_eq!(rerun.articles_processed, 0);
    assert_eq!(ai.calls_of(PromptKind::Extract).len(), 1);
    let music = pipeline
        .timeline()
        .events("iu", "Creative Works", "Music")
        .await
        .unwrap();
    assert_eq!(music.len(), 1);
}

#[tokio::test]
async fn test_cross_category_classification_drops_event() {
    let store = Arc::new(MemoryStore::new());
    let ai = MockCompletion::new()
        .respond(PromptKind::Extract, concert_extraction("Held concert"))
        .respond(
            PromptKind::Classify,
            json!({"main_category": "Creative Works", "subcategory": "Concerts & Tours"}),
        );
    let pipeline = TimelinePipeline::new(store, Arc::new(ai), TimelineConfig::default());
    pipeline
        .ledger()
        .record_article("iu", &article("A1", "2022-07-11", ""))
        .await
        .unwrap();

    let report = pipeline.process_figure("iu").await.unwrap();
    assert_eq!(report.classification_rejections, 1);
    assert!(pipeline.timeline().load_all("iu").await.unwrap().is_empty());
    // The article is still consumed
    assert!(pipeline.ledger().is_processed("iu", "A1").await.unwrap());
}

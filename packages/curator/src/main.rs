//! Curator CLI
//!
//! Records crawler output into the article ledger, runs curation passes
//! and prints curated timelines.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use timeline::ai::{OpenAICompletion, RateLimitedCompletion};
use timeline::{
    timeline_to_json, ProcessingLedger, RawArticle, SqliteStore, TimelinePipeline, TimelineStore,
};

#[derive(Parser)]
#[command(name = "curator")]
#[command(about = "Incremental timeline curation for public figures")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record crawled articles (JSON array) as unprocessed
    Import {
        #[arg(long)]
        figure: String,
        file: PathBuf,
    },

    /// Curate every unprocessed article of the given figures
    Run {
        #[arg(long = "figure", required = true)]
        figures: Vec<String>,
    },

    /// Print a figure's curated timeline as JSON
    Show {
        #[arg(long)]
        figure: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,timeline=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .with_context(|| format!("Failed to open {}", config.database_url))?,
    );

    match cli.command {
        Commands::Import { figure, file } => import(&store, &figure, &file).await,
        Commands::Run { figures } => run(&config, store, &figures).await,
        Commands::Show { figure } => show(&config, store, &figure).await,
    }
}

async fn import(store: &Arc<SqliteStore>, figure: &str, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<Value> =
        serde_json::from_str(&raw).context("Import file must be a JSON array of articles")?;

    let ledger = ProcessingLedger::new(store.clone());
    let (mut recorded, mut skipped) = (0, 0);
    for (index, record) in records.into_iter().enumerate() {
        let article = to_article(record).with_context(|| format!("Invalid article #{}", index))?;
        if ledger.record_article(figure, &article).await? {
            recorded += 1;
        } else {
            skipped += 1;
        }
    }

    tracing::info!(figure, recorded, skipped, "Import complete");
    Ok(())
}

/// Crawler rows may carry only a URL; the source id is then its hash.
fn to_article(mut record: Value) -> Result<RawArticle> {
    let Some(map) = record.as_object_mut() else {
        bail!("expected a JSON object");
    };
    if !map.contains_key("sourceId") {
        let url = map
            .get("url")
            .and_then(Value::as_str)
            .context("article needs a sourceId or a url")?;
        let id = RawArticle::source_id_for_url(url);
        map.insert("sourceId".to_string(), Value::String(id));
    }

    let mut article: RawArticle = serde_json::from_value(record)?;
    if article.ingested_at.is_none() {
        article.ingested_at = Some(Utc::now());
    }
    Ok(article)
}

async fn run(config: &Config, store: Arc<SqliteStore>, figures: &[String]) -> Result<()> {
    let mut client = OpenAICompletion::new(config.require_openai_key()?);
    if let Some(url) = &config.openai_base_url {
        client = client.with_base_url(url);
    }
    if let Some(model) = &config.openai_model {
        client = client.with_model(model);
    }
    tracing::info!(model = client.model(), "Using completion model");
    let ai = Arc::new(RateLimitedCompletion::new(
        client,
        config.llm_requests_per_second,
    ));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current article");
            on_signal.cancel();
        }
    });

    let pipeline = TimelinePipeline::new(store, ai, config.timeline.clone()).with_cancellation(cancel);

    let mut failed = false;
    for (figure, result) in pipeline.process_figures(figures).await {
        match result {
            Ok(report) => {
                println!("{}", serde_json::to_string(&summary(&report))?);
                failed |= !report.failed_articles.is_empty();
            }
            Err(e) => {
                tracing::error!(figure = %figure, error = %e, "Figure curation failed");
                failed = true;
            }
        }
    }

    if failed {
        bail!("some articles were left unprocessed; rerun to retry");
    }
    Ok(())
}

fn summary(report: &timeline::FigureReport) -> Value {
    serde_json::json!({
        "figure": report.figure_id,
        "articlesProcessed": report.articles_processed,
        "failedArticles": report.failed_articles,
        "extractionFailures": report.extraction_failures,
        "eventsExtracted": report.events_extracted,
        "classificationRejections": report.classification_rejections,
        "merges": report.merges,
        "appends": report.appends,
        "mergeFallbacks": report.merge_fallbacks,
        "droppedPoints": report.dropped_points,
        "cancelled": report.cancelled,
    })
}

async fn show(config: &Config, store: Arc<SqliteStore>, figure: &str) -> Result<()> {
    let timeline = TimelineStore::new(store, config.timeline.clone());
    let docs = timeline.load_all(figure).await?;
    println!("{}", serde_json::to_string_pretty(&timeline_to_json(&docs))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_only_rows_get_hashed_id() {
        let article = to_article(json!({
            "url": "https://news.example.com/a/1",
            "title": "IU concert",
            "publicationDate": "2022-08-15"
        }))
        .unwrap();

        assert_eq!(
            article.source_id,
            RawArticle::source_id_for_url("https://news.example.com/a/1")
        );
        assert!(article.ingested_at.is_some());
    }

    #[test]
    fn test_rows_without_id_or_url_rejected() {
        assert!(to_article(json!({"title": "no id"})).is_err());
        assert!(to_article(json!("not an object")).is_err());
    }
}

//! Article source trait.
//!
//! The crawler itself is out of scope; the pipeline only consumes the
//! articles it produced that have not yet been curated.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::article::RawArticle;

/// Supplier of articles not yet consumed by the curation pipeline.
#[async_trait]
pub trait RawArticleSource: Send + Sync {
    /// Articles for `figure_id` whose ledger flag is unset, in ingestion order.
    async fn fetch_unconsumed(&self, figure_id: &str) -> Result<Vec<RawArticle>>;
}

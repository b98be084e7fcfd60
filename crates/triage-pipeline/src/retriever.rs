use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use triage_core::config::RetrievalSettings;
use triage_core::traits::DocumentStore;
use triage_core::types::{Fusion, RetrievalResult};
use triage_core::Result;

use crate::bounded;
use crate::topic::TopicClassifier;

/// Topic classification followed by one filtered hybrid search.
pub struct HybridRetriever {
    topics: TopicClassifier,
    store: Arc<dyn DocumentStore>,
    top_k: usize,
    fusion: Fusion,
    store_timeout: Duration,
}

impl HybridRetriever {
    pub fn new(
        topics: TopicClassifier,
        store: Arc<dyn DocumentStore>,
        settings: &RetrievalSettings,
        store_timeout: Duration,
    ) -> Self {
        Self { topics, store, top_k: settings.top_k, fusion: settings.fusion, store_timeout }
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let filter = self.topics.classify_topics(query).await?;
        let start = Instant::now();
        let search = self.store.search(query, &filter, self.top_k, self.fusion);
        let mut documents = bounded("document-store", self.store_timeout, search).await?;
        documents.truncate(self.top_k);
        info!(
            returned = documents.len(),
            top_k = self.top_k,
            fusion = %self.fusion,
            unconstrained = filter.is_unconstrained(),
            ms = start.elapsed().as_millis() as u64,
            "retrieved documents"
        );
        let rationale = filter.rationale();
        Ok(RetrievalResult { documents, filter, rationale })
    }
}

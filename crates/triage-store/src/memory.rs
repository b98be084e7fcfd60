//! In-process document store: exact filtered scan with client-side fusion.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use triage_core::config::RetrievalSettings;
use triage_core::traits::{DenseEmbedder, DocumentStore, SparseEncoder};
use triage_core::types::{
    Document, DocumentId, Fusion, RetrievalMode, RetrievedDocument, SearchScope, TopicFilter,
};
use triage_core::{Error, Result};

use crate::embed::embed_query;
use crate::fusion::{self, DEFAULT_RRF_K};

/// Documents are kept in insertion order; a document's position is its
/// tie-break key during fusion.
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEncoder>,
    mode: RetrievalMode,
    rrf_k: f32,
}

impl InMemoryDocumentStore {
    pub fn new(dense: Arc<dyn DenseEmbedder>, sparse: Arc<dyn SparseEncoder>) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            dense,
            sparse,
            mode: RetrievalMode::Hybrid,
            rrf_k: DEFAULT_RRF_K,
        }
    }

    pub fn from_settings(
        settings: &RetrievalSettings,
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEncoder>,
    ) -> Self {
        Self::new(dense, sparse).with_mode(settings.mode).with_rrf_k(settings.rrf_k)
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rrf_k(mut self, rrf_k: f32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    /// Ids of every document a search under `scope` may consider, in insertion order.
    pub async fn candidates(&self, scope: &SearchScope) -> Vec<DocumentId> {
        let docs = self.documents.read().await;
        docs.iter()
            .filter(|d| scope.contains(d.category()))
            .map(|d| d.id().to_string())
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ingest(&self, documents: Vec<Document>) -> Result<()> {
        let dim = self.dense.dim();
        let mut stored = self.documents.write().await;
        let mut seen: HashSet<String> = stored.iter().map(|d| d.id().to_string()).collect();
        for doc in &documents {
            if doc.dense().len() != dim {
                return Err(Error::InvalidDocument(format!(
                    "document {} has {} dense dims, store expects {dim}",
                    doc.id(),
                    doc.dense().len()
                )));
            }
            if !seen.insert(doc.id().to_string()) {
                return Err(Error::InvalidDocument(format!("duplicate document id {}", doc.id())));
            }
        }
        let count = documents.len();
        stored.extend(documents);
        debug!(added = count, total = stored.len(), "ingested documents");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        filter: &TopicFilter,
        k: usize,
        fusion: Fusion,
    ) -> Result<Vec<RetrievedDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let scope = filter.scope();
        {
            let docs = self.documents.read().await;
            if !docs.iter().any(|d| scope.contains(d.category())) {
                debug!("no candidates under filter");
                return Ok(Vec::new());
            }
        }

        let q_dense = embed_query(&self.dense, query).await?;
        let q_sparse = match self.mode {
            RetrievalMode::Hybrid => Some(self.sparse.encode(query)?),
            RetrievalMode::Dense => None,
        };

        let docs = self.documents.read().await;
        let candidates: Vec<usize> =
            (0..docs.len()).filter(|&i| scope.contains(docs[i].category())).collect();
        let mut signals = vec![fusion::rank_signal(
            candidates
                .iter()
                .map(|&i| (i, cosine_similarity(docs[i].dense(), &q_dense)))
                .collect(),
        )];
        if let Some(q_sparse) = q_sparse {
            signals.push(fusion::rank_signal(
                candidates.iter().map(|&i| (i, q_sparse.dot(docs[i].sparse()))).collect(),
            ));
        }

        let mut fused = fusion::fuse(fusion, &signals, self.rrf_k);
        fused.truncate(k);
        debug!(
            candidates = candidates.len(),
            returned = fused.len(),
            %fusion,
            ms = start.elapsed().as_millis() as u64,
            "in-memory search"
        );
        Ok(fused.into_iter().map(|(i, score)| docs[i].to_retrieved(score)).collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }
}

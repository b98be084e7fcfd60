use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use triage_core::data_processor::SourceRecord;
use triage_core::traits::{DenseEmbedder, DocumentStore, SparseEncoder};
use triage_core::types::Document;
use triage_core::{Error, Result};

const EMBED_BATCH: usize = 32;

/// Turns loaded records into documents carrying both signals, then hands them to a store.
pub struct Ingestor {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEncoder>,
}

impl Ingestor {
    pub fn new(dense: Arc<dyn DenseEmbedder>, sparse: Arc<dyn SparseEncoder>) -> Self {
        Self { dense, sparse }
    }

    pub fn build_documents(&self, records: &[SourceRecord]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(records.len());
        for batch in records.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let dense = self.dense.embed_batch(&texts)?;
            if dense.len() != batch.len() {
                return Err(Error::upstream(
                    "dense-embedder",
                    format!("expected {} embeddings, got {}", batch.len(), dense.len()),
                ));
            }
            for (record, vector) in batch.iter().zip(dense) {
                let sparse = self.sparse.encode(&record.content)?;
                documents.push(Document::new(
                    Uuid::new_v4().to_string(),
                    record.content.clone(),
                    record.category,
                    vector,
                    sparse,
                )?);
            }
        }
        Ok(documents)
    }

    /// Embeds and stores `records` in order. Returns the number stored.
    pub async fn ingest(
        &self,
        store: &dyn DocumentStore,
        records: &[SourceRecord],
    ) -> Result<usize> {
        let start = Instant::now();
        let documents = self.build_documents(records)?;
        let count = documents.len();
        store.ingest(documents).await?;
        info!(count, ms = start.elapsed().as_millis() as u64, "ingested records");
        Ok(count)
    }
}

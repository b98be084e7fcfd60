//! Qdrant backend.
//!
//! Points carry two named vectors, `dense_vector` (cosine) and `sparse_vector`,
//! and a payload `{"page_content": .., "metadata": {"source": "feedbacks"|"bugs"}}`.
//! Hybrid search runs one prefetch per signal, both under the category filter,
//! and lets the server fuse them.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter,
    Fusion as QdrantFusion, NamedVectors, PointStruct, PrefetchQueryBuilder, Query,
    QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
    UpsertPointsBuilder, Value as QdrantValue, Vector, VectorInput, VectorParamsBuilder,
    VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use tracing::{debug, info, warn};

use triage_core::config::{RetrievalSettings, StoreSettings};
use triage_core::traits::{DenseEmbedder, DocumentStore, SparseEncoder};
use triage_core::types::{
    Category, Document, Fusion, RetrievalMode, RetrievedDocument, SearchScope, TopicFilter,
};
use triage_core::{Error, Result};

use crate::embed::embed_query;
use crate::fusion::DEFAULT_RRF_K;

pub const DENSE_VECTOR: &str = "dense_vector";
pub const SPARSE_VECTOR: &str = "sparse_vector";
const SOURCE_FIELD: &str = "metadata.source";
const UPSERT_BATCH: usize = 64;

pub struct QdrantDocumentStore {
    client: Qdrant,
    collection: String,
    dense_dim: usize,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEncoder>,
    mode: RetrievalMode,
    prefetch_limit: usize,
}

impl QdrantDocumentStore {
    pub fn new(
        store: &StoreSettings,
        retrieval: &RetrievalSettings,
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEncoder>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(&store.qdrant_url)
            .timeout(Duration::from_secs(store.timeout_secs))
            .build()
            .map_err(map_err)?;
        if ignores_rrf_k(retrieval) {
            warn!(
                rrf_k = retrieval.rrf_k,
                server_k = DEFAULT_RRF_K,
                "qdrant applies its own RRF constant; retrieval.rrf_k is ignored"
            );
        }
        Ok(Self {
            client,
            collection: store.collection.clone(),
            dense_dim: store.dense_dim,
            dense,
            sparse,
            mode: retrieval.mode,
            prefetch_limit: retrieval.prefetch_limit,
        })
    }

    /// Creates the collection when missing. Returns `true` if it was created,
    /// i.e. it still needs seeding.
    pub async fn ensure_collection(&self) -> Result<bool> {
        if self.client.collection_exists(self.collection.clone()).await.map_err(map_err)? {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(false);
        }

        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(self.dense_dim as u64, Distance::Cosine),
        );
        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors)
                    .sparse_vectors_config(sparse),
            )
            .await
            .map_err(map_err)?;
        info!(collection = %self.collection, dim = self.dense_dim, "created qdrant collection");
        Ok(true)
    }

    fn to_point(doc: &Document) -> Result<PointStruct> {
        let payload = Payload::try_from(json!({
            "page_content": doc.content(),
            "metadata": { "source": doc.category().as_str() },
        }))
        .map_err(|e| Error::upstream("qdrant", e))?;
        let vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR, Vector::from(doc.dense().to_vec()))
            .add_vector(
                SPARSE_VECTOR,
                Vector::new_sparse(doc.sparse().indices().to_vec(), doc.sparse().values().to_vec()),
            );
        Ok(PointStruct::new(doc.id().to_string(), vectors, payload))
    }

    fn category_filter(scope: &SearchScope) -> Filter {
        Filter::should(
            scope.categories().map(|c| Condition::matches(SOURCE_FIELD, c.as_str().to_string())),
        )
    }
}

/// Qdrant fuses with its own fixed RRF constant, so `retrieval.rrf_k` only
/// applies to the in-memory store.
fn server_fusion(fusion: Fusion) -> QdrantFusion {
    match fusion {
        Fusion::RankSum => QdrantFusion::Dbsf,
        Fusion::ReciprocalRank => QdrantFusion::Rrf,
    }
}

fn ignores_rrf_k(retrieval: &RetrievalSettings) -> bool {
    retrieval.fusion == Fusion::ReciprocalRank
        && (retrieval.rrf_k - DEFAULT_RRF_K).abs() > f32::EPSILON
}

fn map_err(e: QdrantError) -> Error {
    Error::upstream("qdrant", e)
}

fn extract_string(value: &QdrantValue) -> Option<&str> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn to_retrieved(point: ScoredPoint) -> Option<RetrievedDocument> {
    let id = match point.id.as_ref().and_then(|pid| pid.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(s)) => s.clone(),
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => return None,
    };
    let content = point.payload.get("page_content").and_then(extract_string)?.to_string();
    let source = point.payload.get("metadata").and_then(|v| match &v.kind {
        Some(Kind::StructValue(s)) => s.fields.get("source").and_then(extract_string),
        _ => None,
    })?;
    let category = Category::from_str(source).ok()?;
    Some(RetrievedDocument { id, content, category, score: point.score })
}

#[async_trait]
impl DocumentStore for QdrantDocumentStore {
    async fn ingest(&self, documents: Vec<Document>) -> Result<()> {
        for batch in documents.chunks(UPSERT_BATCH) {
            let points = batch.iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(map_err)?;
            debug!(collection = %self.collection, count = batch.len(), "upserted points");
        }
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
        let qfilter = Self::category_filter(&scope);
        let prefetch = self.prefetch_limit.max(k) as u64;

        let q_dense = embed_query(&self.dense, query).await?;
        let mut request = QueryPointsBuilder::new(&self.collection).add_prefetch(
            PrefetchQueryBuilder::default()
                .query(Query::new_nearest(q_dense))
                .using(DENSE_VECTOR)
                .filter(qfilter.clone())
                .limit(prefetch),
        );
        if self.mode == RetrievalMode::Hybrid {
            let q_sparse = self.sparse.encode(query)?;
            if !q_sparse.is_empty() {
                request = request.add_prefetch(
                    PrefetchQueryBuilder::default()
                        .query(Query::new_nearest(VectorInput::new_sparse(
                            q_sparse.indices().to_vec(),
                            q_sparse.values().to_vec(),
                        )))
                        .using(SPARSE_VECTOR)
                        .filter(qfilter.clone())
                        .limit(prefetch),
                );
            }
        }
        let request = request
            .query(server_fusion(fusion))
            .filter(qfilter)
            .limit(k as u64)
            .with_payload(true);

        let response = self.client.query(request).await.map_err(map_err)?;
        let mut documents = Vec::with_capacity(response.result.len());
        for point in response.result {
            match to_retrieved(point) {
                Some(doc) => documents.push(doc),
                None => {
                    warn!(collection = %self.collection, "skipping point with malformed payload");
                }
            }
        }
        documents.truncate(k);
        debug!(
            returned = documents.len(),
            %fusion,
            ms = start.elapsed().as_millis() as u64,
            "qdrant search"
        );
        Ok(documents)
    }

    async fn len(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

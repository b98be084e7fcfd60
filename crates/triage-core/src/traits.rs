use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::{Document, Fusion, RetrievedDocument, SparseVector, TopicFilter};

/// Semantic embedder producing fixed-size, L2-normalised vectors.
pub trait DenseEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::Error::upstream("dense-embedder", "empty embedding batch"))
    }
}

/// Lexical encoder mapping text to term-index weights.
pub trait SparseEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<SparseVector>;
}

/// Filtered hybrid search over ingested documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds documents in order. Documents are immutable once ingested.
    async fn ingest(&self, documents: Vec<Document>) -> Result<()>;

    /// Returns at most `k` documents from the categories in `filter.scope()`,
    /// ranked by `fusion` over the dense and sparse signals.
    async fn search(
        &self,
        query: &str,
        filter: &TopicFilter,
        k: usize,
        fusion: Fusion,
    ) -> Result<Vec<RetrievedDocument>>;

    async fn len(&self) -> Result<usize>;
}

/// JSON schema the model output must conform to.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// One generation call: optional system instruction, user content and,
/// for structured calls, the schema to constrain output to.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub user: String,
    pub schema: Option<ResponseSchema>,
}

impl ChatRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), ..Self::default() }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Text generation capability. Returns the raw model text; structured callers
/// coerce it themselves.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    fn name(&self) -> &str;
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info};

use triage_core::config::Settings;
use triage_core::traits::{ChatModel, ChatRequest, DocumentStore};
use triage_core::types::{Route, TriageResponse};
use triage_core::Result;

use crate::{
    bounded, EvidenceAssembler, HybridRetriever, RouteClassifier, SummaryExtractor, TopicClassifier,
};

/// The only failure `handle` reports. The underlying cause is logged, not returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandleError {
    pub message: String,
}

impl HandleError {
    fn opaque() -> Self {
        Self { message: "The request could not be processed. Please try again later.".to_string() }
    }
}

pub struct TriageAgent {
    router: RouteClassifier,
    retriever: HybridRetriever,
    assembler: EvidenceAssembler,
    summarizer: SummaryExtractor,
    generator: Arc<dyn ChatModel>,
    llm_timeout: Duration,
}

impl TriageAgent {
    /// Every model-backed step shares `model`; retrieval searches `store`.
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<dyn DocumentStore>,
        settings: &Settings,
    ) -> Self {
        let llm_timeout = Duration::from_secs(settings.llm.timeout_secs);
        let store_timeout = Duration::from_secs(settings.store.timeout_secs);
        Self {
            router: RouteClassifier::new(model.clone(), llm_timeout),
            retriever: HybridRetriever::new(
                TopicClassifier::new(model.clone(), llm_timeout),
                store,
                &settings.retrieval,
                store_timeout,
            ),
            assembler: EvidenceAssembler::new(),
            summarizer: SummaryExtractor::new(model.clone(), llm_timeout),
            generator: model,
            llm_timeout,
        }
    }

    /// Entry point. Assumes `raw` was already validated as non-empty.
    pub async fn handle(&self, raw: &str) -> std::result::Result<TriageResponse, HandleError> {
        let start = Instant::now();
        match self.dispatch(raw).await {
            Ok(response) => {
                info!(ms = start.elapsed().as_millis() as u64, "request handled");
                Ok(response)
            }
            Err(err) => {
                error!(
                    kind = err.kind(),
                    upstream = err.is_upstream(),
                    error = %err,
                    "request failed"
                );
                Err(HandleError::opaque())
            }
        }
    }

    async fn dispatch(&self, raw: &str) -> Result<TriageResponse> {
        let decision = self.router.classify_route(raw).await?;
        match decision.route {
            Route::QuestionAnswering => {
                Ok(TriageResponse::Answer { answer: self.answer(raw).await? })
            }
            Route::Summarization => {
                Ok(TriageResponse::Summary(self.summarizer.extract_summary(raw).await?))
            }
        }
    }

    /// QA path: retrieve, assemble the grounding request, generate.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let retrieval = self.retriever.retrieve(query).await?;
        let prompt = self.assembler.assemble(query, &retrieval.filter, &retrieval.documents);
        let answer = bounded(
            self.generator.name(),
            self.llm_timeout,
            self.generator.complete(ChatRequest::new(prompt)),
        )
        .await?;
        info!(
            documents = retrieval.documents.len(),
            rationale = %retrieval.rationale,
            "generated answer"
        );
        Ok(answer)
    }
}

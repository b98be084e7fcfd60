use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use triage_core::traits::{ChatModel, ChatRequest, ResponseSchema};
use triage_core::types::TopicFilter;
use triage_core::{Error, Result};
use triage_llm::generate_structured;

use crate::{bounded, ensure_rationale};

const STAGE: &str = "topic";

pub const TOPIC_SYSTEM_PROMPT: &str = "You are an assistant. Given a user query, decide if it is related to \"user feedbacks\", \"bugs\", or both. Provide a brief explanation of your reasoning.";

#[derive(Debug, Deserialize)]
struct TopicFlags {
    feedbacks: bool,
    bugs: bool,
    reason: String,
}

/// Decides which document categories a query is about.
pub struct TopicClassifier {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl TopicClassifier {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn schema() -> ResponseSchema {
        ResponseSchema {
            name: "topic_filter".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "feedbacks": { "type": "boolean", "description": "True if the query is about user feedback." },
                    "bugs": { "type": "boolean", "description": "True if the query is about bugs." },
                    "reason": { "type": "string", "description": "Brief explanation of the decision." }
                },
                "required": ["feedbacks", "bugs", "reason"],
                "additionalProperties": false
            }),
        }
    }

    /// A response that cannot be coerced degrades to [`TopicFilter::degraded`].
    /// Transport failures and timeouts still fail the request.
    pub async fn classify_topics(&self, query: &str) -> Result<TopicFilter> {
        let request = ChatRequest::new(format!("Query: {query}"))
            .with_system(TOPIC_SYSTEM_PROMPT)
            .with_schema(Self::schema());
        let call = generate_structured::<TopicFlags>(self.model.as_ref(), request, STAGE);
        let outcome = bounded(self.model.name(), self.timeout, call).await;
        let filter = match outcome {
            Ok(mut flags) => {
                ensure_rationale(STAGE, &mut flags.reason);
                TopicFilter::new(flags.feedbacks, flags.bugs, flags.reason)
            }
            Err(err @ Error::Schema { .. }) => {
                warn!(error = %err, "topic classification unusable, searching all categories");
                TopicFilter::degraded()
            }
            Err(err) => return Err(err),
        };
        info!(
            feedbacks = filter.feedbacks,
            bugs = filter.bugs,
            degraded = filter.degraded,
            reason = %filter.reason,
            "classified topics"
        );
        Ok(filter)
    }
}

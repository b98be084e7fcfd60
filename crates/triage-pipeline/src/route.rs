use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use triage_core::traits::{ChatModel, ChatRequest, ResponseSchema};
use triage_core::types::RouteDecision;
use triage_core::Result;
use triage_llm::generate_structured;

use crate::{bounded, ensure_rationale};

const STAGE: &str = "route";

pub const ROUTE_SYSTEM_PROMPT: &str = "\
You will receive a user's raw input. Decide whether it is:

  1. A standalone *question* that needs a document-search / QA answer (\"qa\"),
  2. A *structured issue/bug report* that needs summarizing into key points (\"summary\").

Rules
- If the text is one or two sentences ending in a question mark, or asks \"What...?\", \"How...?\", etc., or is otherwise asking a question, choose \"qa\".
- If the text contains multiple fields like \"Title:\", \"Description:\", \"Steps to Reproduce:\", \"Environment:\", \"Severity:\", \"Proposed Fix:\", or otherwise looks like a bug report template, choose \"summary\".

Provide your output as a JSON object with two fields: 'tool' and 'reasoning'. Ensure the 'reasoning' field explains why you selected the corresponding tool.";

/// Picks the QA or summary path for a raw input.
pub struct RouteClassifier {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl RouteClassifier {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn schema() -> ResponseSchema {
        ResponseSchema {
            name: "route_decision".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "tool": {
                        "type": "string",
                        "enum": ["qa", "summary"],
                        "description": "'qa' for a standalone question to answer; 'summary' for a structured bug/issue report to summarize."
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "A brief explanation of why the tool was chosen."
                    }
                },
                "required": ["tool", "reasoning"],
                "additionalProperties": false
            }),
        }
    }

    /// Any failure here is fatal to the request.
    pub async fn classify_route(&self, raw: &str) -> Result<RouteDecision> {
        let request =
            ChatRequest::new(raw).with_system(ROUTE_SYSTEM_PROMPT).with_schema(Self::schema());
        let call = generate_structured(self.model.as_ref(), request, STAGE);
        let mut decision: RouteDecision = bounded(self.model.name(), self.timeout, call).await?;
        ensure_rationale(STAGE, &mut decision.reasoning);
        info!(route = ?decision.route, reasoning = %decision.reasoning, "routed request");
        Ok(decision)
    }
}

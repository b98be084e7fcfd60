use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use triage_core::traits::{ChatModel, ChatRequest, ResponseSchema};
use triage_core::types::IssueSummary;
use triage_core::Result;
use triage_llm::generate_structured;

use crate::bounded;

const STAGE: &str = "summary";

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are an assistant that summarizes a single issue report.

Given the issue description below, extract and return a JSON object with exactly these fields:

- reported_issues: A concise statement of the reported problem.
- affected_components: The feature(s) or component(s) impacted.
- severity: The severity level (Low, Medium, High, Critical).

Respond _only_ with valid JSON conforming to the schema.
";

pub struct SummaryExtractor {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl SummaryExtractor {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn schema() -> ResponseSchema {
        ResponseSchema {
            name: "issue_summary".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "reported_issues": { "type": "string", "description": "A concise description of the problem reported." },
                    "affected_components": { "type": "string", "description": "Which feature(s) or component(s) are impacted by this issue." },
                    "severity": { "type": "string", "enum": ["Low", "Medium", "High", "Critical"], "description": "The severity level." }
                },
                "required": ["reported_issues", "affected_components", "severity"],
                "additionalProperties": false
            }),
        }
    }

    /// One structured call, no retry. A malformed response fails the request.
    pub async fn extract_summary(&self, report: &str) -> Result<IssueSummary> {
        let user = format!("Summarize the following issue report:\n```\n{report}\n```\n");
        let request = ChatRequest::new(user)
            .with_system(SUMMARY_SYSTEM_PROMPT)
            .with_schema(Self::schema());
        let call = generate_structured(self.model.as_ref(), request, STAGE);
        let summary: IssueSummary = bounded(self.model.name(), self.timeout, call).await?;
        info!(
            severity = %summary.severity,
            components = %summary.affected_components,
            "extracted summary"
        );
        Ok(summary)
    }
}

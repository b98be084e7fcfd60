//! Request pipeline: route, classify topics, retrieve, assemble evidence and
//! generate, or extract an issue summary.

pub mod agent;
pub mod evidence;
pub mod retriever;
pub mod route;
pub mod summary;
pub mod topic;

use std::future::Future;
use std::time::Duration;

use triage_core::{Error, Result};

pub use agent::{HandleError, TriageAgent};
pub use evidence::EvidenceAssembler;
pub use retriever::HybridRetriever;
pub use route::RouteClassifier;
pub use summary::SummaryExtractor;
pub use topic::TopicClassifier;

const MISSING_RATIONALE: &str = "(no rationale given)";

/// Awaits `fut` for at most `limit`; expiry is reported as [`Error::Timeout`].
pub(crate) async fn bounded<T>(
    service: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            service: service.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

/// Rationales are for logs only, but they must never be blank.
pub(crate) fn ensure_rationale(stage: &str, rationale: &mut String) {
    if rationale.trim().is_empty() {
        tracing::warn!(stage, "model omitted its rationale");
        *rationale = MISSING_RATIONALE.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_reports_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        };
        let err = bounded("qdrant", Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref service, after_ms: 10 } if service == "qdrant"));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn bounded_passes_through() {
        assert_eq!(bounded("llm", Duration::from_secs(1), async { Ok(7) }).await.unwrap(), 7);
    }

    #[test]
    fn blank_rationale_replaced() {
        let mut r = "  ".to_string();
        ensure_rationale("route", &mut r);
        assert_eq!(r, MISSING_RATIONALE);
    }
}

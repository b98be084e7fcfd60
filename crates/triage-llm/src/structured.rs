use serde::de::DeserializeOwned;
use tracing::warn;

use triage_core::traits::{ChatModel, ChatRequest};
use triage_core::{Error, Result};

/// Runs one completion and coerces the text into `T`.
///
/// Transport failures pass through unchanged; text that does not decode as
/// `T` becomes [`Error::Schema`] tagged with `stage`.
pub async fn generate_structured<T>(
    model: &dyn ChatModel,
    request: ChatRequest,
    stage: &str,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let raw = model.complete(request).await?;
    parse_structured(&raw, stage)
}

pub fn parse_structured<T: DeserializeOwned>(raw: &str, stage: &str) -> Result<T> {
    let text = strip_code_fence(raw);
    serde_json::from_str(text).map_err(|e| {
        warn!(stage, error = %e, "model output did not match schema");
        Error::schema(stage, e.to_string())
    })
}

/// Models sometimes wrap JSON in a markdown fence even when asked not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flags {
        feedbacks: bool,
        bugs: bool,
    }

    #[test]
    fn parses_bare_and_fenced_json() {
        let want = Flags { feedbacks: true, bugs: false };
        let bare = r#"{"feedbacks":true,"bugs":false}"#;
        assert_eq!(parse_structured::<Flags>(bare, "topic").unwrap(), want);
        let fenced = "```json\n{\"feedbacks\": true, \"bugs\": false}\n```";
        assert_eq!(parse_structured::<Flags>(fenced, "topic").unwrap(), want);
    }

    #[test]
    fn wrong_shape_is_schema_error() {
        let err = parse_structured::<Flags>(r#"{"feedbacks":"maybe"}"#, "topic").unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn prose_is_schema_error() {
        let parsed = parse_structured::<Flags>("I think both.", "topic");
        assert!(matches!(parsed, Err(Error::Schema { .. })));
    }

    struct Canned(Result<String>);

    #[async_trait::async_trait]
    impl ChatModel for Canned {
        async fn complete(&self, _request: ChatRequest) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::upstream("canned", "connection refused")),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_not_rewritten() {
        let model = Canned(Err(Error::upstream("canned", "")));
        let err =
            generate_structured::<Flags>(&model, ChatRequest::new("q"), "topic").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn generates_typed_value() {
        let model = Canned(Ok(r#"{"feedbacks":false,"bugs":true}"#.into()));
        let flags: Flags =
            generate_structured(&model, ChatRequest::new("q"), "topic").await.unwrap();
        assert!(flags.bugs && !flags.feedbacks);
    }
}

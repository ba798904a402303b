//! Short supportive commentary on a journal entry, produced by an external
//! generative model. Adapters never retry; callers decide what a failure means.

use async_trait::async_trait;
use thiserror::Error;

pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum InsightError {
    /// Transport failure or non-2xx status.
    #[error("{0}")]
    Unavailable(String),
    /// Response did not contain `candidates[0].content.parts[0].text`.
    #[error("{0}")]
    Malformed(String),
}

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn analyze(&self, content: &str) -> Result<String, InsightError>;
}

pub fn build_prompt(content: &str) -> String {
    format!(
        "Analyze the following journal entry and provide a brief insight (1-2 sentences) \
         about the user's mood or sentiment. Keep it simple and supportive.\n\
         Journal: {content}"
    )
}

/// Used when no API key is configured.
pub struct DisabledInsights;

#[async_trait]
impl InsightGenerator for DisabledInsights {
    async fn analyze(&self, _content: &str) -> Result<String, InsightError> {
        Err(InsightError::Unavailable(
            "insight generator is not configured".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_entry_on_last_line() {
        let prompt = build_prompt("Feeling good today");
        assert!(prompt.starts_with("Analyze the following journal entry"));
        assert!(prompt.ends_with("\nJournal: Feeling good today"));
    }

    #[tokio::test]
    async fn disabled_generator_reports_unavailable() {
        let err = DisabledInsights.analyze("x").await.unwrap_err();
        assert!(matches!(err, InsightError::Unavailable(_)));
    }
}

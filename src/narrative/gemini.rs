//! Gemini-powered narrator
//!
//! Sends the classified forecast table to Gemini and asks for a short
//! business-friendly liquidity summary.

use crate::error::CollaboratorError;
use crate::gemini::GeminiClient;
use crate::models::{ClassifiedMonth, RiskCounts};
use crate::narrative::{render_table, Narrator};
use async_trait::async_trait;

const SYSTEM_PROMPT: &str = "You are an expert financial advisor for small businesses.";

pub struct GeminiNarrator {
    client: GeminiClient,
}

impl GeminiNarrator {
    pub fn new(api_key: String, model: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: GeminiClient::new(api_key, model)?,
        })
    }

    pub fn from_client(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Build the summarization prompt
    fn build_prompt(months: &[ClassifiedMonth]) -> String {
        let counts = RiskCounts::tally(months);

        format!(
            r#"You are a financial forecasting assistant.
Analyze this {}-month SMB cash flow forecast:

{}
Risk tally: {} critical, {} warning, {} safe.

Write a short, professional summary covering:
- Risk trends (Critical/Warning/Safe)
- Main reasons for risks
- Actionable advice for improving liquidity
Keep it clear and business-friendly."#,
            months.len(),
            render_table(months),
            counts.critical,
            counts.warning,
            counts.safe,
        )
    }
}

#[async_trait]
impl Narrator for GeminiNarrator {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn narrate(&self, months: &[ClassifiedMonth]) -> Result<String, CollaboratorError> {
        let prompt = Self::build_prompt(months);
        self.client.generate(SYSTEM_PROMPT, &prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::DEFAULT_MODEL;
    use crate::models::RiskLevel;
    use crate::narrative::tests::classified;
    use axum::{routing::post, Json, Router};

    #[test]
    fn test_prompt_contains_table_and_tally() {
        let months = vec![
            classified(1, 4000, RiskLevel::Safe),
            classified(2, -300, RiskLevel::Critical),
            classified(3, 200, RiskLevel::Warning),
        ];
        let prompt = GeminiNarrator::build_prompt(&months);

        assert!(prompt.contains("Analyze this 3-month SMB cash flow forecast"));
        assert!(prompt.contains("| 2025-02 | -300.00 |"));
        assert!(prompt.contains("Risk tally: 1 critical, 1 warning, 1 safe."));
    }

    #[tokio::test]
    async fn test_narrate_against_stub_endpoint() {
        let router = Router::new().route(
            "/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
                let text = if prompt.contains("Critical") {
                    "February needs attention."
                } else {
                    "All clear."
                };
                Json(serde_json::json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": text }] },
                        "finishReason": "STOP"
                    }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = GeminiClient::new("test-key".to_string(), DEFAULT_MODEL)
            .unwrap()
            .with_endpoint(format!("http://{}/generate", addr));
        let narrator = GeminiNarrator::from_client(client);

        let text = narrator
            .narrate(&[classified(2, -300, RiskLevel::Critical)])
            .await
            .unwrap();
        assert_eq!(text, "February needs attention.");
    }
}

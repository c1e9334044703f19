//! OpenAI-compatible chat-completions classifier.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::Category;
use tracing::debug;

use crate::classifier::{
    ClassificationContext, ClassificationError, ExternalClassification, ExternalClassifier,
    parse_classification,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are a financial categorization assistant for Indian users. \
Always respond with valid JSON only.";

#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiClassifier {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature: 0.3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Bound every HTTP request. The orchestrator applies its own timeout as well.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, ClassificationError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassificationError::NotConfigured(e.to_string()))?;
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

pub fn build_prompt(text: &str, context: &ClassificationContext) -> String {
    let categories = Category::ALL
        .iter()
        .filter(|c| **c != Category::Uncategorized)
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!("Categorize this expense transaction for an Indian user:\nMerchant: {}\n", context.merchant);
    if let Some(amount) = context.amount {
        prompt.push_str(&format!("Amount: ₹{amount}\n"));
    }
    match &context.raw_message {
        Some(sms) => prompt.push_str(&format!("SMS: {sms}\n")),
        None => prompt.push_str(&format!("Description: {text}\n")),
    }
    prompt.push_str(&format!(
        "\nReturn ONLY a JSON object with:\n\
{{\n  \"category\": \"one of: {categories}\",\n  \"confidence\": 0.0-1.0,\n  \
\"merchant\": \"normalized merchant name\",\n  \"explanation\": \"brief reason for categorization\"\n}}\n\n\
Consider Indian context: UPI payments, common Indian merchants, local services."
    ));
    prompt
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

#[async_trait]
impl ExternalClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> Result<ExternalClassification, ClassificationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ClassificationError::NotConfigured("missing OpenAI API key".to_string()))?;

        let prompt = build_prompt(text, context);
        let body = Req {
            model: &self.model,
            messages: vec![
                Msg { role: "system", content: SYSTEM_PROMPT },
                Msg { role: "user", content: &prompt },
            ],
            temperature: self.temperature,
            max_tokens: 200,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassificationError::Unavailable(format!("openai request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(ClassificationError::Unavailable(format!("openai error: {status} {txt}")));
        }

        let out: Resp = resp
            .json()
            .await
            .map_err(|e| ClassificationError::MalformedResponse(format!("parse openai response: {e}")))?;

        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ClassificationError::MalformedResponse("empty completion".to_string()))?;

        debug!(model = %self.model, reply = %content.trim(), "openai classification reply");
        parse_classification(&content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_prompt_mentions_fields_and_categories() {
        let ctx = ClassificationContext {
            merchant: "SWIGGY".to_string(),
            amount: Some(Decimal::new(45000, 2)),
            raw_message: Some("Rs.450.00 debited for SWIGGY on 12-05".to_string()),
        };
        let p = build_prompt("SWIGGY Rs.450.00 debited for SWIGGY on 12-05", &ctx);
        assert!(p.contains("Merchant: SWIGGY"));
        assert!(p.contains("Amount: ₹450.00"));
        assert!(p.contains("SMS: Rs.450.00 debited"));
        assert!(p.contains("Food & Dining"));
        assert!(p.contains("Personal Care"));
        assert!(!p.contains("Uncategorized"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let c = OpenAiClassifier::new(Some("  ".to_string()), "gpt-4o-mini");
        assert!(!c.is_configured());
        let err = c.classify("x", &ClassificationContext::default()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let c = OpenAiClassifier::new(Some("sk-test".to_string()), "gpt-4o-mini")
            .with_base_url("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2))
            .unwrap();
        let err = c.classify("x", &ClassificationContext::default()).await.unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");
    }
}

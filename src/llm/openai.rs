//! OpenAI-compatible chat completion client (Nebius AI Studio, LM Studio, vLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionProvider, CompletionRequest};
use crate::config::GenerationConfig;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(config: &GenerationConfig, api_key: Option<String>) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, request: CompletionRequest) -> ServiceResult<String> {
        let mut body = json!({
            "model": request.model,
            "messages": request.wire_messages(),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(p) = request.top_p {
                obj.insert("top_p".to_string(), json!(p));
            }
        }

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            temperature = request.temperature,
            "sending completion request"
        );

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ServiceError::Generation(format!(
                "completion endpoint returned HTTP {status}: {text}"
            )));
        }

        let payload: CompletionResponse = res.json().await?;
        let choice = payload.choices.into_iter().next().ok_or_else(|| {
            ServiceError::Generation("completion response contained no choices".into())
        })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_provider(base_url: &str, api_key: Option<&str>) -> OpenAiCompatProvider {
        let config = GenerationConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        OpenAiCompatProvider::new(&config, api_key.map(str::to_string)).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("test-model", "system persona")
            .with_message(ChatMessage::user("where are my keys?"))
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "temperature": 0.0,
                "messages": [{"role": "system", "content": "system persona"}, {"role": "user", "content": "where are my keys?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "On the table."}}]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri(), Some("sk-test"));
        let text = provider.complete(request()).await.unwrap();
        assert_eq!(text, "On the table.");
    }

    #[tokio::test]
    async fn optional_sampling_params_are_sent_when_set() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri(), None);
        let mut req = request();
        req.max_tokens = Some(64);
        req.top_p = Some(0.5);
        assert_eq!(provider.complete(req).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn http_error_surfaces_as_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri(), None);
        let err = provider.complete(request()).await.unwrap_err();
        match err {
            ServiceError::Generation(msg) => assert!(msg.contains("503"), "got: {msg}"),
            other => panic!("expected Generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri(), None);
        assert!(matches!(
            provider.complete(request()).await,
            Err(ServiceError::Generation(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let provider = test_provider("http://localhost:1234/v1/", None);
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1/chat/completions");
    }
}

//! Embedding and chat-completion providers.
//!
//! The assistant and the knowledge index only see the [`Embedder`] and
//! [`ChatModel`] traits; the OpenAI-compatible clients below are the
//! production implementations.

use crate::config::Settings;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: usize = 3;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| CoreError::Provider("no embedding returned for query".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

fn auth_headers(api_key: &str) -> Result<HeaderMap> {
    if api_key.trim().is_empty() {
        return Err(CoreError::Config("missing OpenAI API key".to_string()));
    }
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth).map_err(|_| CoreError::Config("invalid OpenAI API key".to_string()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn build_client(api_key: &str) -> Result<Client> {
    Ok(Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .default_headers(auth_headers(api_key)?)
        .build()?)
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    Duration::from_millis(500 * (1 << attempt.min(5)))
}

/// POST `body` to `endpoint`, retrying rate limits and server errors.
async fn post_json<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
    client: &Client,
    endpoint: &str,
    body: &B,
    retry_delay: impl Fn(usize) -> Duration,
) -> Result<R> {
    let mut attempt = 0;
    loop {
        let response = client.post(endpoint).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        if should_retry(status) && attempt + 1 < MAX_RETRIES {
            attempt += 1;
            warn!("{} returned {}, retrying (attempt {})", endpoint, status, attempt + 1);
            tokio::time::sleep(retry_delay(attempt)).await;
            continue;
        }
        return Err(CoreError::Provider(format!("{} returned {}: {}", endpoint, status, text)));
    }
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
    retry_base: Option<Duration>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: &str, batch_size: usize) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(CoreError::Config("missing embedding model name".to_string()));
        }
        Ok(Self {
            client: build_client(api_key)?,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            batch_size: batch_size.max(1),
            retry_base: None,
        })
    }

    /// Fixed delay between retries instead of exponential backoff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base = Some(delay);
        self
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let retry_base = self.retry_base;
        let mut parsed: EmbeddingResponse = post_json(&self.client, &self.endpoint, &request, |attempt| {
            retry_base.unwrap_or_else(|| retry_backoff(attempt))
        })
        .await?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(CoreError::Provider(format!(
                "embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.batch_size) {
            debug!("Embedding batch of {} inputs", batch.len());
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(api_key)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };
        let parsed: ChatResponse = post_json(&self.client, &self.endpoint, &body, retry_backoff).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CoreError::Provider("chat completion returned no choices".to_string()))
    }
}

/// Embedder configured from `settings` against the OpenAI-compatible API.
pub fn openai_embedder(settings: &Settings, api_key: &str) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(OpenAiEmbedder::new(
        api_key,
        &settings.openai_base_url,
        &settings.embedding_model,
        settings.embed_batch_size,
    )?))
}

pub fn openai_chat(settings: &Settings, api_key: &str) -> Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAiChat::new(api_key, &settings.openai_base_url, &settings.chat_model)?))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    #[tokio::test]
    async fn test_embeddings_are_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("sk-test", &server.uri(), "text-embedding-3-small", 16).unwrap();
        let vectors = embedder.embed(&["opt".to_string(), "cpt".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embeddings_retry_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5]}]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("sk-test", &server.uri(), "m", 16)
            .unwrap()
            .with_retry_delay(Duration::ZERO);
        let vector = embedder.embed_query("What is OPT?").await.unwrap();
        assert_eq!(vector, vec![0.5]);
    }

    #[tokio::test]
    async fn test_chat_sends_temperature_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-3.5-turbo", "temperature": 0.3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Relevance: yes"}}]
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("sk-test", &server.uri(), "gpt-3.5-turbo").unwrap();
        let answer = chat
            .complete(&CompletionRequest::new("Is this about OPT?", 0.3))
            .await
            .unwrap();
        assert_eq!(answer, "Relevance: yes");
    }

    #[tokio::test]
    async fn test_chat_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("sk-test", &server.uri(), "gpt-3.5-turbo").unwrap();
        let err = chat.complete(&CompletionRequest::new("hi", 0.7)).await.unwrap_err();
        assert!(matches!(err, CoreError::Provider(_)));
    }

    #[test]
    fn test_blank_key_is_config_error() {
        assert!(matches!(
            OpenAiChat::new(" ", "https://api.openai.com/v1", "gpt-3.5-turbo"),
            Err(CoreError::Config(_))
        ));
    }
}

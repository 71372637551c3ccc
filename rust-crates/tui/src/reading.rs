use crate::{
    config::{
        ApiKey,
        ReadingConfig,
    },
    error::ReadingError,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use reqwest::header::ACCEPT;
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use tarot_contract::DrawResult;
use tracing::{
    debug,
    info,
};

/// What the generator is asked about: the user's question and the card drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadingRequest {
    pub question: String,
    pub card: String,
    pub orientation: String,
}

impl ReadingRequest {
    pub fn new(question: impl Into<String>, draw: &DrawResult) -> Self {
        Self {
            question: question.into(),
            card: draw.card.clone(),
            orientation: draw.orientation.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reading {
    pub text: String,
}

pub fn build_prompt(request: &ReadingRequest) -> String {
    format!(
        "You are a Major Arcana Tarot reader. Client asks this question “{}” and draws the “{}” card in “{}” position. Interpret to the client in no more than 150 words.",
        request.question, request.card, request.orientation
    )
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// A chat-completion endpoint.
pub trait CompletionApi {
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, ReadingError>>;
}

/// HTTPS client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    endpoint: String,
    api_key: ApiKey,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(endpoint: impl Into<String>, api_key: ApiKey, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build HTTP client for completions")?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            http,
        })
    }
}

impl CompletionApi for CompletionClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ReadingError> {
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ReadingError::from_http("completion request failed", e))?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            debug!(%status, %body, "completion endpoint rejected request");
            return Err(ReadingError::Generation(format!(
                "completion endpoint responded with {status}"
            )));
        }
        res.json()
            .await
            .map_err(|e| ReadingError::decode("completion response", e))
    }
}

/// Turns a reading request into prose. Output varies between calls for the
/// same input.
pub struct ReadingGenerator<C> {
    api: C,
    model: String,
    max_tokens: Option<u32>,
}

impl<C: CompletionApi> ReadingGenerator<C> {
    pub fn new(api: C, model: impl Into<String>, max_tokens: Option<u32>) -> Self {
        Self {
            api,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(api: C, config: &ReadingConfig) -> Self {
        Self::new(api, config.model.clone(), config.max_tokens)
    }

    pub fn chat_request(&self, request: &ReadingRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(request),
            }],
            max_tokens: self.max_tokens,
        }
    }

    pub async fn generate(&self, request: &ReadingRequest) -> Result<Reading, ReadingError> {
        info!(card = %request.card, orientation = %request.orientation, model = %self.model, "requesting reading");
        let response = self.api.complete(&self.chat_request(request)).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ReadingError::Generation("completion returned no text".to_string())
            })?;
        Ok(Reading { text })
    }
}

use anyhow::{Context, Result};
use aq_twin::fetch::{HttpClient, post_json};
use aq_twin::scenario::TextGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// [`TextGenerator`] backed by `POST {base_url}/chat/completions`.
pub struct ChatCompletionGenerator<C> {
    http: C,
    base_url: String,
    model: String,
}

impl<C: HttpClient> ChatCompletionGenerator<C> {
    pub fn new(http: C, base_url: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn request_body<'a>(model: &'a str, prompt: &'a str, max_length: usize) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        max_tokens: max_length,
        temperature: 0.0,
    }
}

fn first_choice(resp: ChatResponse) -> Result<String> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("completion response has no message content")
}

#[async_trait]
impl<C: HttpClient> TextGenerator for ChatCompletionGenerator<C> {
    #[tracing::instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, max_length: usize) -> Result<String> {
        let body = request_body(&self.model, prompt, max_length);
        let resp: ChatResponse = post_json(&self.http, &self.endpoint(), &body).await?;
        let text = first_choice(resp)?;
        debug!(chars = text.len(), "Completion received");
        Ok(text)
    }
}

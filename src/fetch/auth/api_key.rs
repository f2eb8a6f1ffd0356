use crate::fetch::client::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that sends a credential in a request header.
pub struct ApiKey<C> {
    pub inner: C,
    pub header_name: String,
    pub key: String,
}

impl<C> ApiKey<C> {
    /// `Authorization: Bearer <key>`, as expected by OpenAI-compatible servers.
    pub fn bearer(inner: C, key: &str) -> Self {
        Self {
            inner,
            header_name: "Authorization".to_string(),
            key: format!("Bearer {key}"),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> Result<reqwest::Response> {
        let name = HeaderName::from_bytes(self.header_name.as_bytes())
            .with_context(|| format!("invalid header name '{}'", self.header_name))?;
        let mut value =
            HeaderValue::from_str(&self.key).context("API key is not a valid header value")?;
        value.set_sensitive(true);

        req.headers_mut().insert(name, value);
        self.inner.execute(req).await
    }
}

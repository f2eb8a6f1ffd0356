use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends a credential as a query parameter,
/// e.g. the `apikey` parameter of the commercial Open-Meteo endpoints.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> Result<reqwest::Response> {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
        self.inner.execute(req).await
    }
}

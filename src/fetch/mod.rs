//! HTTP plumbing shared by the remote data sources.
//!
//! [`HttpClient`] is the seam the Open-Meteo and text generator clients are
//! written against; authentication is layered on with the wrappers in
//! [`auth`].

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Sends `req` and fails on any non-success status, keeping the body in the
/// error message.
pub async fn send_checked<C: HttpClient + ?Sized>(
    client: &C,
    req: reqwest::Request,
) -> Result<reqwest::Response> {
    let url = req.url().clone();
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("request to {} failed with status {status}: {body}", url.path());
    }
    Ok(resp)
}

/// GETs `url` with `query` appended and decodes the JSON body.
pub async fn get_json<C, T>(client: &C, url: &str, query: &[(&str, String)]) -> Result<T>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    let mut url: reqwest::Url = url.parse().with_context(|| format!("invalid url '{url}'"))?;
    url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));

    let req = reqwest::Request::new(reqwest::Method::GET, url);
    let resp = send_checked(client, req).await?;
    resp.json().await.context("failed to decode JSON response")
}

/// POSTs `body` as JSON to `url` and decodes the JSON reply.
pub async fn post_json<C, B, T>(client: &C, url: &str, body: &B) -> Result<T>
where
    C: HttpClient + ?Sized,
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut req = reqwest::Request::new(
        reqwest::Method::POST,
        url.parse().with_context(|| format!("invalid url '{url}'"))?,
    );
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = send_checked(client, req).await?;
    resp.json().await.context("failed to decode JSON response")
}

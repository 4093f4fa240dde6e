//! Command implementations and shared request helpers.

pub mod auth;
pub mod notes;
pub mod smoke;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Output that can also be printed for people.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Build an HTTP client, attaching the bearer token when given.
pub fn build_client(token: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("token contains characters not allowed in a header")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("failed to build HTTP client")
}

/// Send a request and decode a JSON response body.
pub async fn make_request<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = send(request).await?;
    response
        .json::<T>()
        .await
        .context("failed to decode response body")
}

/// Send a request whose success response has no body.
pub async fn make_empty_request(request: reqwest::RequestBuilder) -> Result<()> {
    send(request).await.map(|_| ())
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request.send().await.context("request failed")?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => bail!("{} ({}): {}", status, body.error, body.message),
        Err(_) => bail!("{}: {}", status, text),
    }
}

/// Print `value` as pretty JSON or in human form.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

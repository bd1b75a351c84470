//! Shared JSON-over-HTTP plumbing for remote providers.
//!
//! Maps transport outcomes onto [`UpstreamError`]:
//! - HTTP 429 → `RateLimited` (retried by the gate)
//! - other non-2xx → `Status`
//! - connection/timeout failures → `Transport`
//! - unparseable body → `Malformed`

use std::time::Duration;

use anyhow::Result;
use ragcite_core::error::UpstreamError;
use serde_json::Value;

pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read a credential from the environment.
pub fn env_key(service: &str, env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(UpstreamError::MissingCredential {
            service: service.to_string(),
            env_var: env_var.to_string(),
        }
        .into()),
    }
}

/// POST `body` as JSON and return the parsed JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<Value> {
    let mut req = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body);
    if let Some(token) = bearer {
        req = req.header("Authorization", format!("Bearer {}", token));
    }

    let response = req.send().await.map_err(|e| UpstreamError::Transport {
        service: service.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        let err = if status.as_u16() == 429 {
            UpstreamError::RateLimited {
                service: service.to_string(),
                message: body_text,
            }
        } else {
            UpstreamError::Status {
                service: service.to_string(),
                status: status.as_u16(),
                body: body_text,
            }
        };
        return Err(err.into());
    }

    let json = response.json::<Value>().await.map_err(|e| UpstreamError::Malformed {
        service: service.to_string(),
        message: e.to_string(),
    })?;
    Ok(json)
}

pub fn malformed(service: &str, message: impl Into<String>) -> anyhow::Error {
    UpstreamError::Malformed {
        service: service.to_string(),
        message: message.into(),
    }
    .into()
}

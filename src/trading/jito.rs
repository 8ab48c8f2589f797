//! Jito block engine relay
//!
//! Speaks the block engine JSON-RPC API: `sendBundle` to submit and
//! `getInflightBundleStatuses` to follow a bundle for the ~5 minutes the
//! engine keeps it in flight.
//!
//! HTTP 429 and 5xx are transport failures (retryable); a JSON-RPC error
//! object is the relay's verdict on the bundle itself.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::bundle::Bundle;
use crate::config::JitoConfig;
use crate::error::{Error, Result};

const BUNDLES_PATH: &str = "/api/v1/bundles";
const INFLIGHT_STATUS_PATH: &str = "/api/v1/getInflightBundleStatuses";

/// Relay answer to a bundle submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResponse {
    Accepted { bundle_id: String },
    Rejected { reason: String },
}

/// Jito bundle status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleStatus {
    /// Bundle submitted and pending
    Pending,
    /// Bundle landed on-chain
    Landed { slot: Option<u64> },
    /// Bundle failed
    Failed(String),
    /// Not known to the relay (yet)
    Unknown,
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send_bundle(&self, endpoint: &str, bundle: &Bundle) -> Result<RelayResponse>;

    async fn bundle_status(&self, endpoint: &str, bundle_id: &str) -> Result<BundleStatus>;
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct InflightStatuses {
    value: Vec<InflightStatus>,
}

#[derive(Debug, Deserialize)]
struct InflightStatus {
    status: String,
    #[serde(default)]
    landed_slot: Option<u64>,
}

/// Jito client for bundle submission
pub struct JitoRelay {
    http: reqwest::Client,
    uuid: Option<String>,
}

impl JitoRelay {
    pub fn new(config: &JitoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            uuid: config.uuid.clone(),
        })
    }

    async fn post(&self, url: String, body: Value) -> Result<(StatusCode, String)> {
        let mut request = self.http.post(&url).json(&body);
        if let Some(uuid) = &self.uuid {
            request = request.header("x-jito-auth", uuid);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(format!("{} returned 429: {}", url, text)));
        }
        if status.is_server_error() {
            return Err(Error::RelayTransport(format!("{} returned {}: {}", url, status, text)));
        }

        Ok((status, text))
    }
}

#[async_trait]
impl RelayTransport for JitoRelay {
    async fn send_bundle(&self, endpoint: &str, bundle: &Bundle) -> Result<RelayResponse> {
        let encoded = bundle.encode()?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [encoded, { "encoding": "base64" }],
        });

        info!("Submitting bundle {} ({} transactions) to {}", bundle.id(), bundle.len(), endpoint);
        let (status, text) = self.post(format!("{}{}", endpoint, BUNDLES_PATH), body).await?;
        parse_send_response(status, &text)
    }

    async fn bundle_status(&self, endpoint: &str, bundle_id: &str) -> Result<BundleStatus> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getInflightBundleStatuses",
            "params": [[bundle_id]],
        });

        debug!("Checking inflight status for bundle {}", bundle_id);
        let (status, text) = self
            .post(format!("{}{}", endpoint, INFLIGHT_STATUS_PATH), body)
            .await?;
        parse_status_response(status, &text)
    }
}

fn parse_send_response(status: StatusCode, text: &str) -> Result<RelayResponse> {
    let envelope: RpcEnvelope<String> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Ok(RelayResponse::Rejected {
                reason: format!("HTTP {}: {}", status, text),
            })
        }
    };

    match (envelope.result, envelope.error) {
        (_, Some(error)) => Ok(RelayResponse::Rejected {
            reason: format!("{} (code {})", error.message, error.code),
        }),
        (Some(bundle_id), None) => Ok(RelayResponse::Accepted { bundle_id }),
        (None, None) => Err(Error::Serialization(format!(
            "sendBundle response has neither result nor error: {}",
            text
        ))),
    }
}

fn parse_status_response(status: StatusCode, text: &str) -> Result<BundleStatus> {
    if !status.is_success() {
        return Err(Error::RelayTransport(format!("status query returned {}: {}", status, text)));
    }

    let envelope: RpcEnvelope<InflightStatuses> = serde_json::from_str(text)?;
    if let Some(error) = envelope.error {
        return Err(Error::RelayTransport(format!(
            "status query failed: {} (code {})",
            error.message, error.code
        )));
    }

    let Some(entry) = envelope.result.and_then(|r| r.value.into_iter().next()) else {
        return Ok(BundleStatus::Unknown);
    };

    Ok(match entry.status.as_str() {
        "Landed" => BundleStatus::Landed {
            slot: entry.landed_slot,
        },
        "Pending" => BundleStatus::Pending,
        "Failed" => BundleStatus::Failed("bundle failed in the block engine auction".to_string()),
        "Invalid" => BundleStatus::Failed("bundle is invalid or expired".to_string()),
        _ => BundleStatus::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_accepted() {
        let text = r#"{"jsonrpc":"2.0","result":"2id3YC2jK9G5Wo2phDx4gJVAew8DcY5NAojnVuao8rkxwPYPe8cSwE5GzhEgJA2y8fVjDEo6iR6ykBvDxrTQrtpb","id":1}"#;
        let response = parse_send_response(StatusCode::OK, text).unwrap();
        assert!(matches!(response, RelayResponse::Accepted { bundle_id } if bundle_id.starts_with("2id3")));
    }

    #[test]
    fn test_send_rejected_by_json_rpc_error() {
        let text = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bundle contains an expired blockhash"},"id":1}"#;
        let response = parse_send_response(StatusCode::BAD_REQUEST, text).unwrap();
        assert!(matches!(response, RelayResponse::Rejected { reason } if reason.contains("expired blockhash")));
    }

    #[test]
    fn test_status_landed() {
        let text = r#"{"jsonrpc":"2.0","result":{"context":{"slot":280999028},"value":[{"bundle_id":"b","status":"Landed","landed_slot":280999027}]},"id":1}"#;
        let status = parse_status_response(StatusCode::OK, text).unwrap();
        assert_eq!(status, BundleStatus::Landed { slot: Some(280999027) });
    }

    #[test]
    fn test_status_invalid_is_terminal() {
        let text = r#"{"jsonrpc":"2.0","result":{"context":{"slot":1},"value":[{"bundle_id":"b","status":"Invalid","landed_slot":null}]},"id":1}"#;
        assert!(matches!(
            parse_status_response(StatusCode::OK, text).unwrap(),
            BundleStatus::Failed(_)
        ));
    }

    #[test]
    fn test_status_empty_value_is_unknown() {
        let text = r#"{"jsonrpc":"2.0","result":{"context":{"slot":1},"value":[]},"id":1}"#;
        assert_eq!(parse_status_response(StatusCode::OK, text).unwrap(), BundleStatus::Unknown);
    }

    #[test]
    fn test_status_failed() {
        let text = r#"{"jsonrpc":"2.0","result":{"context":{"slot":1},"value":[{"bundle_id":"b","status":"Failed","landed_slot":null}]},"id":1}"#;
        assert!(matches!(
            parse_status_response(StatusCode::OK, text).unwrap(),
            BundleStatus::Failed(_)
        ));
    }
}

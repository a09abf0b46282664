//! Remote key-value backend speaking the Upstash Redis REST protocol
//!
//! Each operation is one `POST` of a Redis command as a JSON array, e.g.
//! `["SET", "misses", "<json>", "NX", "PX", "5000"]`, authenticated with a
//! bearer token. Replies are `{"result": ...}` or `{"error": "..."}`.
//! Values are stored as JSON text so any client can read them back.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::{KvStore, StoreError, StoreResult};

/// Per-request timeout for the REST endpoint
pub const REST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Client for an Upstash-compatible Redis REST endpoint
#[derive(Clone)]
pub struct RestKv {
    client: Client,
    url: String,
    token: String,
}

impl RestKv {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(REST_TIMEOUT)
            .connect_timeout(REST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn command(&self, args: Value) -> StoreResult<Value> {
        let op = args.get(0).and_then(Value::as_str).unwrap_or("?").to_string();

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let reply = response.json::<RestReply>().await;

        match (status.is_success(), reply) {
            (_, Ok(RestReply { error: Some(e), .. })) => {
                Err(StoreError::Backend(format!("{op} failed: {e}")))
            }
            (true, Ok(reply)) => {
                debug!(op = %op, "KV command completed");
                Ok(reply.result)
            }
            (false, _) => Err(StoreError::Backend(format!(
                "{op} failed: KV service returned {status}"
            ))),
            (true, Err(e)) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for RestKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestKv").field("url", &self.url).finish()
    }
}

#[async_trait]
impl KvStore for RestKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(serde_json::from_str(&text)?)),
            other => Err(StoreError::Serialization(format!(
                "unexpected GET reply for {key}: {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let text = serde_json::to_string(&value)?;
        self.command(json!(["SET", key, text])).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.command(json!(["DEL", key])).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<bool> {
        let text = serde_json::to_string(&value)?;
        let ttl_ms = ttl.as_millis().to_string();
        let reply = self
            .command(json!(["SET", key, text, "NX", "PX", ttl_ms]))
            .await?;
        Ok(reply.as_str() == Some("OK"))
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::domain::repositories::event_publisher::EventPublisher;

const KAFKA_BINARY_CONTENT_TYPE: &str = "application/vnd.kafka.binary.v2+json";
const KAFKA_ACCEPT: &str = "application/vnd.kafka.v2+json";

/// Publishes messages through a Kafka REST proxy (v2 API, binary embedded
/// format).
pub struct KafkaRestPublisher {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ProduceRequest {
    records: Vec<ProduceRecord>,
}

#[derive(Debug, Serialize)]
struct ProduceRecord {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

#[derive(Debug, Deserialize)]
struct ProduceOffset {
    partition: Option<i32>,
    offset: Option<i64>,
    error_code: Option<i32>,
    error: Option<String>,
}

impl KafkaRestPublisher {
    pub fn new(base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build kafka rest http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn produce_request(message: &[u8]) -> ProduceRequest {
        ProduceRequest {
            records: vec![ProduceRecord {
                value: STANDARD.encode(message),
            }],
        }
    }

    async fn ensure_success(resp: reqwest::Response, topic: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        error!(
            status = %status,
            topic = %topic,
            response_body = %body,
            "payments: kafka rest produce failed"
        );

        anyhow::bail!("kafka rest produce to {} failed (status {})", topic, status);
    }
}

#[async_trait]
impl EventPublisher for KafkaRestPublisher {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()> {
        let url = format!("{}/topics/{}", self.base_url, topic);

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, KAFKA_BINARY_CONTENT_TYPE)
            .header(ACCEPT, KAFKA_ACCEPT)
            .json(&Self::produce_request(&message))
            .send()
            .await
            .with_context(|| format!("failed to reach kafka rest proxy for topic {topic}"))?;

        let resp = Self::ensure_success(resp, topic).await?;
        let produced: ProduceResponse = resp
            .json()
            .await
            .context("failed to decode kafka rest produce response")?;

        if let Some(rejected) = produced.offsets.iter().find(|o| o.error_code.is_some()) {
            anyhow::bail!(
                "kafka rest proxy rejected record for {} (error_code {:?}): {}",
                topic,
                rejected.error_code,
                rejected.error.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(first) = produced.offsets.first() {
            debug!(
                topic = %topic,
                partition = ?first.partition,
                offset = ?first.offset,
                "payments: event produced"
            );
        }

        Ok(())
    }
}

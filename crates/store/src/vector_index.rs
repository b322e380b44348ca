use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::retry::RetryPolicy;

/// One nearest-neighbor match from the vector index. The payload fields
/// are written by the node embedding job: `node_id` is the canonical node
/// key, `node_label` the graph label, `text` the embedded source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub node_id: String,
    pub node_label: String,
    pub text: String,
    pub score: f32,
}

/// Qdrant REST client restricted to read-only nearest-neighbor search over
/// the pre-computed node embeddings.
pub struct VectorIndexClient {
    base_url: String,
    collection_name: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl VectorIndexClient {
    pub fn new(base_url: String, collection_name: String) -> Self {
        Self {
            base_url,
            collection_name,
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// `nearestNeighbors(vector, labelFilter, k)`. An empty label set means
    /// no label restriction. Transient failures are retried before the
    /// error surfaces to the pipeline.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        labels: &[&str],
        k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.retry
            .retry("vector_search", || self.search_once(&vector, labels, k))
            .await
    }

    async fn search_once(
        &self,
        vector: &[f32],
        labels: &[&str],
        k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection_name
        );

        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if !labels.is_empty() {
            body["filter"] = json!({
                "must": [{ "key": "node_label", "match": { "any": labels } }]
            });
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send search request to Qdrant")?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Qdrant search failed: {}", error_text);
        }

        let result: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Qdrant response")?;

        let points = result["result"]
            .as_array()
            .context("Invalid Qdrant response format")?;

        let mut parsed = Vec::new();
        for point in points {
            let score = point["score"].as_f64().unwrap_or(0.0) as f32;
            let payload = point["payload"].as_object().context("Missing payload")?;

            let field = |name: &str| {
                payload
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };

            parsed.push(ScoredPoint {
                node_id: field("node_id"),
                node_label: field("node_label"),
                text: field("text"),
                score,
            });
        }

        Ok(parsed)
    }

    /// Reachability probe used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .context("Failed to reach Qdrant")?;
        if !response.status().is_success() {
            anyhow::bail!("Qdrant returned status {}", response.status());
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fusion::EvidenceItem;

pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Generation failures must stay distinguishable so the pipeline can report
/// a timeout separately from an unreachable service. Both degrade to the
/// "generation unavailable" outcome; neither aborts the query.
#[derive(Debug)]
pub enum GenerationError {
    TimedOut(u64),
    Unavailable(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::TimedOut(secs) => {
                write!(f, "generation timed out after {secs}s")
            }
            GenerationError::Unavailable(reason) => {
                write!(f, "generation unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for GenerationError {}

#[derive(Clone)]
pub struct QueryLLM {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl QueryLLM {
    pub fn new(base_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Synchronous (from the pipeline's point of view) completion call with
    /// an enforced timeout.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.timeout, self.request(prompt)).await {
            Err(_) => Err(GenerationError::TimedOut(self.timeout.as_secs())),
            Ok(Err(reason)) => Err(GenerationError::Unavailable(reason)),
            Ok(Ok(text)) => Ok(text),
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("model service returned {}", response.status()));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid model response: {e}"))?;

        Ok(body.response)
    }
}

/// Best-effort provenance: which evidence items the generated text appears
/// to reference, by scanning for their names. Not guaranteed complete.
pub fn used_evidence_ids(answer: &str, evidence: &[EvidenceItem]) -> Vec<String> {
    let lowered = answer.to_lowercase();
    let mut used = Vec::new();
    for item in evidence {
        if mention_keys(item)
            .iter()
            .any(|key| !key.is_empty() && lowered.contains(key.as_str()))
        {
            used.push(item.id.clone());
        }
    }
    used
}

/// Names an answer could plausibly reference an item by: the tail of its
/// id with hyphens respaced, plus the leading string value of a graph row.
fn mention_keys(item: &EvidenceItem) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(tail) = item.id.split(':').nth(1) {
        keys.push(tail.replace('-', " "));
        keys.push(tail.to_string());
    }
    if let Some(pairs) = item.payload.as_array() {
        if let Some(first) = pairs
            .iter()
            .filter_map(|p| p.get(1).and_then(|v| v.as_str()))
            .next()
        {
            keys.push(first.to_lowercase());
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::Origin;
    use serde_json::json;

    fn graph_item(id: &str, name: &str) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            label: "cost_by_service".to_string(),
            score: 0.9,
            payload: json!([["service", name], ["total_cost", 10.0]]),
            origin: Origin::Graph,
            source_ids: vec![id.to_string()],
        }
    }

    #[test]
    fn scans_answer_for_referenced_evidence() {
        let evidence = vec![
            graph_item("service:amazon-ec2", "Amazon EC2"),
            graph_item("service:aws-lambda", "AWS Lambda"),
        ];
        let answer = "Amazon EC2 accounts for most of the spend.";
        assert_eq!(
            used_evidence_ids(answer, &evidence),
            vec!["service:amazon-ec2".to_string()]
        );
    }

    #[test]
    fn no_references_yields_empty_provenance() {
        let evidence = vec![graph_item("service:amazon-ec2", "Amazon EC2")];
        assert!(used_evidence_ids("Nothing relevant here.", &evidence).is_empty());
    }

    #[test]
    fn timeout_and_unavailable_render_distinctly() {
        assert!(GenerationError::TimedOut(60).to_string().contains("timed out"));
        assert!(
            GenerationError::Unavailable("connection refused".to_string())
                .to_string()
                .contains("unavailable")
        );
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use catalog::Intent;
use store::{EmbeddingClient, VectorIndexClient};

/// One semantic similarity match against the pre-computed node embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub node_id: String,
    pub node_label: String,
    /// Cosine similarity in [-1, 1], higher is better.
    pub score: f32,
    pub source_text: String,
}

/// Node labels eligible for similarity search under a given intent. An
/// empty set means unrestricted (the `Unknown` fallback searches all).
pub fn eligible_labels(intent: &Intent) -> Vec<&'static str> {
    match intent {
        Intent::CostLookup | Intent::TopN { .. } | Intent::Trend => {
            vec!["CostRecord", "Charge", "Service"]
        }
        Intent::Comparison | Intent::Equivalence => vec!["Service", "Charge"],
        Intent::Definition => vec!["FOCUSColumn"],
        Intent::Unknown => vec![],
    }
}

pub struct VectorRetriever {
    embeddings: EmbeddingClient,
    index: VectorIndexClient,
}

impl VectorRetriever {
    pub fn new(embeddings: EmbeddingClient, index: VectorIndexClient) -> Self {
        Self { embeddings, index }
    }

    /// Embed the query and return at most `k` hits sorted by score
    /// descending, index order preserved on ties. Errors are returned to
    /// the pipeline, which degrades to zero vector evidence.
    pub async fn search(
        &self,
        query_text: &str,
        labels: &[&str],
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        let vector = self
            .embeddings
            .embed(query_text)
            .await
            .context("Failed to embed query")?;

        let points = self
            .index
            .search(vector, labels, k)
            .await
            .context("Vector index search failed")?;

        let mut hits: Vec<VectorHit> = points
            .into_iter()
            .map(|p| VectorHit {
                node_id: p.node_id,
                node_label: p.node_label,
                score: p.score,
                source_text: p.text,
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }
}

/// Stable descending sort: equal scores keep their index order, so output
/// is deterministic for identical inputs.
pub fn sort_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> VectorHit {
        VectorHit {
            node_id: id.to_string(),
            node_label: "Service".to_string(),
            score,
            source_text: String::new(),
        }
    }

    #[test]
    fn hits_sort_descending_with_stable_ties() {
        let mut hits = vec![hit("a", 0.5), hit("b", 0.9), hit("c", 0.5), hit("d", 0.7)];
        sort_hits(&mut hits);
        let ids: Vec<&str> = hits.iter().map(|h| h.node_id.as_str()).collect();
        // "a" precedes "c": tied scores keep input order.
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn labels_follow_intent() {
        assert_eq!(eligible_labels(&Intent::Definition), vec!["FOCUSColumn"]);
        assert_eq!(
            eligible_labels(&Intent::Equivalence),
            vec!["Service", "Charge"]
        );
        assert!(eligible_labels(&Intent::Unknown).is_empty());
        assert!(eligible_labels(&Intent::TopN { limit: 5 }).contains(&"CostRecord"));
    }
}

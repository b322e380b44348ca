use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use catalog::{slug, EntityMention, Intent};

use crate::graph::GraphHit;
use crate::vector::VectorHit;

/// Graph rows carry no cosine score; they rank by template row order via a
/// descending synthetic score.
pub const GRAPH_BASE_SCORE: f32 = 0.95;
pub const GRAPH_SCORE_STEP: f32 = 0.01;
pub const GRAPH_SCORE_FLOOR: f32 = 0.5;
/// Applied when a node was found by both sources; graph confirmation of a
/// semantic match is the strongest evidence we have.
pub const BOTH_ORIGIN_BOOST: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Graph,
    Both,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Vector => "vector",
            Origin::Graph => "graph",
            Origin::Both => "both",
        }
    }

    fn tier(&self) -> u8 {
        match self {
            Origin::Both => 0,
            Origin::Graph => 1,
            Origin::Vector => 2,
        }
    }
}

/// One fused, deduplicated unit of retrieved information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub label: String,
    pub score: f32,
    pub payload: Value,
    pub origin: Origin,
    /// Contributing node identities; `Both` items carry one per source.
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub intent: Intent,
    pub entities: Vec<EntityMention>,
    pub evidence: Vec<EvidenceItem>,
    pub truncated: bool,
}

/// Merge both retrieval sources into one ranked evidence list. Pure and
/// deterministic: identical inputs produce identical output ordering.
///
/// Graph rows enter the accumulator first (authoritative, exact-match);
/// vector hits either fill gaps or upgrade an existing item to `Both`.
/// Final order is tier (`Both` > `Graph` > `Vector`), then score
/// descending, stable on ties. Returns the capped list and whether any
/// candidate was dropped.
pub fn fuse(
    vector_hits: &[VectorHit],
    graph_hit: &GraphHit,
    max_evidence: usize,
) -> (Vec<EvidenceItem>, bool) {
    let mut items: Vec<EvidenceItem> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for (row_index, row) in graph_hit.rows.iter().enumerate() {
        let id = row_identity(graph_hit, row, row_index);
        if by_id.contains_key(&id) {
            // Same node reached by two template runs; first row wins.
            continue;
        }
        let score = (GRAPH_BASE_SCORE - row_index as f32 * GRAPH_SCORE_STEP).max(GRAPH_SCORE_FLOOR);
        by_id.insert(id.clone(), items.len());
        items.push(EvidenceItem {
            id: id.clone(),
            label: graph_hit.template_id.clone(),
            score,
            payload: json!(row),
            origin: Origin::Graph,
            source_ids: vec![id],
        });
    }

    for hit in vector_hits {
        match by_id.get(&hit.node_id) {
            Some(&index) => {
                let item = &mut items[index];
                // Only a graph item upgrades to Both; a repeated vector id
                // is the same source twice, and hits arrive score-sorted so
                // the first occurrence already carries the best score.
                if item.origin == Origin::Graph {
                    item.score = item.score.max(hit.score) + BOTH_ORIGIN_BOOST;
                    item.origin = Origin::Both;
                    item.source_ids.push(hit.node_id.clone());
                }
            }
            None => {
                by_id.insert(hit.node_id.clone(), items.len());
                items.push(EvidenceItem {
                    id: hit.node_id.clone(),
                    label: hit.node_label.clone(),
                    score: hit.score,
                    payload: json!({ "text": hit.source_text }),
                    origin: Origin::Vector,
                    source_ids: vec![hit.node_id.clone()],
                });
            }
        }
    }

    // Stable sort: tier first, then score descending; ties keep insertion
    // order, which is itself deterministic.
    items.sort_by(|a, b| {
        a.origin
            .tier()
            .cmp(&b.origin.tier())
            .then(b.score.total_cmp(&a.score))
    });

    let truncated = items.len() > max_evidence;
    items.truncate(max_evidence);
    (items, truncated)
}

/// Evidence identity of one graph row: `prefix:slugged-column-value` when
/// the template declares an identity column (matching the node ids the
/// embedding job writes), else a per-row key that never collides.
fn row_identity(graph_hit: &GraphHit, row: &[(String, Value)], row_index: usize) -> String {
    if let Some((prefix, column)) = &graph_hit.identity {
        if let Some((_, value)) = row.iter().find(|(name, _)| name == column) {
            if let Some(text) = value.as_str() {
                return format!("{prefix}:{}", slug(text));
            }
        }
    }
    format!("{}:{row_index}", graph_hit.template_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_hit(id: &str, score: f32) -> VectorHit {
        VectorHit {
            node_id: id.to_string(),
            node_label: "Service".to_string(),
            score,
            source_text: format!("about {id}"),
        }
    }

    fn graph_hit(services: &[&str]) -> GraphHit {
        GraphHit {
            template_id: "cost_by_service".to_string(),
            rows: services
                .iter()
                .map(|s| {
                    vec![
                        ("service".to_string(), json!(s)),
                        ("total_cost".to_string(), json!(12.5)),
                    ]
                })
                .collect(),
            bound_entities: Vec::new(),
            identity: Some(("service".to_string(), "service".to_string())),
            degraded: false,
        }
    }

    #[test]
    fn no_two_items_share_an_identifier() {
        let vectors = vec![
            vector_hit("service:amazon-ec2", 0.8),
            vector_hit("service:amazon-s3", 0.7),
        ];
        let graph = graph_hit(&["Amazon EC2", "AWS Lambda"]);
        let (evidence, _) = fuse(&vectors, &graph, 10);

        let mut ids: Vec<&str> = evidence.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), evidence.len());
        assert_eq!(evidence.len(), 3);
    }

    #[test]
    fn shared_identity_merges_to_both_with_provenance() {
        let vectors = vec![vector_hit("service:amazon-ec2", 0.8)];
        let graph = graph_hit(&["Amazon EC2"]);
        let (evidence, _) = fuse(&vectors, &graph, 10);

        assert_eq!(evidence.len(), 1);
        let item = &evidence[0];
        assert_eq!(item.origin, Origin::Both);
        assert_eq!(item.source_ids.len(), 2);
        // Combined score: max of the two contributions plus the boost.
        assert!((item.score - (0.95 + BOTH_ORIGIN_BOOST)).abs() < 1e-6);
        // Graph payload is authoritative for merged items.
        assert!(item.payload.to_string().contains("total_cost"));
    }

    #[test]
    fn duplicate_vector_ids_stay_vector_origin() {
        let vectors = vec![
            vector_hit("service:amazon-ec2", 0.9),
            vector_hit("service:amazon-ec2", 0.7),
        ];
        let (evidence, _) = fuse(&vectors, &GraphHit::empty("none"), 10);

        assert_eq!(evidence.len(), 1);
        let item = &evidence[0];
        assert_eq!(item.origin, Origin::Vector);
        assert_eq!(item.source_ids.len(), 1);
        // No graph corroboration, so no boost: the first (best) score wins.
        assert!((item.score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn ranking_is_tiered_then_scored() {
        let vectors = vec![
            vector_hit("service:amazon-ec2", 0.99),
            vector_hit("service:other", 0.98),
        ];
        let graph = graph_hit(&["Amazon EC2", "AWS Lambda"]);
        let (evidence, _) = fuse(&vectors, &graph, 10);

        let origins: Vec<Origin> = evidence.iter().map(|e| e.origin).collect();
        // Both outranks graph-only outranks vector-only, regardless of the
        // vector-only item's higher cosine score.
        assert_eq!(origins, vec![Origin::Both, Origin::Graph, Origin::Vector]);
    }

    #[test]
    fn graph_rows_rank_by_row_order() {
        let graph = graph_hit(&["First", "Second", "Third"]);
        let (evidence, _) = fuse(&[], &graph, 10);
        let ids: Vec<&str> = evidence.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["service:first", "service:second", "service:third"]);
        assert!(evidence[0].score > evidence[1].score);
    }

    #[test]
    fn cap_truncates_and_flags_exactly_when_dropping() {
        let graph = graph_hit(&["a", "b", "c", "d"]);
        let (evidence, truncated) = fuse(&[], &graph, 3);
        assert_eq!(evidence.len(), 3);
        assert!(truncated);

        let (evidence, truncated) = fuse(&[], &graph, 4);
        assert_eq!(evidence.len(), 4);
        assert!(!truncated);
    }

    #[test]
    fn truncation_never_drops_both_before_single_origin() {
        let vectors = vec![vector_hit("service:c", 0.4)];
        let graph = graph_hit(&["a", "b", "c", "d"]);
        let (evidence, truncated) = fuse(&vectors, &graph, 2);
        assert!(truncated);
        // The merged item survives even though its row came last-ish.
        assert_eq!(evidence[0].id, "service:c");
        assert_eq!(evidence[0].origin, Origin::Both);
    }

    #[test]
    fn fusion_is_deterministic() {
        let vectors = vec![vector_hit("service:x", 0.6), vector_hit("service:y", 0.6)];
        let graph = graph_hit(&["a", "b"]);
        let first = fuse(&vectors, &graph, 3);
        let second = fuse(&vectors, &graph, 3);
        let render = |r: &(Vec<EvidenceItem>, bool)| serde_json::to_string(&r.0).unwrap();
        assert_eq!(render(&first), render(&second));
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn rows_without_identity_column_fall_back_to_row_keys() {
        let mut graph = graph_hit(&["a", "b"]);
        graph.identity = None;
        let vectors = vec![vector_hit("service:a", 0.9)];
        let (evidence, _) = fuse(&vectors, &graph, 10);
        // Row keys are template-scoped, so the vector hit on the same
        // underlying node cannot merge and stays a separate item.
        assert_eq!(evidence.len(), 3);
        assert_eq!(evidence[0].id, "cost_by_service:0");
        assert_eq!(evidence[1].id, "cost_by_service:1");
    }
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use catalog::{understand, EntityCatalog, EntityMention, Intent};

use crate::context::{assemble, DEFAULT_MAX_CONTEXT_CHARS};
use crate::fusion::{fuse, EvidenceItem, RetrievalResult};
use crate::graph::{GraphHit, GraphRetriever};
use crate::llm::{used_evidence_ids, GenerationError, QueryLLM};
use crate::vector::{eligible_labels, VectorHit, VectorRetriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vector,
    Graph,
    Evidence,
    Generation,
}

/// One degraded stage. Nothing in the pipeline is fatal: every failure
/// shrinks the result shape instead of raising to the caller, and this is
/// how the caller learns which part shrank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub max_evidence: usize,
    pub max_context_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            max_evidence: 12,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// Everything a UI or REST caller needs to render: the classified intent,
/// extracted entities, both raw hit sets, the fused evidence, the answer
/// (absent when generation degraded), and the degraded-stage list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub intent: Intent,
    pub entities: Vec<EntityMention>,
    pub vector_hits: Vec<VectorHit>,
    pub graph_hit: GraphHit,
    pub evidence: Vec<EvidenceItem>,
    pub truncated: bool,
    pub answer: Option<String>,
    pub used_evidence_ids: Vec<String>,
    pub retrieval_method: String,
    pub errors: Vec<StageError>,
}

/// The hybrid retrieval pipeline. Stateless per query: the only shared
/// pieces are the read-only catalog and the store clients, so concurrent
/// queries need no coordination.
pub struct Pipeline {
    catalog: EntityCatalog,
    vector: VectorRetriever,
    graph: GraphRetriever,
    llm: QueryLLM,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        catalog: EntityCatalog,
        vector: VectorRetriever,
        graph: GraphRetriever,
        llm: QueryLLM,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            vector,
            graph,
            llm,
            config,
        }
    }

    pub async fn answer(&self, query: &str) -> QueryOutcome {
        self.answer_with_top_k(query, None).await
    }

    /// Full pipeline: understand, retrieve from both sources concurrently,
    /// fuse, assemble, generate. Never returns an error; degraded stages
    /// are recorded on the outcome.
    pub async fn answer_with_top_k(&self, query: &str, top_k: Option<usize>) -> QueryOutcome {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let (intent, entities) = understand(&self.catalog, query);
        info!(
            intent = intent.label(),
            entities = entities.len(),
            "query understood"
        );

        // No data dependency between the two retrievers; join before fusion.
        let labels = eligible_labels(&intent);
        let (vector_result, graph_hit) = tokio::join!(
            self.vector.search(query, &labels, top_k),
            self.graph.traverse(&intent, &entities),
        );

        let mut errors = Vec::new();
        let vector_hits = resolve_vector(vector_result, &mut errors);
        if graph_hit.degraded {
            errors.push(StageError::new(
                Stage::Graph,
                format!("template '{}' degraded", graph_hit.template_id),
            ));
        }

        let (evidence, cap_truncated) = fuse(&vector_hits, &graph_hit, self.config.max_evidence);
        if evidence.is_empty() {
            // Still generate from the query alone; the caller sees the
            // answer is ungrounded.
            errors.push(StageError::new(
                Stage::Evidence,
                "no evidence retrieved; answer is ungrounded",
            ));
        }

        let result = RetrievalResult {
            intent,
            entities: entities.clone(),
            evidence,
            truncated: cap_truncated,
        };
        let (prompt, context_truncated) = assemble(query, &result, self.config.max_context_chars);

        let mut outcome = QueryOutcome {
            query: query.to_string(),
            intent,
            entities,
            retrieval_method: retrieval_method(&vector_hits, &graph_hit),
            vector_hits,
            graph_hit,
            evidence: result.evidence,
            truncated: result.truncated || context_truncated,
            answer: None,
            used_evidence_ids: Vec::new(),
            errors,
        };

        let generation = self.llm.generate(&prompt).await;
        apply_generation(&mut outcome, generation);
        outcome
    }
}

fn resolve_vector(
    result: Result<Vec<VectorHit>>,
    errors: &mut Vec<StageError>,
) -> Vec<VectorHit> {
    match result {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "vector retrieval degraded");
            errors.push(StageError::new(Stage::Vector, e.to_string()));
            Vec::new()
        }
    }
}

fn apply_generation(outcome: &mut QueryOutcome, generation: Result<String, GenerationError>) {
    match generation {
        Ok(text) => {
            outcome.used_evidence_ids = used_evidence_ids(&text, &outcome.evidence);
            outcome.answer = Some(text);
        }
        Err(e) => {
            warn!(error = %e, "generation unavailable");
            outcome
                .errors
                .push(StageError::new(Stage::Generation, e.to_string()));
        }
    }
}

fn retrieval_method(vector_hits: &[VectorHit], graph_hit: &GraphHit) -> String {
    let kind = match (vector_hits.is_empty(), graph_hit.rows.is_empty()) {
        (false, false) => "hybrid",
        (false, true) => "vector",
        (true, false) => "graph",
        (true, true) => "none",
    };
    format!(
        "{kind} (vector={}, graph={})",
        vector_hits.len(),
        graph_hit.rows.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::Origin;
    use serde_json::json;

    fn outcome_with_evidence() -> QueryOutcome {
        let graph_hit = GraphHit {
            template_id: "cost_by_service".to_string(),
            rows: vec![vec![("service".to_string(), json!("Amazon EC2"))]],
            bound_entities: Vec::new(),
            identity: Some(("service".to_string(), "service".to_string())),
            degraded: false,
        };
        let (evidence, truncated) = fuse(&[], &graph_hit, 12);
        QueryOutcome {
            query: "q".to_string(),
            intent: Intent::CostLookup,
            entities: Vec::new(),
            retrieval_method: retrieval_method(&[], &graph_hit),
            vector_hits: Vec::new(),
            graph_hit,
            evidence,
            truncated,
            answer: None,
            used_evidence_ids: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn degraded_vector_source_is_recorded_but_not_fatal() {
        let mut errors = Vec::new();
        let hits = resolve_vector(Err(anyhow::anyhow!("index unreachable")), &mut errors);
        assert!(hits.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, Stage::Vector);
    }

    #[test]
    fn generation_timeout_leaves_evidence_and_flags_the_stage() {
        let mut outcome = outcome_with_evidence();
        apply_generation(&mut outcome, Err(GenerationError::TimedOut(60)));
        assert!(outcome.answer.is_none());
        assert!(!outcome.evidence.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].stage, Stage::Generation);
        assert!(outcome.errors[0].message.contains("timed out"));
    }

    #[test]
    fn successful_generation_fills_answer_and_provenance() {
        let mut outcome = outcome_with_evidence();
        apply_generation(
            &mut outcome,
            Ok("Amazon EC2 dominates the bill.".to_string()),
        );
        assert!(outcome.answer.is_some());
        assert_eq!(outcome.used_evidence_ids, vec!["service:amazon-ec2"]);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.evidence[0].origin, Origin::Graph);
    }

    #[test]
    fn retrieval_method_labels_the_contributing_sources() {
        let graph = GraphHit::empty("none");
        assert!(retrieval_method(&[], &graph).starts_with("none"));

        let hit = VectorHit {
            node_id: "service:x".to_string(),
            node_label: "Service".to_string(),
            score: 0.5,
            source_text: String::new(),
        };
        assert!(retrieval_method(&[hit], &graph).starts_with("vector"));
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use retrieval::QueryOutcome;

/// Per-query record for regression comparison: classified intent, which
/// retrieval sources contributed, and the raw answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: u32,
    pub question: String,
    pub intent: String,
    pub expected_intent: String,
    pub retrieval_method: String,
    pub expected_retrieval: String,
    pub vector_hits: usize,
    pub graph_rows: usize,
    pub evidence_items: usize,
    pub truncated: bool,
    pub errors: Vec<String>,
    pub answer: Option<String>,
}

impl QueryRecord {
    pub fn from_outcome(
        id: u32,
        expected_intent: &str,
        expected_retrieval: &str,
        outcome: &QueryOutcome,
    ) -> Self {
        Self {
            id,
            question: outcome.query.clone(),
            intent: outcome.intent.label().to_string(),
            expected_intent: expected_intent.to_string(),
            retrieval_method: outcome.retrieval_method.clone(),
            expected_retrieval: expected_retrieval.to_string(),
            vector_hits: outcome.vector_hits.len(),
            graph_rows: outcome.graph_hit.rows.len(),
            evidence_items: outcome.evidence.len(),
            truncated: outcome.truncated,
            errors: outcome
                .errors
                .iter()
                .map(|e| format!("{:?}: {}", e.stage, e.message))
                .collect(),
            answer: outcome.answer.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryReport {
    pub generated_unix_secs: u64,
    pub total_queries: usize,
    pub records: Vec<QueryRecord>,
}

impl BatteryReport {
    pub fn new(records: Vec<QueryRecord>) -> Self {
        Self {
            generated_unix_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            total_queries: records.len(),
            records,
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }
}

/// Plain-text summary of a run, one row per query.
pub fn summary_table(records: &[QueryRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<12} {:<22} {:<7} {:<6} question\n",
        "#", "intent", "retrieval", "vector", "graph"
    ));
    for record in records {
        // Char-based so multi-byte questions truncate cleanly.
        let question = if record.question.chars().count() > 48 {
            let head: String = record.question.chars().take(46).collect();
            format!("{head}..")
        } else {
            record.question.clone()
        };
        out.push_str(&format!(
            "{:<4} {:<12} {:<22} {:<7} {:<6} {question}\n",
            record.id,
            record.intent,
            record.retrieval_method,
            record.vector_hits,
            record.graph_rows,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32) -> QueryRecord {
        QueryRecord {
            id,
            question: "Compare storage costs between AWS and Azure".to_string(),
            intent: "comparison".to_string(),
            expected_intent: "comparison".to_string(),
            retrieval_method: "hybrid (vector=3, graph=4)".to_string(),
            expected_retrieval: "hybrid".to_string(),
            vector_hits: 3,
            graph_rows: 4,
            evidence_items: 6,
            truncated: false,
            errors: Vec::new(),
            answer: Some("answer".to_string()),
        }
    }

    #[test]
    fn summary_table_lists_every_record() {
        let table = summary_table(&[record(1), record(2)]);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("comparison"));
        assert!(table.contains("hybrid (vector=3, graph=4)"));
    }

    #[test]
    fn summary_table_truncates_long_questions_on_char_boundaries() {
        let mut long = record(1);
        long.question = "Quel est le coût total des services de qualité supérieure déployés en août?".to_string();
        let table = summary_table(&[long]);
        let row = table.lines().nth(1).unwrap();
        assert!(row.ends_with(".."));
        assert!(row.contains("Quel est le co"));
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = BatteryReport::new(vec![record(1)]);
        let json = serde_json::to_string(&report).unwrap();
        let parsed: BatteryReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_queries, 1);
        assert_eq!(parsed.records[0].id, 1);
    }
}

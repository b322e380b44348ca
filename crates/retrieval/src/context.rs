use serde_json::Value;

use crate::fusion::{EvidenceItem, Origin, RetrievalResult};

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

const NO_EVIDENCE_NOTE: &str =
    "No relevant data was found in the knowledge graph for this question.";

/// Render the fused evidence plus the question into the generation prompt.
/// Deterministic: identical inputs yield a byte-identical prompt. If the
/// evidence block exceeds the character budget even after the fusion cap,
/// the lowest-ranked lines are dropped first. Returns the prompt and
/// whether any evidence line was dropped.
pub fn assemble(query: &str, result: &RetrievalResult, max_chars: usize) -> (String, bool) {
    let mut lines: Vec<String> = result
        .evidence
        .iter()
        .enumerate()
        .map(|(i, item)| render_line(i + 1, item))
        .collect();

    let mut truncated = false;
    loop {
        let evidence_block = if lines.is_empty() {
            NO_EVIDENCE_NOTE.to_string()
        } else {
            lines.join("\n")
        };
        let prompt = render_prompt(query, &evidence_block);
        if prompt.len() <= max_chars || lines.is_empty() {
            return (prompt, truncated);
        }
        lines.pop();
        truncated = true;
    }
}

fn render_prompt(query: &str, evidence_block: &str) -> String {
    format!(
        r#"You are a FinOps assistant answering questions about FOCUS 1.0 cloud billing data.

EVIDENCE:
{evidence_block}

QUESTION: {query}

INSTRUCTIONS:
- Ground the answer in the evidence above and cite cost figures exactly as given
- Distinguish FOCUS standard columns from x_* vendor extensions where relevant
- Flag double-counting risks when Purchase and Usage charges are mixed
- If the evidence is insufficient, say so

ANSWER:"#
    )
}

fn render_line(position: usize, item: &EvidenceItem) -> String {
    let origin = item.origin.as_str().to_uppercase();
    let fact = render_payload(item);
    format!(
        "{position}. [{origin}/{label} | relevance:{score:.2}]\n   {fact}",
        label = item.label,
        score = item.score,
    )
}

/// Graph payloads are ordered column/value pairs; values render verbatim
/// (no recomputation or rounding of stored figures). Vector payloads are
/// the embedded source text.
fn render_payload(item: &EvidenceItem) -> String {
    match item.origin {
        Origin::Vector => item
            .payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        Origin::Graph | Origin::Both => match item.payload.as_array() {
            Some(pairs) => pairs
                .iter()
                .filter_map(|pair| {
                    let column = pair.get(0)?.as_str()?;
                    let value = pair.get(1)?;
                    Some(format!("{column}={}", render_value(value)))
                })
                .collect::<Vec<_>>()
                .join(" "),
            None => item.payload.to_string(),
        },
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Intent;
    use serde_json::json;

    fn item(id: &str, score: f32, origin: Origin) -> EvidenceItem {
        let payload = match origin {
            Origin::Vector => json!({ "text": format!("embedded text for {id}") }),
            _ => json!([
                ["service", "Amazon EC2"],
                ["total_cost", 123.4567],
                ["records", 12],
            ]),
        };
        EvidenceItem {
            id: id.to_string(),
            label: "cost_by_service".to_string(),
            score,
            payload,
            origin,
            source_ids: vec![id.to_string()],
        }
    }

    fn result(evidence: Vec<EvidenceItem>) -> RetrievalResult {
        RetrievalResult {
            intent: Intent::CostLookup,
            entities: Vec::new(),
            evidence,
            truncated: false,
        }
    }

    #[test]
    fn assembly_is_deterministic() {
        let r = result(vec![
            item("service:amazon-ec2", 0.95, Origin::Graph),
            item("service:other", 0.71, Origin::Vector),
        ]);
        let (first, _) = assemble("What does EC2 cost?", &r, DEFAULT_MAX_CONTEXT_CHARS);
        let (second, _) = assemble("What does EC2 cost?", &r, DEFAULT_MAX_CONTEXT_CHARS);
        assert_eq!(first, second);
    }

    #[test]
    fn graph_facts_render_values_verbatim() {
        let r = result(vec![item("service:amazon-ec2", 0.95, Origin::Graph)]);
        let (prompt, truncated) = assemble("q", &r, DEFAULT_MAX_CONTEXT_CHARS);
        assert!(prompt.contains("service=Amazon EC2 total_cost=123.4567 records=12"));
        assert!(prompt.contains("[GRAPH/cost_by_service | relevance:0.95]"));
        assert!(!truncated);
    }

    #[test]
    fn budget_drops_lowest_ranked_lines_first() {
        let r = result(vec![
            item("a", 0.9, Origin::Graph),
            item("b", 0.8, Origin::Graph),
            item("c", 0.7, Origin::Vector),
        ]);
        let (full, _) = assemble("q", &r, usize::MAX);
        let budget = full.len() - 1;
        let (prompt, truncated) = assemble("q", &r, budget);
        assert!(truncated);
        assert!(prompt.len() <= budget);
        assert!(prompt.contains("1. [GRAPH"));
        assert!(!prompt.contains("3. [VECTOR"));
    }

    #[test]
    fn empty_evidence_falls_back_to_a_note() {
        let r = result(Vec::new());
        let (prompt, truncated) = assemble("anything", &r, DEFAULT_MAX_CONTEXT_CHARS);
        assert!(prompt.contains("No relevant data was found"));
        assert!(prompt.contains("QUESTION: anything"));
        assert!(!truncated);
    }
}

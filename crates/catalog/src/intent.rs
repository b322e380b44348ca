use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{EntityCatalog, EntityMention};

const DEFAULT_TOP_N: u32 = 10;
const MAX_TOP_N: u32 = 25;

/// Closed set of question intents. Every intent maps to exactly one graph
/// traversal template; `Unknown` proceeds vector-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Intent {
    CostLookup,
    Comparison,
    Equivalence,
    Trend,
    TopN { limit: u32 },
    Definition,
    Unknown,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::CostLookup => "cost-lookup",
            Intent::Comparison => "comparison",
            Intent::Equivalence => "equivalence",
            Intent::Trend => "trend",
            Intent::TopN { .. } => "top-n",
            Intent::Definition => "definition",
            Intent::Unknown => "unknown",
        }
    }
}

const EQUIVALENCE_TRIGGERS: &[&str] = &["equivalent", "same as", "counterpart of"];
const COMPARISON_TRIGGERS: &[&str] = &["compare", " vs ", " vs.", "versus", "difference between"];
const TOP_N_TRIGGERS: &[&str] = &["top ", "highest", "most expensive", "largest"];
const TREND_TRIGGERS: &[&str] = &["trend", "over time", "per month", "monthly", "by period"];
const DEFINITION_TRIGGERS: &[&str] = &[
    "what is",
    "what are",
    "why",
    "explain",
    "define",
    "definition",
    "focus column",
    "specification",
];
const COST_TRIGGERS: &[&str] = &[
    "cost", "spend", "spent", "price", "billed", "billing", "charge", "expensive", "total",
];

/// Deterministic keyword dispatch. Trigger order matters: the more specific
/// intents are checked before the broad cost fallback.
pub fn classify(query: &str) -> Intent {
    let q = query.to_lowercase();
    let hit = |triggers: &[&str]| triggers.iter().any(|t| q.contains(t));

    if hit(EQUIVALENCE_TRIGGERS) {
        return Intent::Equivalence;
    }
    if hit(COMPARISON_TRIGGERS) {
        return Intent::Comparison;
    }
    if hit(TOP_N_TRIGGERS) {
        return Intent::TopN {
            limit: parse_top_n(&q),
        };
    }
    if hit(TREND_TRIGGERS) {
        return Intent::Trend;
    }
    if hit(DEFINITION_TRIGGERS) {
        return Intent::Definition;
    }
    if hit(COST_TRIGGERS) {
        return Intent::CostLookup;
    }
    Intent::Unknown
}

/// "top 5" -> 5. Missing or unparsable counts fall back to the default cap.
fn parse_top_n(lowered: &str) -> u32 {
    let re = Regex::new(r"\btop\s+(\d+)").unwrap();
    re.captures(lowered)
        .and_then(|c| c[1].parse::<u32>().ok())
        .map(|n| n.clamp(1, MAX_TOP_N))
        .unwrap_or(DEFAULT_TOP_N)
}

/// Classify intent and extract entity mentions in one pass. Never fails:
/// no entities and `Unknown` intent are valid outcomes and the pipeline
/// degrades accordingly.
pub fn understand(catalog: &EntityCatalog, query: &str) -> (Intent, Vec<EntityMention>) {
    (classify(query), catalog.lookup(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogType;

    #[test]
    fn comparison_query_classifies_and_extracts_services() {
        let catalog = EntityCatalog::builtin();
        let (intent, entities) =
            understand(&catalog, "Compare AWS EC2 and Azure Virtual Machines costs");
        assert_eq!(intent, Intent::Comparison);
        let services: Vec<&str> = entities
            .iter()
            .filter(|m| m.catalog_type == CatalogType::Service)
            .map(|m| m.canonical_id.as_str())
            .collect();
        assert_eq!(services, vec!["amazon-ec2", "azure-virtual-machines"]);
    }

    #[test]
    fn top_n_parses_the_requested_count() {
        assert_eq!(
            classify("What are the top 5 most expensive services?"),
            Intent::TopN { limit: 5 }
        );
        assert_eq!(
            classify("show the most expensive resources"),
            Intent::TopN { limit: 10 }
        );
        // Requested counts are capped.
        assert_eq!(classify("top 500 services"), Intent::TopN { limit: 25 });
    }

    #[test]
    fn equivalence_wins_over_definition() {
        assert_eq!(
            classify("What is the Azure equivalent of AWS S3?"),
            Intent::Equivalence
        );
    }

    #[test]
    fn definition_and_trend_triggers() {
        assert_eq!(classify("Why does my total increase?"), Intent::Definition);
        assert_eq!(classify("storage spend trend by period"), Intent::Trend);
    }

    #[test]
    fn cost_nouns_without_other_triggers_are_cost_lookup() {
        assert_eq!(
            classify("Which cost type should be used to analyze cloud spend?"),
            Intent::CostLookup
        );
    }

    #[test]
    fn unmatched_queries_fall_back_to_unknown() {
        assert_eq!(classify("Find all AWS compute services"), Intent::Unknown);
        assert_eq!(classify("hello there"), Intent::Unknown);
    }
}

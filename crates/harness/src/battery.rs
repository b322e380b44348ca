use serde::Serialize;

/// One named regression query with its expected classification. The
/// expected retrieval method assumes populated stores; intent expectations
/// hold offline.
#[derive(Debug, Clone, Serialize)]
pub struct NamedQuery {
    pub id: u32,
    pub question: &'static str,
    pub expected_intent: &'static str,
    pub expected_retrieval: &'static str,
    pub expected_concepts: &'static [&'static str],
}

/// The fixed end-to-end battery. Ids are stable so reports stay comparable
/// across runs.
pub fn battery() -> Vec<NamedQuery> {
    vec![
        NamedQuery {
            id: 1,
            question: "Which are the core FOCUS columns and how do they differ from vendor specific columns?",
            expected_intent: "definition",
            expected_retrieval: "hybrid",
            expected_concepts: &["EffectiveCost", "BilledCost", "x_"],
        },
        NamedQuery {
            id: 2,
            question: "Find all AWS compute services",
            expected_intent: "unknown",
            expected_retrieval: "vector",
            expected_concepts: &["EC2", "Lambda", "Compute"],
        },
        NamedQuery {
            id: 3,
            question: "What is the Azure equivalent of AWS S3?",
            expected_intent: "equivalence",
            expected_retrieval: "hybrid",
            expected_concepts: &["Blob", "Storage"],
        },
        NamedQuery {
            id: 4,
            question: "Find the top 5 most expensive resources tagged as Production in Azure",
            expected_intent: "top-n",
            expected_retrieval: "hybrid",
            expected_concepts: &["effectiveCost", "Production"],
        },
        NamedQuery {
            id: 5,
            question: "Compare storage costs between AWS and Azure",
            expected_intent: "comparison",
            expected_retrieval: "hybrid",
            expected_concepts: &["S3", "Blob", "Storage"],
        },
        NamedQuery {
            id: 6,
            question: "When calculating commitment utilization using CommitmentDiscountQuantity, which charge categories must be excluded to avoid double counting?",
            expected_intent: "cost-lookup",
            expected_retrieval: "hybrid",
            expected_concepts: &["Purchase", "double counting"],
        },
        NamedQuery {
            id: 7,
            question: "Why does my total increase when I include commitment purchases and usage together?",
            expected_intent: "definition",
            expected_retrieval: "hybrid",
            expected_concepts: &["Purchase", "Usage", "double counting"],
        },
        NamedQuery {
            id: 8,
            question: "Which cost type should be used to analyze cloud spend?",
            expected_intent: "cost-lookup",
            expected_retrieval: "hybrid",
            expected_concepts: &["EffectiveCost", "BilledCost"],
        },
        NamedQuery {
            id: 9,
            question: "What are the top 5 most expensive services?",
            expected_intent: "top-n",
            expected_retrieval: "hybrid",
            expected_concepts: &["effectiveCost"],
        },
        NamedQuery {
            id: 10,
            question: "Show the monthly spend trend per provider",
            expected_intent: "trend",
            expected_retrieval: "hybrid",
            expected_concepts: &["BillingPeriod"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{understand, EntityCatalog};

    #[test]
    fn battery_ids_are_unique_and_stable() {
        let queries = battery();
        let mut ids: Vec<u32> = queries.iter().map(|q| q.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), queries.len());
    }

    #[test]
    fn every_battery_query_classifies_to_its_expected_intent() {
        let catalog = EntityCatalog::builtin();
        for query in battery() {
            let (intent, _) = understand(&catalog, query.question);
            assert_eq!(
                intent.label(),
                query.expected_intent,
                "query #{}: {}",
                query.id,
                query.question
            );
        }
    }

    #[test]
    fn comparison_battery_query_extracts_both_providers() {
        let catalog = EntityCatalog::builtin();
        let (_, entities) = understand(&catalog, "Compare storage costs between AWS and Azure");
        let ids: Vec<&str> = entities.iter().map(|m| m.canonical_id.as_str()).collect();
        assert!(ids.contains(&"aws"));
        assert!(ids.contains(&"azure"));
    }
}

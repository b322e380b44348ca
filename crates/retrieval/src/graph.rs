use anyhow::Result;
use neo4rs::Query;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use catalog::{CatalogType, EntityMention, Intent};
use store::{GraphRow, GraphStore};

pub const DEFAULT_ROW_CAP: i64 = 10;
pub const COMPARISON_ROW_CAP: i64 = 5;

/// Result of one graph traversal: ordered rows plus enough metadata for
/// fusion to derive per-row evidence identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphHit {
    pub template_id: String,
    pub rows: Vec<GraphRow>,
    pub bound_entities: Vec<String>,
    /// (prefix, column) deriving each row's evidence identity; rows of
    /// templates without one are never deduplicated against vector hits.
    pub identity: Option<(String, String)>,
    pub degraded: bool,
}

impl GraphHit {
    pub fn empty(template_id: &str) -> Self {
        Self {
            template_id: template_id.to_string(),
            rows: Vec::new(),
            bound_entities: Vec::new(),
            identity: None,
            degraded: false,
        }
    }
}

/// One parameterized traversal over the FOCUS schema. Empty-string
/// parameters disable their filter clause (match-all).
#[derive(Debug, Clone)]
pub struct TraversalTemplate {
    pub id: &'static str,
    pub cypher: &'static str,
    pub columns: &'static [&'static str],
    pub identity: Option<(&'static str, &'static str)>,
    pub params: Vec<(&'static str, String)>,
    pub cap: i64,
    /// Comparison and equivalence scope each run to one entity; its rows
    /// are tagged with the entity after execution.
    pub focus: Option<String>,
}

// Entity canonical ids are hyphenated slugs, so the node side is
// normalized to the same form before the CONTAINS match.
const COST_BY_SERVICE: &str = r#"
MATCH (cr:CostRecord)-[:INCURRED_BY]->(r:Resource)-[:USES_SERVICE]->(s:Service)
WHERE cr.effectiveCost > 0
  AND ($provider = '' OR cr.source = $provider)
  AND ($service = '' OR replace(toLower(s.serviceName), ' ', '-') CONTAINS $service)
  AND ($category = '' OR replace(toLower(s.serviceCategory), ' ', '-') CONTAINS $category)
  AND ($region = '' OR EXISTS {
    MATCH (r)-[:DEPLOYED_IN]->(l:Location)
    WHERE replace(toLower(l.regionName), ' ', '-') CONTAINS $region
  })
  AND ($tag = '' OR toLower(cr.tagEnvironment) CONTAINS $tag)
WITH s.serviceName AS service, s.serviceCategory AS category, cr.source AS provider,
     sum(cr.effectiveCost) AS total_cost, count(cr) AS records
ORDER BY total_cost DESC
LIMIT $cap
RETURN service, category, provider, total_cost, records
"#;

const COST_BY_SERVICE_COLUMNS: &[&str] =
    &["service", "category", "provider", "total_cost", "records"];

// Purchase rows next to Usage rows are the double-counting hazard; the
// breakdown keeps billed and effective cost side by side per category.
const CHARGE_BREAKDOWN: &str = r#"
MATCH (cr:CostRecord)-[:HAS_CHARGE]->(c:Charge)
WHERE ($provider = '' OR cr.source = $provider)
  AND ($charge_category = '' OR toLower(c.chargeCategory) CONTAINS $charge_category)
WITH c.chargeCategory AS category, cr.source AS provider,
     sum(cr.effectiveCost) AS effective_cost, sum(cr.billedCost) AS billed_cost,
     count(cr) AS records
ORDER BY effective_cost DESC
LIMIT $cap
RETURN category, provider, effective_cost, billed_cost, records
"#;

const CHARGE_BREAKDOWN_COLUMNS: &[&str] =
    &["category", "provider", "effective_cost", "billed_cost", "records"];

const COST_TREND: &str = r#"
MATCH (cr:CostRecord)-[:IN_BILLING_PERIOD]->(p:BillingPeriod)
WHERE ($provider = '' OR cr.source = $provider)
WITH p.start AS period, cr.source AS provider,
     sum(cr.effectiveCost) AS total_cost, count(cr) AS records
ORDER BY period, provider
LIMIT $cap
RETURN period, provider, total_cost, records
"#;

const COST_TREND_COLUMNS: &[&str] = &["period", "provider", "total_cost", "records"];

const FOCUS_COLUMNS: &str = r#"
MATCH (f:FOCUSColumn)
WHERE $term = '' OR toLower(f.name) CONTAINS $term OR toLower(f.description) CONTAINS $term
RETURN f.name AS name, f.standard AS standard, f.description AS description
ORDER BY f.standard, f.name
LIMIT $cap
"#;

const FOCUS_COLUMNS_COLUMNS: &[&str] = &["name", "standard", "description"];

const SERVICE_PEERS: &str = r#"
MATCH (s:Service)
WHERE replace(toLower(s.serviceName), ' ', '-') CONTAINS $service
MATCH (peer:Service)
WHERE peer.serviceCategory = s.serviceCategory
  AND peer.serviceName <> s.serviceName
RETURN DISTINCT peer.serviceName AS service, peer.serviceCategory AS category
ORDER BY service
LIMIT $cap
"#;

const SERVICE_PEERS_COLUMNS: &[&str] = &["service", "category"];

fn first_of(entities: &[EntityMention], catalog_type: CatalogType) -> String {
    entities
        .iter()
        .find(|m| m.catalog_type == catalog_type)
        .map(|m| m.canonical_id.clone())
        .unwrap_or_default()
}

/// Entities a comparison pivots on: services if any were mentioned,
/// otherwise providers, otherwise categories.
fn comparison_pivots(entities: &[EntityMention]) -> Vec<&EntityMention> {
    for catalog_type in [
        CatalogType::Service,
        CatalogType::Provider,
        CatalogType::Category,
    ] {
        let pivots: Vec<&EntityMention> = entities
            .iter()
            .filter(|m| m.catalog_type == catalog_type)
            .collect();
        if pivots.len() >= 2 {
            return pivots;
        }
    }
    Vec::new()
}

fn cost_template(
    id: &'static str,
    provider: String,
    service: String,
    category: String,
    region: String,
    tag: String,
    cap: i64,
    focus: Option<String>,
) -> TraversalTemplate {
    TraversalTemplate {
        id,
        cypher: COST_BY_SERVICE,
        columns: COST_BY_SERVICE_COLUMNS,
        identity: Some(("service", "service")),
        params: vec![
            ("provider", provider),
            ("service", service),
            ("category", category),
            ("region", region),
            ("tag", tag),
        ],
        cap,
        focus,
    }
}

/// Map an intent plus its extracted entities onto the traversal templates
/// to execute. Pure, so template shape is unit-testable without a store.
pub fn plan(intent: &Intent, entities: &[EntityMention]) -> Vec<TraversalTemplate> {
    let provider = first_of(entities, CatalogType::Provider);
    let service = first_of(entities, CatalogType::Service);
    let category = first_of(entities, CatalogType::Category);
    let region = first_of(entities, CatalogType::Region);
    let tag = first_of(entities, CatalogType::Tag);
    let charge = first_of(entities, CatalogType::Charge);

    match intent {
        Intent::CostLookup => {
            // A charge-category mention (commitment, purchase) pivots the
            // lookup from service totals to the per-category breakdown.
            if !charge.is_empty() {
                return vec![TraversalTemplate {
                    id: "charge_breakdown",
                    cypher: CHARGE_BREAKDOWN,
                    columns: CHARGE_BREAKDOWN_COLUMNS,
                    identity: Some(("charge", "category")),
                    params: vec![("provider", provider), ("charge_category", charge)],
                    cap: DEFAULT_ROW_CAP,
                    focus: None,
                }];
            }
            vec![cost_template(
                "cost_by_service",
                provider,
                service,
                category,
                region,
                tag,
                DEFAULT_ROW_CAP,
                None,
            )]
        }
        Intent::TopN { limit } => vec![cost_template(
            "top_services",
            provider,
            service,
            category,
            region,
            tag,
            i64::from(*limit),
            None,
        )],
        Intent::Comparison => {
            let pivots = comparison_pivots(entities);
            if pivots.is_empty() {
                // Not enough entities to compare: broaden to a single run.
                return vec![cost_template(
                    "cost_comparison",
                    provider,
                    service,
                    category,
                    region,
                    tag,
                    DEFAULT_ROW_CAP,
                    None,
                )];
            }
            pivots
                .into_iter()
                .map(|pivot| {
                    // Only the pivot dimension and the shared category/region
                    // filters bind; the competing dimension stays match-all.
                    let (run_provider, run_service) = match pivot.catalog_type {
                        CatalogType::Provider => (pivot.canonical_id.clone(), String::new()),
                        CatalogType::Service => (String::new(), pivot.canonical_id.clone()),
                        _ => (String::new(), String::new()),
                    };
                    let run_category = if pivot.catalog_type == CatalogType::Category {
                        pivot.canonical_id.clone()
                    } else {
                        category.clone()
                    };
                    cost_template(
                        "cost_comparison",
                        run_provider,
                        run_service,
                        run_category,
                        region.clone(),
                        tag.clone(),
                        COMPARISON_ROW_CAP,
                        Some(pivot.canonical_id.clone()),
                    )
                })
                .collect()
        }
        Intent::Equivalence => entities
            .iter()
            .filter(|m| m.catalog_type == CatalogType::Service)
            .take(2)
            .map(|m| TraversalTemplate {
                id: "service_peers",
                cypher: SERVICE_PEERS,
                columns: SERVICE_PEERS_COLUMNS,
                identity: Some(("service", "service")),
                params: vec![("service", m.canonical_id.clone())],
                cap: COMPARISON_ROW_CAP,
                focus: Some(m.canonical_id.clone()),
            })
            .collect(),
        Intent::Trend => vec![TraversalTemplate {
            id: "cost_trend",
            cypher: COST_TREND,
            columns: COST_TREND_COLUMNS,
            identity: None,
            params: vec![("provider", provider)],
            cap: DEFAULT_ROW_CAP,
            focus: None,
        }],
        Intent::Definition => vec![TraversalTemplate {
            id: "focus_columns",
            cypher: FOCUS_COLUMNS,
            columns: FOCUS_COLUMNS_COLUMNS,
            identity: Some(("column", "name")),
            params: vec![("term", first_of(entities, CatalogType::Metric))],
            cap: DEFAULT_ROW_CAP,
            focus: None,
        }],
        Intent::Unknown => Vec::new(),
    }
}

pub struct GraphRetriever {
    store: GraphStore,
}

impl GraphRetriever {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Execute the planned templates. A failing template marks the hit as
    /// degraded and contributes zero rows; it never aborts the pipeline.
    pub async fn traverse(&self, intent: &Intent, entities: &[EntityMention]) -> GraphHit {
        let templates = plan(intent, entities);
        let Some(first) = templates.first() else {
            return GraphHit::empty("none");
        };

        let template_id = first.id.to_string();
        let identity = first
            .identity
            .map(|(prefix, column)| (prefix.to_string(), column.to_string()));

        let mut rows = Vec::new();
        let mut bound_entities: Vec<String> = Vec::new();
        let mut degraded = false;

        for template in &templates {
            for (_, value) in &template.params {
                if !value.is_empty() && !bound_entities.contains(value) {
                    bound_entities.push(value.clone());
                }
            }

            match self.execute(template).await {
                Ok(mut template_rows) => {
                    if let Some(focus) = &template.focus {
                        for row in &mut template_rows {
                            row.push(("compared_entity".to_string(), json!(focus)));
                        }
                    }
                    rows.extend(template_rows);
                }
                Err(e) => {
                    warn!(template = template.id, error = %e, "graph template execution failed");
                    degraded = true;
                }
            }
        }

        GraphHit {
            template_id,
            rows,
            bound_entities,
            identity,
            degraded,
        }
    }

    async fn execute(&self, template: &TraversalTemplate) -> Result<Vec<GraphRow>> {
        let mut query = Query::new(template.cypher.to_string());
        for (name, value) in &template.params {
            query = query.param(name, value.clone());
        }
        query = query.param("cap", template.cap);
        self.store.execute(query, template.columns).await
    }
}

use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use serde_json::{json, Value};

use catalog::{slug, CatalogEntry, CatalogType};

/// One result row in template column order.
pub type GraphRow = Vec<(String, Value)>;

/// Read-only handle to the FOCUS billing graph over Bolt. Templates and
/// lookups only ever read; schema and data are owned by the ingestion job.
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;
        Ok(Self { graph })
    }

    /// Connectivity probe used by the health endpoint.
    pub async fn verify(&self) -> Result<()> {
        self.graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .context("Neo4j connectivity check failed")
    }

    /// Execute a parameterized query and project the named columns into
    /// JSON values, preserving column order per row.
    pub async fn execute(&self, query: Query, columns: &[&str]) -> Result<Vec<GraphRow>> {
        let mut result = self
            .graph
            .execute(query)
            .await
            .context("Graph query execution failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            let mut projected = Vec::with_capacity(columns.len());
            for column in columns {
                projected.push((column.to_string(), column_value(&row, column)));
            }
            rows.push(projected);
        }
        Ok(rows)
    }

    /// Distinct string values of one node property, for catalog building.
    pub async fn distinct_values(&self, label: &str, property: &str) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH (n:{label}) WHERE n.{property} IS NOT NULL \
             RETURN DISTINCT n.{property} AS value ORDER BY value LIMIT 500"
        );
        let mut result = self.graph.execute(Query::new(cypher)).await?;
        let mut values = Vec::new();
        while let Some(row) = result.next().await? {
            if let Ok(value) = row.get::<String>("value") {
                if !value.is_empty() {
                    values.push(value);
                }
            }
        }
        Ok(values)
    }

    /// Node counts by label, for the stats endpoint.
    pub async fn node_counts(&self) -> Result<Vec<(String, i64)>> {
        self.label_counts("MATCH (n) RETURN labels(n)[0] AS label, count(n) AS count ORDER BY label")
            .await
    }

    /// Relationship counts by type, for the stats endpoint.
    pub async fn relationship_counts(&self) -> Result<Vec<(String, i64)>> {
        self.label_counts("MATCH ()-[r]->() RETURN type(r) AS label, count(r) AS count ORDER BY label")
            .await
    }

    async fn label_counts(&self, cypher: &str) -> Result<Vec<(String, i64)>> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let mut counts = Vec::new();
        while let Some(row) = result.next().await? {
            let label = row.get::<String>("label").unwrap_or_default();
            let count = row.get::<i64>("count").unwrap_or(0);
            if !label.is_empty() {
                counts.push((label, count));
            }
        }
        Ok(counts)
    }

    /// Case-insensitive lookup of a single named concept across the node
    /// labels that carry descriptive text.
    pub async fn find_concept(&self, name: &str) -> Result<Option<ConceptNode>> {
        const TARGETS: &[(&str, &str)] = &[
            ("FOCUSColumn", "name"),
            ("Service", "serviceName"),
            ("Location", "regionName"),
            ("Charge", "chargeCategory"),
        ];

        for (label, key) in TARGETS {
            let cypher = format!(
                "MATCH (n:{label}) WHERE toLower(n.{key}) CONTAINS toLower($name) \
                 RETURN n.{key} AS name, coalesce(n.description, '') AS description LIMIT 1"
            );
            let query = Query::new(cypher).param("name", name.to_string());
            let mut result = self.graph.execute(query).await?;
            if let Some(row) = result.next().await? {
                return Ok(Some(ConceptNode {
                    name: row.get::<String>("name").unwrap_or_else(|_| name.to_string()),
                    label: label.to_string(),
                    description: row.get::<String>("description").unwrap_or_default(),
                }));
            }
        }
        Ok(None)
    }

    /// Names of nodes adjacent to a found concept, for the concept endpoint.
    pub async fn related_names(&self, concept: &ConceptNode) -> Result<Vec<String>> {
        let cypher = match concept.label.as_str() {
            "Service" => {
                "MATCH (s:Service {serviceName: $name})<-[:USES_SERVICE]-(r:Resource) \
                 RETURN r.resourceName AS name ORDER BY name LIMIT 5"
            }
            "FOCUSColumn" => {
                "MATCH (f:FOCUSColumn {name: $name}) \
                 MATCH (peer:FOCUSColumn) WHERE peer.standard = f.standard AND peer.name <> f.name \
                 RETURN peer.name AS name ORDER BY name LIMIT 5"
            }
            _ => return Ok(Vec::new()),
        };
        let query = Query::new(cypher.to_string()).param("name", concept.name.clone());
        let mut result = self.graph.execute(query).await?;
        let mut names = Vec::new();
        while let Some(row) = result.next().await? {
            if let Ok(name) = row.get::<String>("name") {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConceptNode {
    pub name: String,
    pub label: String,
    pub description: String,
}

/// Coerce a Bolt column into JSON without knowing its type up front.
/// Integers are tried before floats so counts stay integral.
fn column_value(row: &neo4rs::Row, column: &str) -> Value {
    if let Ok(v) = row.get::<i64>(column) {
        return json!(v);
    }
    if let Ok(v) = row.get::<f64>(column) {
        return json!(v);
    }
    if let Ok(v) = row.get::<bool>(column) {
        return json!(v);
    }
    if let Ok(v) = row.get::<String>(column) {
        return json!(v);
    }
    if let Ok(v) = row.get::<Vec<String>>(column) {
        return json!(v);
    }
    Value::Null
}

/// Build catalog entries from the graph's distinct dimension values so the
/// Entity Catalog recognizes every provider, service, category, and region
/// actually present in the billing data. Runs once at startup.
pub async fn load_catalog_entries(store: &GraphStore) -> Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();

    let dimensions: &[(&str, &str, CatalogType)] = &[
        ("CostRecord", "source", CatalogType::Provider),
        ("Service", "serviceName", CatalogType::Service),
        ("Service", "serviceCategory", CatalogType::Category),
        ("Location", "regionName", CatalogType::Region),
    ];

    for (label, property, catalog_type) in dimensions {
        let values = store
            .distinct_values(label, property)
            .await
            .with_context(|| format!("Failed to load {label}.{property} values"))?;
        for value in values {
            entries.push(CatalogEntry::new(&slug(&value), *catalog_type, &[&value]));
        }
    }

    Ok(entries)
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogType {
    Provider,
    Service,
    Category,
    Region,
    Metric,
    Tag,
    Charge,
}

/// A recognized entity occurrence in a query, resolved to its canonical id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub surface_text: String,
    pub catalog_type: CatalogType,
    pub canonical_id: String,
}

/// One known domain entity: canonical name first, synonyms after.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub canonical_id: String,
    pub catalog_type: CatalogType,
    pub names: Vec<String>,
}

impl CatalogEntry {
    pub fn new(canonical_id: &str, catalog_type: CatalogType, names: &[&str]) -> Self {
        Self {
            canonical_id: canonical_id.to_string(),
            catalog_type,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// Canonical id form: lowercase, whitespace collapsed to single hyphens.
/// Metric ids drop separators entirely so they match FOCUS column names.
pub fn slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Read-only registry of known billing entities. Built once at startup,
/// passed explicitly into query understanding.
pub struct EntityCatalog {
    /// (lowercased name, index into `entries`), longest names first so
    /// that scanning can prefer the more specific match.
    patterns: Vec<(String, usize)>,
    entries: Vec<CatalogEntry>,
}

impl EntityCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut patterns = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            for name in &entry.names {
                let lowered = name.to_lowercase();
                if !lowered.is_empty() {
                    patterns.push((lowered, idx));
                }
            }
        }
        // Longest-match-wins: try longer names before their substrings.
        patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self { patterns, entries }
    }

    /// Static seed list covering the FOCUS billing ontology and the common
    /// AWS/Azure vocabulary. `store::load_catalog_entries` extends this
    /// from the graph's distinct dimension values at startup.
    pub fn builtin() -> Self {
        Self::builtin_with(Vec::new())
    }

    pub fn builtin_with(extra: Vec<CatalogEntry>) -> Self {
        use CatalogType::*;
        let mut entries = vec![
            CatalogEntry::new("aws", Provider, &["AWS", "Amazon Web Services"]),
            CatalogEntry::new("azure", Provider, &["Azure", "Microsoft Azure"]),
            CatalogEntry::new("amazon-ec2", Service, &["Amazon EC2", "EC2"]),
            CatalogEntry::new("amazon-s3", Service, &["Amazon S3", "S3"]),
            CatalogEntry::new("aws-lambda", Service, &["AWS Lambda", "Lambda"]),
            CatalogEntry::new("amazon-rds", Service, &["Amazon RDS", "RDS"]),
            CatalogEntry::new("amazon-ebs", Service, &["Amazon EBS", "EBS"]),
            CatalogEntry::new(
                "azure-virtual-machines",
                Service,
                &["Azure Virtual Machines", "Virtual Machines", "Virtual Machine"],
            ),
            CatalogEntry::new(
                "azure-blob-storage",
                Service,
                &["Azure Blob Storage", "Blob Storage", "Blob"],
            ),
            CatalogEntry::new("azure-sql-database", Service, &["Azure SQL Database", "Azure SQL"]),
            CatalogEntry::new("compute", Category, &["Compute"]),
            CatalogEntry::new("storage", Category, &["Storage"]),
            CatalogEntry::new("database", Category, &["Database", "Databases"]),
            CatalogEntry::new("networking", Category, &["Networking"]),
            CatalogEntry::new("us-east-1", Region, &["us-east-1"]),
            CatalogEntry::new("us-west-2", Region, &["us-west-2"]),
            CatalogEntry::new("eu-west-1", Region, &["eu-west-1"]),
            CatalogEntry::new("eastus", Region, &["eastus", "East US"]),
            CatalogEntry::new("westeurope", Region, &["westeurope", "West Europe"]),
            CatalogEntry::new("effectivecost", Metric, &["EffectiveCost", "effective cost"]),
            CatalogEntry::new("billedcost", Metric, &["BilledCost", "billed cost"]),
            CatalogEntry::new("listcost", Metric, &["ListCost", "list cost"]),
            CatalogEntry::new("contractedcost", Metric, &["ContractedCost", "contracted cost"]),
            CatalogEntry::new(
                "contractedunitprice",
                Metric,
                &["ContractedUnitPrice", "contracted unit price"],
            ),
            CatalogEntry::new(
                "commitmentdiscountquantity",
                Metric,
                &["CommitmentDiscountQuantity", "commitment discount"],
            ),
            // Tag ids stay short so they CONTAINS-match both "prod" and
            // "Production" tag values.
            CatalogEntry::new("prod", Tag, &["Production", "prod"]),
            CatalogEntry::new(
                "purchase",
                Charge,
                &["Purchase", "Purchases", "commitment", "reservation", "savings plan"],
            ),
        ];
        entries.extend(extra);
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan free text for catalog entities. Case-insensitive match on word
    /// boundaries; overlapping candidates are resolved longest-match-wins;
    /// the result preserves order of first appearance and carries each
    /// canonical id at most once.
    pub fn lookup(&self, text: &str) -> Vec<EntityMention> {
        let lowered = text.to_lowercase();
        let bytes = lowered.as_bytes();

        // Collect candidate spans, longest names first.
        let mut spans: Vec<(usize, usize, usize)> = Vec::new();
        for (name, entry_idx) in &self.patterns {
            let mut from = 0;
            while let Some(pos) = lowered[from..].find(name.as_str()) {
                let start = from + pos;
                let end = start + name.len();
                if on_word_boundary(bytes, start, end) {
                    spans.push((start, end, *entry_idx));
                }
                from = end;
            }
        }

        // Drop spans shadowed by a longer (earlier) candidate.
        let mut kept: Vec<(usize, usize, usize)> = Vec::new();
        for span in spans {
            let overlaps = kept
                .iter()
                .any(|k| span.0 < k.1 && k.0 < span.1);
            if !overlaps {
                kept.push(span);
            }
        }
        kept.sort_by_key(|s| s.0);

        let mut mentions = Vec::new();
        for (start, end, entry_idx) in kept {
            let entry = &self.entries[entry_idx];
            if mentions
                .iter()
                .any(|m: &EntityMention| m.canonical_id == entry.canonical_id)
            {
                continue;
            }
            // Offsets are computed on the lowercased text; fall back to it
            // if lowercasing changed byte lengths (non-ASCII input).
            let surface = text
                .get(start..end)
                .unwrap_or(&lowered[start..end])
                .to_string();
            mentions.push(EntityMention {
                surface_text: surface,
                catalog_type: entry.catalog_type,
                canonical_id: entry.canonical_id.clone(),
            });
        }
        mentions
    }
}

fn on_word_boundary(bytes: &[u8], start: usize, end: usize) -> bool {
    let left_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
    let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
    left_ok && right_ok
}

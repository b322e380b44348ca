use anyhow::Result;
use std::path::Path;
use tracing::info;

use catalog::EntityCatalog;
use harness::{battery, summary_table, BatteryReport, QueryRecord};
use retrieval::{GraphRetriever, Pipeline, PipelineConfig, QueryLLM, VectorRetriever};
use store::{load_catalog_entries, EmbeddingClient, GraphStore, VectorIndexClient};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Runs the fixed query battery end to end against live stores and writes
/// battery_report.json for regression comparison.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let graph = GraphStore::connect(
        &env_or("NEO4J_URI", "bolt://localhost:7687"),
        &env_or("NEO4J_USERNAME", "neo4j"),
        &env_or("NEO4J_PASSWORD", "password"),
    )
    .await?;

    let entries = load_catalog_entries(&graph).await.unwrap_or_default();
    let catalog = EntityCatalog::builtin_with(entries);

    let ollama_url = env_or("OLLAMA_URL", "http://localhost:11434");
    let embeddings = EmbeddingClient::new(ollama_url.clone(), env_or("EMBEDDING_MODEL", "nomic-embed-text"));
    let index = VectorIndexClient::new(
        env_or("QDRANT_URL", "http://localhost:6333"),
        env_or("QDRANT_COLLECTION", "focus_nodes"),
    );
    let llm = QueryLLM::new(ollama_url, env_or("LLM_MODEL", "llama3"), 60);

    let pipeline = Pipeline::new(
        catalog,
        VectorRetriever::new(embeddings, index),
        GraphRetriever::new(graph),
        llm,
        PipelineConfig::default(),
    );

    let queries = battery();
    info!(queries = queries.len(), "running battery");

    let mut records = Vec::new();
    for query in &queries {
        info!(id = query.id, question = query.question, "running query");
        let outcome = pipeline.answer(query.question).await;
        records.push(QueryRecord::from_outcome(
            query.id,
            query.expected_intent,
            query.expected_retrieval,
            &outcome,
        ));
    }

    println!("{}", summary_table(&records));

    let report = BatteryReport::new(records);
    let path = Path::new("battery_report.json");
    report.save(path).await?;
    info!(path = %path.display(), "report saved");

    Ok(())
}

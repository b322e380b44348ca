use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod config;
mod metrics;

use catalog::EntityCatalog;
use config::AppConfig;
use metrics::{Metrics, MetricsSnapshot};
use retrieval::{GraphRetriever, Pipeline, QueryLLM, Stage, VectorRetriever};
use store::{load_catalog_entries, EmbeddingClient, GraphStore, VectorIndexClient};

struct AppState {
    pipeline: Pipeline,
    graph: GraphStore,
    vector_index: VectorIndexClient,
    metrics: Arc<Metrics>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();

    let graph = GraphStore::connect(
        &config.neo4j_uri,
        &config.neo4j_username,
        &config.neo4j_password,
    )
    .await?;

    // Seed the catalog with the graph's actual dimension values; fall back
    // to the builtin list when the store has no data yet.
    let entries = match load_catalog_entries(&graph).await {
        Ok(entries) => {
            info!(entries = entries.len(), "catalog loaded from graph store");
            entries
        }
        Err(e) => {
            tracing::warn!(error = %e, "catalog load failed, using builtin entries only");
            Vec::new()
        }
    };
    let catalog = EntityCatalog::builtin_with(entries);

    let embeddings = EmbeddingClient::new(config.ollama_url.clone(), config.embedding_model.clone());
    let vector_index =
        VectorIndexClient::new(config.qdrant_url.clone(), config.collection_name.clone());
    let vector = VectorRetriever::new(
        embeddings,
        VectorIndexClient::new(config.qdrant_url.clone(), config.collection_name.clone()),
    );
    let graph_retriever = GraphRetriever::new(graph.clone());
    let llm = QueryLLM::new(
        config.ollama_url.clone(),
        config.llm_model.clone(),
        config.generation_timeout_secs,
    );

    let pipeline = Pipeline::new(
        catalog,
        vector,
        graph_retriever,
        llm,
        config.pipeline_config(),
    );

    let state = Arc::new(AppState {
        pipeline,
        graph,
        vector_index,
        metrics: Metrics::new(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/query", post(run_query))
        .route("/concept/:name", get(get_concept))
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    neo4j: String,
    qdrant: String,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let neo4j = match state.graph.verify().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let qdrant = match state.vector_index.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let status = if neo4j == "ok" && qdrant == "ok" {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        neo4j,
        qdrant,
    })
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    outcome: retrieval::QueryOutcome,
    confidence: f32,
}

async fn run_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, StatusCode> {
    if req.question.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let request_id = uuid::Uuid::new_v4();
    info!(%request_id, question = %req.question, "query received");

    let start = Instant::now();
    let outcome = state
        .pipeline
        .answer_with_top_k(&req.question, req.top_k)
        .await;

    let generation_failed = outcome.errors.iter().any(|e| e.stage == Stage::Generation);
    state
        .metrics
        .record_query(start.elapsed(), !outcome.errors.is_empty(), generation_failed);

    info!(
        %request_id,
        intent = outcome.intent.label(),
        retrieval = %outcome.retrieval_method,
        errors = outcome.errors.len(),
        "query answered"
    );

    // Confidence mirrors the UI convention: mean of the top-5 vector scores.
    let top_scores: Vec<f32> = outcome.vector_hits.iter().take(5).map(|h| h.score).collect();
    let confidence = if top_scores.is_empty() {
        0.5
    } else {
        top_scores.iter().sum::<f32>() / top_scores.len() as f32
    };

    Ok(Json(QueryResponse {
        outcome,
        confidence,
    }))
}

#[derive(Serialize)]
struct ConceptResponse {
    name: String,
    label: String,
    description: String,
    related_nodes: Vec<String>,
}

async fn get_concept(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ConceptResponse>, StatusCode> {
    let concept = state
        .graph
        .find_concept(&name)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let related_nodes = state
        .graph
        .related_names(&concept)
        .await
        .unwrap_or_default();

    Ok(Json(ConceptResponse {
        name: concept.name,
        label: concept.label,
        description: concept.description,
        related_nodes,
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    total_nodes: i64,
    total_relationships: i64,
    nodes_by_label: BTreeMap<String, i64>,
    relationships_by_type: BTreeMap<String, i64>,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, StatusCode> {
    let nodes = state
        .graph
        .node_counts()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let relationships = state
        .graph
        .relationship_counts()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let nodes_by_label: BTreeMap<String, i64> = nodes.into_iter().collect();
    let relationships_by_type: BTreeMap<String, i64> = relationships.into_iter().collect();

    Ok(Json(StatsResponse {
        total_nodes: nodes_by_label.values().sum(),
        total_relationships: relationships_by_type.values().sum(),
        nodes_by_label,
        relationships_by_type,
    }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

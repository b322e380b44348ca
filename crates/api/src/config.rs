use retrieval::PipelineConfig;

/// Service configuration, read from the environment with local-development
/// defaults matching the docker-compose setup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub neo4j_uri: String,
    pub neo4j_username: String,
    pub neo4j_password: String,
    pub qdrant_url: String,
    pub collection_name: String,
    pub ollama_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub top_k: usize,
    pub max_evidence: usize,
    pub max_context_chars: usize,
    pub generation_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            neo4j_uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_username: env_or("NEO4J_USERNAME", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "password"),
            qdrant_url: env_or("QDRANT_URL", "http://localhost:6333"),
            collection_name: env_or("QDRANT_COLLECTION", "focus_nodes"),
            ollama_url: env_or("OLLAMA_URL", "http://localhost:11434"),
            embedding_model: env_or("EMBEDDING_MODEL", "nomic-embed-text"),
            llm_model: env_or("LLM_MODEL", "llama3"),
            top_k: env_parse("TOP_K", 8),
            max_evidence: env_parse("MAX_EVIDENCE", 12),
            max_context_chars: env_parse("MAX_CONTEXT_CHARS", 4000),
            generation_timeout_secs: env_parse("GENERATION_TIMEOUT_SECS", 60),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            top_k: self.top_k,
            max_evidence: self.max_evidence,
            max_context_chars: self.max_context_chars,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

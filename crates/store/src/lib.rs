pub mod embeddings;
pub mod graph;
pub mod retry;
pub mod vector_index;

pub use embeddings::EmbeddingClient;
pub use graph::{load_catalog_entries, ConceptNode, GraphRow, GraphStore};
pub use retry::RetryPolicy;
pub use vector_index::{ScoredPoint, VectorIndexClient};

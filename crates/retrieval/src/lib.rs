pub mod context;
pub mod fusion;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod vector;

pub use context::assemble;
pub use fusion::{fuse, EvidenceItem, Origin, RetrievalResult};
pub use graph::{plan, GraphHit, GraphRetriever, TraversalTemplate};
pub use llm::{used_evidence_ids, GenerationError, QueryLLM};
pub use pipeline::{Pipeline, PipelineConfig, QueryOutcome, Stage, StageError};
pub use vector::{eligible_labels, VectorHit, VectorRetriever};

//! Document retrieval and context assembly for research-paper question answering.
//!
//! Text goes in through [`Corpus::ingest`], which writes the [`DocumentStore`] and
//! the [`SparseVectorIndex`] together and snapshots both to JSON. Queries rank
//! stored documents by vector similarity and keyword overlap, and
//! [`assemble_context`] turns the ranking into a bounded, classified context
//! for an external text-generation service.

pub mod classify;
pub mod config;
pub mod corpus;
pub mod error;
pub mod keyword;
pub mod persist;
pub mod prompt;
pub mod store;
pub mod tokenizer;
pub mod vector;

pub use classify::{classify, ContextTag};
pub use config::RagConfig;
pub use corpus::{assemble_context, AssembledContext, Corpus, Durability, QueryRequest, RankBy, RetrievalResult, Strategy};
pub use error::{RagError, Result};
pub use keyword::KeywordHit;
pub use prompt::{build_prompt, GenerationOptions, Prompt, PromptTemplate};
pub use store::{DocMeta, DocumentStore, DocumentSummary, Overview};
pub use vector::{SparseVectorIndex, VectorHit};

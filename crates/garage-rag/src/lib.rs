//! garage-rag: question answering over uploaded PDF documents
//!
//! Uploaded PDFs are split into paragraphs, embedded and appended to a
//! persistent vector index. Questions are embedded the same way, the nearest
//! passages are merged with the question into one prompt and the prompt is
//! sent to a text-generation service.
//!
//! ```text
//! ingest: PdfExtractor -> Embedder -> VectorIndex::insert -> IndexStore::save
//! query:  Embedder -> VectorIndex::search -> ContextBuilder -> Generator
//! ```

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod query;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use index::{IndexStore, SharedIndex, VectorIndex};
pub use query::{QueryEngine, QueryOutcome};
pub use server::RagServer;

//! Core types for the retrieval engine

pub mod passage;
pub mod response;

pub use passage::{IndexEntry, SearchHit, TextUnit, UploadedDocument};
pub use response::{GenerateResponse, IndexInfo, IngestResponse};

//! Query-time retrieval of relevant passages

mod retriever;

pub use retriever::Retriever;

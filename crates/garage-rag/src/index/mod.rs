//! Vector index, its snapshot store and the shared handle used by requests

mod shared;
mod store;
mod vector_index;

pub use shared::SharedIndex;
pub use store::IndexStore;
pub use vector_index::{squared_euclidean, VectorIndex};

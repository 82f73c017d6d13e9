//! Vector Module
//!
//! Embedding storage, vector arithmetic and exact similarity search.

mod search;
mod similarity;
mod space;

pub use search::{NearestNeighborSearch, Neighbor, SearchConfig, SimilarityResult};
pub use similarity::{
    cosine_similarity, dot_product, euclidean_distance, magnitude, Cosine, DotProduct, Euclidean,
    Metric, Similarity,
};
pub use space::{Sign, SpaceConfig, Token, Vector, VectorSpace};

//! vecspace - In-Memory Embedding Space
//!
//! An immutable token -> vector store with vector arithmetic and exact,
//! deterministic top-k similarity search.
//!
//! ```
//! use vecspace::{NearestNeighborSearch, VectorSpace};
//!
//! let space = VectorSpace::new(vec![
//!     ("king", vec![1.0, 1.0]),
//!     ("queen", vec![1.0, 0.9]),
//!     ("man", vec![0.9, 1.0]),
//!     ("woman", vec![0.2, 0.8]),
//! ])?;
//!
//! let search = NearestNeighborSearch::new(&space);
//! let top = search.analogy("man", "king", "woman", 1)?;
//! assert_eq!(top.first().unwrap().token.as_ref(), "queen");
//! # Ok::<(), vecspace::SpaceError>(())
//! ```

pub mod error;
pub mod vector;

pub use error::{Result, SpaceError};
pub use vector::{
    Cosine, DotProduct, Euclidean, Metric, NearestNeighborSearch, Neighbor, SearchConfig, Sign,
    Similarity, SimilarityResult, SpaceConfig, Token, Vector, VectorSpace,
};

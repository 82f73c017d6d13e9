//! Vector Similarity Functions
//!
//! Scalar kernels plus the pluggable [`Similarity`] used by the search.

use std::fmt;
use std::str::FromStr;

use crate::error::SpaceError;

/// Dot product accumulated in f64
///
/// Products of large finite `f32` components overflow `f32` long before they
/// overflow `f64`, so every kernel here widens before multiplying.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut lanes = [0.0f64; 4];
    let (a_chunks, b_chunks) = (a.chunks_exact(4), b.chunks_exact(4));
    let tail = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum::<f64>();

    for (x, y) in a_chunks.zip(b_chunks) {
        for ((lane, &xi), &yi) in lanes.iter_mut().zip(x).zip(y) {
            *lane += xi as f64 * yi as f64;
        }
    }

    lanes.iter().sum::<f64>() + tail
}

/// L2 norm of a vector, in f64
#[inline]
pub fn magnitude(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Compute cosine similarity between two vectors
///
/// Returns a value in `[-1, 1]`, or `None` when either vector has zero
/// magnitude and the angle is undefined.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    cosine_with_norms(a, magnitude(a), b, magnitude(b))
}

#[inline]
fn cosine_with_norms(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> Option<f32> {
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let cosine = dot_product(a, b) / (norm_a * norm_b);
    Some(cosine.clamp(-1.0, 1.0) as f32)
}

/// Euclidean distance, in f64
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// A similarity function where a higher score means "closer".
///
/// Norms are passed in so a store can compute them once per vector rather
/// than once per comparison.
pub trait Similarity: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether a zero-norm vector makes the score undefined
    fn requires_nonzero_norm(&self) -> bool {
        false
    }

    /// Score `candidate` against `query`; `None` if undefined for these inputs
    ///
    /// Finite inputs must never produce a NaN score.
    fn score(
        &self,
        query: &[f32],
        query_norm: f64,
        candidate: &[f32],
        candidate_norm: f64,
    ) -> Option<f32>;
}

/// Cosine similarity, the default metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cosine;

impl Similarity for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn requires_nonzero_norm(&self) -> bool {
        true
    }

    #[inline]
    fn score(
        &self,
        query: &[f32],
        query_norm: f64,
        candidate: &[f32],
        candidate_norm: f64,
    ) -> Option<f32> {
        cosine_with_norms(query, query_norm, candidate, candidate_norm)
    }
}

/// Raw inner product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DotProduct;

impl Similarity for DotProduct {
    fn name(&self) -> &'static str {
        "dot"
    }

    #[inline]
    fn score(&self, query: &[f32], _: f64, candidate: &[f32], _: f64) -> Option<f32> {
        Some(dot_product(query, candidate) as f32)
    }
}

/// Negated Euclidean distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl Similarity for Euclidean {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    #[inline]
    fn score(&self, query: &[f32], _: f64, candidate: &[f32], _: f64) -> Option<f32> {
        Some(-euclidean_distance(query, candidate) as f32)
    }
}

/// Runtime-selectable metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl Similarity for Metric {
    fn name(&self) -> &'static str {
        match self {
            Metric::Cosine => Cosine.name(),
            Metric::Dot => DotProduct.name(),
            Metric::Euclidean => Euclidean.name(),
        }
    }

    fn requires_nonzero_norm(&self) -> bool {
        matches!(self, Metric::Cosine)
    }

    #[inline]
    fn score(
        &self,
        query: &[f32],
        query_norm: f64,
        candidate: &[f32],
        candidate_norm: f64,
    ) -> Option<f32> {
        match self {
            Metric::Cosine => Cosine.score(query, query_norm, candidate, candidate_norm),
            Metric::Dot => DotProduct.score(query, query_norm, candidate, candidate_norm),
            Metric::Euclidean => Euclidean.score(query, query_norm, candidate, candidate_norm),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Ok(Metric::Cosine),
            "dot" | "inner" => Ok(Metric::Dot),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(SpaceError::InvalidArgument(format!(
                "unknown metric '{}', expected cosine, dot or euclidean",
                other
            ))),
        }
    }
}

//! Nearest Neighbor Search
//!
//! Exact top-k search over a [`VectorSpace`]. Every eligible token is scored;
//! a bounded min-heap of size k keeps the best candidates seen so far.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

use hashbrown::HashSet;
use tracing::debug;

use super::similarity::{magnitude, Cosine, Similarity};
use super::space::{Sign, Token, VectorSpace};
use crate::error::{Result, SpaceError};

/// A ranked token
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub token: Token,
    pub score: f32,
}

/// Tokens ranked by descending score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityResult {
    hits: Vec<Neighbor>,
}

impl SimilarityResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Best match, if any
    pub fn first(&self) -> Option<&Neighbor> {
        self.hits.first()
    }

    pub fn get(&self, i: usize) -> Option<&Neighbor> {
        self.hits.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.hits.iter()
    }

    /// Ranked tokens without scores
    pub fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.hits.iter().map(|n| n.token.as_ref())
    }

    pub fn into_vec(self) -> Vec<Neighbor> {
        self.hits
    }
}

impl IntoIterator for SimilarityResult {
    type Item = Neighbor;
    type IntoIter = std::vec::IntoIter<Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'r> IntoIterator for &'r SimilarityResult {
    type Item = &'r Neighbor;
    type IntoIter = std::slice::Iter<'r, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// Search configuration
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    /// Drop candidates scoring below this value
    pub min_score: Option<f32>,
    /// Batch worker threads (0 = auto-detect)
    pub workers: usize,
}

impl SearchConfig {
    /// A NaN threshold is rejected by every query with `InvalidArgument`
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Heap entry. "Greater" means a better match: higher score, then earlier
/// insertion position.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    score: f32,
    index: usize,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Exact top-k search over a borrowed vector space
pub struct NearestNeighborSearch<'a, S = Cosine> {
    space: &'a VectorSpace,
    similarity: S,
    config: SearchConfig,
}

impl<'a> NearestNeighborSearch<'a, Cosine> {
    /// Cosine search with default configuration
    pub fn new(space: &'a VectorSpace) -> Self {
        Self::with_similarity(space, Cosine)
    }
}

impl<'a, S: Similarity> NearestNeighborSearch<'a, S> {
    pub fn with_similarity(space: &'a VectorSpace, similarity: S) -> Self {
        Self {
            space,
            similarity,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn space(&self) -> &'a VectorSpace {
        self.space
    }

    pub fn similarity(&self) -> &S {
        &self.similarity
    }

    /// Top-k tokens for `vector`
    pub fn query(&self, vector: &[f32], k: usize) -> Result<SimilarityResult> {
        self.rank(vector, k, &HashSet::new())
    }

    /// Top-k tokens for `vector`, never returning a token in `exclude`
    ///
    /// Excluded tokens are not scored at all. Names that are not in the
    /// vocabulary are ignored. When fewer than k tokens remain eligible, all
    /// of them are returned.
    pub fn query_excluding(
        &self,
        vector: &[f32],
        k: usize,
        exclude: &[&str],
    ) -> Result<SimilarityResult> {
        self.rank(vector, k, &self.excluded(exclude))
    }

    /// Run independent queries on a scoped worker pool
    ///
    /// Results come back in input order and are identical to calling
    /// [`query_excluding`](Self::query_excluding) for each vector.
    pub fn query_batch<V>(
        &self,
        queries: &[V],
        k: usize,
        exclude: &[&str],
    ) -> Vec<Result<SimilarityResult>>
    where
        V: AsRef<[f32]> + Sync,
    {
        let excluded = self.excluded(exclude);
        let workers = self.config.worker_count().min(queries.len()).max(1);

        debug!(
            queries = queries.len(),
            workers,
            metric = self.similarity.name(),
            "Batch query"
        );

        if workers == 1 {
            return queries
                .iter()
                .map(|q| self.rank(q.as_ref(), k, &excluded))
                .collect();
        }

        let chunk_size = queries.len().div_ceil(workers);
        let excluded = &excluded;
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = queries
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move |_| {
                        chunk
                            .iter()
                            .map(|q| self.rank(q.as_ref(), k, excluded))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }

    /// Tokens closest to `sum(positive) - sum(negative)`
    ///
    /// Positives are applied first, then negatives, each in the given order.
    /// All input tokens are excluded from the result.
    pub fn most_similar(
        &self,
        positive: &[&str],
        negative: &[&str],
        k: usize,
    ) -> Result<SimilarityResult> {
        if positive.is_empty() && negative.is_empty() {
            return Err(SpaceError::InvalidArgument(
                "most_similar requires at least one positive or negative token".to_string(),
            ));
        }

        let terms: Vec<(&str, Sign)> = positive
            .iter()
            .map(|&t| (t, Sign::Plus))
            .chain(negative.iter().map(|&t| (t, Sign::Minus)))
            .collect();
        let query = self.space.combine_tokens(&terms)?;

        let exclude: Vec<&str> = terms.iter().map(|&(t, _)| t).collect();
        self.query_excluding(&query, k, &exclude)
    }

    /// "`a` is to `b` as `c` is to ?"
    ///
    /// Evaluates `b - a + c` in that order and excludes the three inputs.
    pub fn analogy(&self, a: &str, b: &str, c: &str, k: usize) -> Result<SimilarityResult> {
        let query = self
            .space
            .combine_tokens(&[(b, Sign::Plus), (a, Sign::Minus), (c, Sign::Plus)])?;
        self.query_excluding(&query, k, &[a, b, c])
    }

    /// Score between two tokens under this search's metric
    pub fn similarity_between(&self, first: &str, second: &str) -> Result<f32> {
        let a = self.space.get(first)?;
        let b = self.space.get(second)?;
        let (norm_a, norm_b) = (self.space.norm(first)?, self.space.norm(second)?);

        self.similarity
            .score(a, norm_a, b, norm_b)
            .ok_or_else(|| {
                SpaceError::DegenerateVector(format!(
                    "{} similarity between '{}' and '{}' is undefined",
                    self.similarity.name(),
                    first,
                    second
                ))
            })
    }

    fn excluded(&self, exclude: &[&str]) -> HashSet<usize> {
        exclude
            .iter()
            .filter_map(|token| self.space.position(token))
            .collect()
    }

    fn rank(&self, query: &[f32], k: usize, excluded: &HashSet<usize>) -> Result<SimilarityResult> {
        let start = Instant::now();

        self.space.check_dimension(query)?;
        if k == 0 {
            return Err(SpaceError::InvalidArgument("k must be at least 1".to_string()));
        }
        if let Some(i) = query.iter().position(|x| !x.is_finite()) {
            return Err(SpaceError::InvalidArgument(format!(
                "query has a non-finite component at index {}",
                i
            )));
        }

        let query_norm = magnitude(query);
        if query_norm == 0.0 && self.similarity.requires_nonzero_norm() {
            return Err(SpaceError::DegenerateVector(format!(
                "query vector has zero norm, {} similarity is undefined",
                self.similarity.name()
            )));
        }

        if self.config.min_score.is_some_and(f32::is_nan) {
            return Err(SpaceError::InvalidArgument(
                "min_score must not be NaN".to_string(),
            ));
        }

        // Never hold more than the eligible tokens, whatever k the caller asks for
        let k = k.min(self.space.len().saturating_sub(excluded.len()));
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k);
        let mut eligible = 0usize;

        for index in 0..self.space.len() {
            if excluded.contains(&index) {
                continue;
            }
            eligible += 1;

            let score = self
                .similarity
                .score(query, query_norm, self.space.row(index), self.space.norm_at(index))
                .filter(|score| !score.is_nan())
                .ok_or_else(|| {
                    SpaceError::DegenerateVector(format!(
                        "{} similarity is undefined for token '{}'",
                        self.similarity.name(),
                        self.space.token_at(index)
                    ))
                })?;

            if self.config.min_score.is_some_and(|min| score < min) {
                continue;
            }

            let candidate = Ranked { score, index };
            if heap.len() < k {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if candidate > *worst {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
        }

        // Ascending Reverse<Ranked> is best-first
        let hits: Vec<Neighbor> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| Neighbor {
                token: self.space.token_at(r.index).clone(),
                score: r.score,
            })
            .collect();

        debug!(
            k,
            eligible,
            hits = hits.len(),
            metric = self.similarity.name(),
            latency = ?start.elapsed(),
            "Query executed"
        );

        Ok(SimilarityResult { hits })
    }
}

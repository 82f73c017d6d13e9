//! Vector Space
//!
//! Immutable token -> vector store. Vectors are kept in one row-major buffer
//! in insertion order; the hash index only maps a token to its row.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use tracing::info;

use super::similarity::magnitude;
use crate::error::{Result, SpaceError};

/// Vocabulary entry
pub type Token = Arc<str>;

/// Owned embedding vector
pub type Vector = Vec<f32>;

/// Sign of a term in [`VectorSpace::combine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    #[inline]
    fn apply(self, acc: f32, x: f32) -> f32 {
        match self {
            Sign::Plus => acc + x,
            Sign::Minus => acc - x,
        }
    }
}

impl TryFrom<i32> for Sign {
    type Error = SpaceError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Sign::Plus),
            -1 => Ok(Sign::Minus),
            other => Err(SpaceError::InvalidArgument(format!(
                "sign must be +1 or -1, got {}",
                other
            ))),
        }
    }
}

/// Vector space configuration
#[derive(Debug, Clone)]
pub struct SpaceConfig {
    /// Exact-match tokens; when false tokens are folded to lowercase
    pub case_sensitive: bool,
    /// Expected dimension (None = take it from the first entry)
    pub dimension: Option<usize>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            dimension: None,
        }
    }
}

impl SpaceConfig {
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

struct Inner {
    tokens: Vec<Token>,
    /// Folded token -> row
    index: HashMap<Box<str>, usize>,
    /// Row-major, `tokens.len() * dimension`
    vectors: Vec<f32>,
    norms: Vec<f64>,
    dimension: usize,
    case_sensitive: bool,
}

/// Immutable embedding store
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone)]
pub struct VectorSpace {
    inner: Arc<Inner>,
}

impl VectorSpace {
    /// Build a case-sensitive space, taking the dimension from the first entry
    pub fn new<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vector)>,
        K: Into<Token>,
    {
        Self::with_config(entries, SpaceConfig::default())
    }

    /// Build a space from an ordered token -> vector mapping
    ///
    /// Fails on an empty mapping, a zero dimension, inconsistent vector
    /// lengths, duplicate tokens (after case folding) and non-finite
    /// components.
    pub fn with_config<I, K>(entries: I, config: SpaceConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vector)>,
        K: Into<Token>,
    {
        if config.dimension == Some(0) {
            return Err(SpaceError::Construction(
                "dimension must be at least 1".to_string(),
            ));
        }

        let entries = entries.into_iter();
        let mut tokens: Vec<Token> = Vec::with_capacity(entries.size_hint().0);
        let mut index: HashMap<Box<str>, usize> = HashMap::with_capacity(entries.size_hint().0);
        let mut vectors = Vec::new();
        let mut norms = Vec::with_capacity(entries.size_hint().0);
        let mut dimension = config.dimension;

        for (token, vector) in entries {
            let token: Token = token.into();
            let expected = *dimension.get_or_insert(vector.len());

            if expected == 0 {
                return Err(SpaceError::Construction(format!(
                    "token '{}' has an empty vector",
                    token
                )));
            }
            if vector.len() != expected {
                return Err(SpaceError::Construction(format!(
                    "token '{}' has {} components, expected {}",
                    token,
                    vector.len(),
                    expected
                )));
            }
            if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
                return Err(SpaceError::Construction(format!(
                    "token '{}' has a non-finite component at index {}",
                    token, i
                )));
            }

            let key = fold(&token, config.case_sensitive).into_owned().into_boxed_str();
            match index.entry(key) {
                Entry::Occupied(existing) => {
                    return Err(SpaceError::Construction(format!(
                        "duplicate token '{}' (collides with '{}')",
                        token, tokens[*existing.get()]
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(tokens.len());
                }
            }

            norms.push(magnitude(&vector));
            vectors.extend_from_slice(&vector);
            tokens.push(token);
        }

        let dimension = match dimension {
            Some(d) if !tokens.is_empty() => d,
            _ => {
                return Err(SpaceError::Construction(
                    "token -> vector mapping is empty".to_string(),
                ))
            }
        };

        info!(
            tokens = tokens.len(),
            dimension,
            case_sensitive = config.case_sensitive,
            "Vector space constructed"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                tokens,
                index,
                vectors,
                norms,
                dimension,
                case_sensitive: config.case_sensitive,
            }),
        })
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.inner.dimension
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.inner.tokens.len()
    }

    /// Always false for a constructed space
    pub fn is_empty(&self) -> bool {
        self.inner.tokens.is_empty()
    }

    pub fn case_sensitive(&self) -> bool {
        self.inner.case_sensitive
    }

    /// Insertion position of a token
    pub fn position(&self, token: &str) -> Option<usize> {
        let key = fold(token, self.inner.case_sensitive);
        self.inner.index.get(key.as_ref()).copied()
    }

    /// Check if token exists
    pub fn contains(&self, token: &str) -> bool {
        self.position(token).is_some()
    }

    /// Look up the vector of a token
    pub fn get(&self, token: &str) -> Result<&[f32]> {
        self.position(token)
            .map(|i| self.row(i))
            .ok_or_else(|| SpaceError::UnknownToken(token.to_string()))
    }

    /// L2 norm of a token's vector
    pub fn norm(&self, token: &str) -> Result<f64> {
        self.position(token)
            .map(|i| self.inner.norms[i])
            .ok_or_else(|| SpaceError::UnknownToken(token.to_string()))
    }

    /// Tokens in insertion order
    pub fn tokens(&self) -> impl ExactSizeIterator<Item = &Token> + '_ {
        self.inner.tokens.iter()
    }

    /// `(token, vector)` pairs in insertion order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Token, &[f32])> + '_ {
        self.inner
            .tokens
            .iter()
            .zip(self.inner.vectors.chunks_exact(self.inner.dimension))
    }

    /// Fail unless `vector` has the space dimension
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.inner.dimension {
            Ok(())
        } else {
            Err(SpaceError::dimension_mismatch(
                self.inner.dimension,
                vector.len(),
            ))
        }
    }

    /// Element-wise `a + b`
    pub fn add(&self, a: &[f32], b: &[f32]) -> Result<Vector> {
        self.combine([(a, Sign::Plus), (b, Sign::Plus)])
    }

    /// Element-wise `a - b`
    pub fn subtract(&self, a: &[f32], b: &[f32]) -> Result<Vector> {
        self.combine([(a, Sign::Plus), (b, Sign::Minus)])
    }

    /// Ordered sum of signed terms
    ///
    /// Starts from the zero vector and applies the terms strictly in the
    /// given order, so `[(a, +), (b, -), (c, +)]` computes `((0 + a) - b) + c`
    /// component by component.
    pub fn combine<I, V>(&self, terms: I) -> Result<Vector>
    where
        I: IntoIterator<Item = (V, Sign)>,
        V: AsRef<[f32]>,
    {
        let mut acc = vec![0.0f32; self.inner.dimension];
        let mut count = 0usize;

        for (term, sign) in terms {
            let term = term.as_ref();
            self.check_dimension(term)?;
            for (slot, &x) in acc.iter_mut().zip(term) {
                *slot = sign.apply(*slot, x);
            }
            count += 1;
        }

        if count == 0 {
            return Err(SpaceError::InvalidArgument(
                "combine requires at least one term".to_string(),
            ));
        }
        Ok(acc)
    }

    /// [`combine`](Self::combine) over looked-up tokens
    pub fn combine_tokens(&self, terms: &[(&str, Sign)]) -> Result<Vector> {
        let resolved = terms
            .iter()
            .map(|&(token, sign)| self.get(token).map(|v| (v, sign)))
            .collect::<Result<Vec<_>>>()?;
        self.combine(resolved)
    }

    #[inline]
    pub(crate) fn row(&self, i: usize) -> &[f32] {
        let d = self.inner.dimension;
        &self.inner.vectors[i * d..(i + 1) * d]
    }

    #[inline]
    pub(crate) fn norm_at(&self, i: usize) -> f64 {
        self.inner.norms[i]
    }

    #[inline]
    pub(crate) fn token_at(&self, i: usize) -> &Token {
        &self.inner.tokens[i]
    }
}

impl fmt::Debug for VectorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorSpace")
            .field("tokens", &self.len())
            .field("dimension", &self.dimension())
            .field("case_sensitive", &self.case_sensitive())
            .finish()
    }
}

fn fold(token: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(token.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn royalty() -> VectorSpace {
        VectorSpace::new(vec![
            ("king", vec![1.0, 1.0]),
            ("queen", vec![1.0, 0.9]),
            ("man", vec![0.9, 1.0]),
            ("woman", vec![0.2, 0.8]),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_returns_construction_vector() {
        let input = vec![
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![-4.5, 0.0, 6.25]),
            ("c", vec![0.1, 0.2, 0.3]),
        ];
        let space = VectorSpace::new(input.clone()).unwrap();

        assert_eq!(space.dimension(), 3);
        assert_eq!(space.len(), 3);
        for (token, vector) in &input {
            let got = space.get(token).unwrap();
            assert_eq!(got.len(), 3);
            assert_eq!(got, vector.as_slice());
        }
    }

    #[test]
    fn test_unknown_token() {
        let space = royalty();
        assert_eq!(
            space.get("prince"),
            Err(SpaceError::UnknownToken("prince".to_string()))
        );
        assert!(!space.contains("prince"));
        assert!(matches!(space.norm("prince"), Err(SpaceError::UnknownToken(_))));
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let result = VectorSpace::new(Vec::<(&str, Vector)>::new());
        assert!(matches!(result, Err(SpaceError::Construction(_))));

        let result = VectorSpace::with_config(
            Vec::<(&str, Vector)>::new(),
            SpaceConfig::default().with_dimension(4),
        );
        assert!(matches!(result, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_inconsistent_dimension_rejected() {
        let result = VectorSpace::new(vec![("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0, 0.0])]);
        assert!(matches!(result, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_explicit_dimension() {
        let result = VectorSpace::with_config(
            vec![("a", vec![1.0, 0.0])],
            SpaceConfig::default().with_dimension(3),
        );
        assert!(matches!(result, Err(SpaceError::Construction(_))));

        let space = VectorSpace::with_config(
            vec![("a", vec![1.0, 0.0, 0.0])],
            SpaceConfig::default().with_dimension(3),
        )
        .unwrap();
        assert_eq!(space.dimension(), 3);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = VectorSpace::new(vec![("a", Vec::new())]);
        assert!(matches!(result, Err(SpaceError::Construction(_))));

        let result = VectorSpace::with_config(
            vec![("a", vec![1.0])],
            SpaceConfig::default().with_dimension(0),
        );
        assert!(matches!(result, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let result = VectorSpace::new(vec![("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(result, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = VectorSpace::new(vec![("a", vec![1.0, f32::NAN])]);
        assert!(matches!(result, Err(SpaceError::Construction(_))));

        let result = VectorSpace::new(vec![("a", vec![f32::INFINITY, 1.0])]);
        assert!(matches!(result, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let space = VectorSpace::new(vec![("King", vec![1.0]), ("king", vec![2.0])]).unwrap();
        assert_eq!(space.get("King").unwrap(), &[1.0]);
        assert_eq!(space.get("king").unwrap(), &[2.0]);
        assert!(space.get("KING").is_err());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let config = SpaceConfig::default().with_case_sensitive(false);
        let space = VectorSpace::with_config(vec![("Paris", vec![1.0, 2.0])], config.clone())
            .unwrap();
        assert_eq!(space.get("paris").unwrap(), &[1.0, 2.0]);
        assert_eq!(space.get("PARIS").unwrap(), &[1.0, 2.0]);
        assert_eq!(space.tokens().next().unwrap().as_ref(), "Paris");

        let collision =
            VectorSpace::with_config(vec![("Paris", vec![1.0]), ("paris", vec![2.0])], config);
        assert!(matches!(collision, Err(SpaceError::Construction(_))));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let names = ["zeta", "alpha", "mu", "beta", "omega"];
        let space =
            VectorSpace::new(names.iter().enumerate().map(|(i, n)| (*n, vec![i as f32 + 1.0])))
                .unwrap();

        let tokens: Vec<&str> = space.tokens().map(|t| t.as_ref()).collect();
        assert_eq!(tokens, names);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(space.position(name), Some(i));
        }
        let rows: Vec<f32> = space.iter().map(|(_, v)| v[0]).collect();
        assert_eq!(rows, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_norms_precomputed() {
        let space = VectorSpace::new(vec![("a", vec![3.0, 4.0]), ("z", vec![0.0, 0.0])]).unwrap();
        assert_eq!(space.norm("a").unwrap(), 5.0);
        assert_eq!(space.norm("z").unwrap(), 0.0);
    }

    #[test]
    fn test_add_subtract() {
        let space = royalty();
        let a = [1.0f32, 2.0];
        let b = [0.5f32, -1.0];
        assert_eq!(space.add(&a, &b).unwrap(), vec![1.5, 1.0]);
        assert_eq!(space.subtract(&a, &b).unwrap(), vec![0.5, 3.0]);
        // inputs untouched
        assert_eq!(a, [1.0, 2.0]);
    }

    #[test]
    fn test_arithmetic_dimension_mismatch() {
        let space = royalty();
        assert_eq!(
            space.add(&[1.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(SpaceError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert!(matches!(
            space.subtract(&[1.0], &[1.0, 2.0]),
            Err(SpaceError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            space.combine([(vec![1.0, 2.0], Sign::Plus), (vec![1.0], Sign::Minus)]),
            Err(SpaceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_combine_matches_direct_arithmetic() {
        let space = VectorSpace::new(vec![
            ("a", vec![3.0, -2.0, 7.0]),
            ("b", vec![1.0, 5.0, -4.0]),
            ("c", vec![-6.0, 2.0, 8.0]),
        ])
        .unwrap();
        let a = space.get("a").unwrap();
        let b = space.get("b").unwrap();
        let c = space.get("c").unwrap();

        let combined = space
            .combine([(a, Sign::Plus), (b, Sign::Minus), (c, Sign::Plus)])
            .unwrap();
        let direct: Vec<f32> = (0..3).map(|i| a[i] - b[i] + c[i]).collect();
        assert_eq!(combined, direct);
        assert_eq!(combined, vec![-4.0, -5.0, 19.0]);
    }

    #[test]
    fn test_combine_leading_minus_and_empty() {
        let space = royalty();
        assert_eq!(
            space.combine([(vec![1.0, -2.0], Sign::Minus)]).unwrap(),
            vec![-1.0, 2.0]
        );
        assert!(matches!(
            space.combine(Vec::<(Vector, Sign)>::new()),
            Err(SpaceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_combine_tokens_analogy() {
        let space = royalty();
        let result = space
            .combine_tokens(&[("king", Sign::Plus), ("man", Sign::Minus), ("woman", Sign::Plus)])
            .unwrap();
        assert!((result[0] - 0.3).abs() < 1e-6);
        assert!((result[1] - 0.8).abs() < 1e-6);

        assert!(matches!(
            space.combine_tokens(&[("king", Sign::Plus), ("jester", Sign::Minus)]),
            Err(SpaceError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_sign_from_int() {
        assert_eq!(Sign::try_from(1).unwrap(), Sign::Plus);
        assert_eq!(Sign::try_from(-1).unwrap(), Sign::Minus);
        assert!(matches!(Sign::try_from(0), Err(SpaceError::InvalidArgument(_))));
        assert!(matches!(Sign::try_from(2), Err(SpaceError::InvalidArgument(_))));
    }

    #[test]
    fn test_clone_shares_storage() {
        let space = royalty();
        let other = space.clone();
        assert!(Arc::ptr_eq(&space.inner, &other.inner));
        assert_eq!(
            format!("{:?}", other),
            "VectorSpace { tokens: 4, dimension: 2, case_sensitive: true }"
        );
    }

    #[test]
    fn test_concurrent_reads() {
        let space = royalty();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let space = space.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(space.get("queen").unwrap(), &[1.0, 0.9]);
                        space
                            .combine_tokens(&[("king", Sign::Plus), ("man", Sign::Minus)])
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

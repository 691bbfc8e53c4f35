/* src/mock_data.rs */
#![warn(missing_docs)]
//! # Mock Embeddings
//!
//! Reproducible synthetic embeddings standing in for the output of a text encoder:
//! L2-normalized rows drawn uniformly from `[0, 1)` and near-duplicates perturbed with
//! Gaussian noise.
//!
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use ndarray::{Array1, Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::vault_codex::{Result, VaultError};

/// Default standard deviation of the noise used by [`MockDataGenerator::create_similar_pair`].
pub const DEFAULT_PAIR_NOISE: f64 = 0.01;

/// Seeded generator of fake embedding vectors.
#[derive(Debug, Clone)]
pub struct MockDataGenerator {
    dimension: usize,
    rng: StdRng,
}

impl MockDataGenerator {
    /// Creates a generator for `dimension`-length vectors.
    pub fn new(dimension: usize, rng_seed: u64) -> Self {
        Self {
            dimension,
            rng: StdRng::seed_from_u64(rng_seed),
        }
    }

    /// Vector length produced by this generator.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vector with components drawn uniformly from `[low, high)`.
    pub fn random_vector(&mut self, low: f64, high: f64) -> Array1<f64> {
        let span = high - low;
        Array1::from_shape_fn(self.dimension, |_| low + span * self.rng.random::<f64>())
    }

    /// Uniform `[0, 1)` vector scaled to unit length.
    pub fn random_unit_vector(&mut self) -> Array1<f64> {
        normalize(self.random_vector(0.0, 1.0))
    }

    /// `num_documents × dimension` matrix of unit-length rows.
    pub fn generate_embeddings(&mut self, num_documents: usize) -> Array2<f64> {
        let mut embeddings = Array2::<f64>::zeros((num_documents, self.dimension));
        for mut row in embeddings.rows_mut() {
            row.assign(&self.random_unit_vector());
        }
        embeddings
    }

    /// `normalize(vector + N(0, sigma))`.
    pub fn near_duplicate(&mut self, vector: ArrayView1<'_, f64>, sigma: f64) -> Result<Array1<f64>> {
        if vector.len() != self.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        if !(sigma >= 0.0 && sigma.is_finite()) {
            return Err(VaultError::InvalidInput {
                message: format!("noise sigma must be finite and non-negative, got {sigma}"),
            });
        }
        let noise = Normal::new(0.0, sigma).map_err(|e| VaultError::InvalidInput {
            message: format!("noise sigma {sigma}: {e}"),
        })?;
        let rng = &mut self.rng;
        let perturbed = vector.mapv(|x| x + noise.sample(rng));
        Ok(normalize(perturbed))
    }

    /// A unit vector and a close neighbor of it (noise σ = 0.01).
    pub fn create_similar_pair(&mut self) -> Result<(Array1<f64>, Array1<f64>)> {
        let a = self.random_unit_vector();
        let b = self.near_duplicate(a.view(), DEFAULT_PAIR_NOISE)?;
        Ok((a, b))
    }
}

fn normalize(vector: Array1<f64>) -> Array1<f64> {
    let norm = vector.dot(&vector).sqrt();
    if norm == 0.0 {
        vector
    } else {
        vector / norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault_codex::cosine_similarity;

    #[test]
    fn test_embeddings_are_unit_rows() {
        let mut generator = MockDataGenerator::new(64, 1);
        let embeddings = generator.generate_embeddings(10);
        assert_eq!(embeddings.dim(), (10, 64));
        for row in embeddings.rows() {
            assert!((row.dot(&row).sqrt() - 1.0).abs() < 1e-12);
            assert!(row.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_same_rng_seed_reproduces_data() {
        let a = MockDataGenerator::new(16, 42).generate_embeddings(5);
        let b = MockDataGenerator::new(16, 42).generate_embeddings(5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_similar_pair_is_close() {
        let mut generator = MockDataGenerator::new(128, 9);
        let (a, b) = generator.create_similar_pair().unwrap();
        let similarity = cosine_similarity(a.view(), b.view());
        assert!(similarity > 0.98, "pair similarity {similarity}");
        assert!(similarity < 1.0);
    }

    #[test]
    fn test_random_vector_respects_bounds() {
        let mut generator = MockDataGenerator::new(256, 4);
        let v = generator.random_vector(-2.0, 3.0);
        assert!(v.iter().all(|&x| (-2.0..3.0).contains(&x)));
    }

    #[test]
    fn test_near_duplicate_rejects_bad_input() {
        let mut generator = MockDataGenerator::new(4, 0);
        let wrong = Array1::<f64>::ones(5);
        assert!(matches!(
            generator.near_duplicate(wrong.view(), 0.01),
            Err(VaultError::DimensionMismatch { expected: 4, found: 5 })
        ));
        let ok = Array1::<f64>::ones(4);
        assert!(matches!(
            generator.near_duplicate(ok.view(), -1.0),
            Err(VaultError::InvalidInput { .. })
        ));
        for sigma in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                generator.near_duplicate(ok.view(), sigma),
                Err(VaultError::InvalidInput { .. })
            ));
        }
        assert!(generator.near_duplicate(ok.view(), 0.0).is_ok());
    }
}

/* src/chaos_key.rs */
#![warn(missing_docs)]
//! # Chaos Key: Logistic-Map Key Derivation
//!
//! Turns a scalar seed into a square orthogonal matrix in two stateless steps:
//!
//! 1. Iterate the logistic map `x_{n+1} = r · x_n · (1 − x_n)` from `x_0 = seed` to obtain
//!    `size²` values in `[0, 1]`.
//! 2. Fill a `size × size` matrix row-major with those values and keep the orthogonal
//!    factor `Q` of its Householder QR decomposition.
//!
//! Identical `(seed, r, size)` always yields the identical matrix. The sign pattern of `Q`
//! follows the decomposition convention and is not canonical; orthogonality is the only
//! invariant callers may rely on.
//!
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use faer::Mat;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

/// Errors raised while deriving a key matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChaosKeyError {
    /// A zero-sized key was requested.
    #[error("Key dimension must be at least 1")]
    EmptyDimension,

    /// `size²` does not fit in `usize`.
    #[error("Key dimension {size} overflows the sequence length")]
    DimensionOverflow {
        /// Requested key dimension
        size: usize,
    },

    /// The raw matrix handed to the orthogonalizer is not square.
    #[error("Raw key matrix must be square, got {rows}x{cols}")]
    NotSquare {
        /// Row count of the raw matrix
        rows: usize,
        /// Column count of the raw matrix
        cols: usize,
    },

    /// The map escaped `[0, 1]` and produced a NaN or infinity, which only happens for a
    /// control parameter outside `(0, 4]` or a seed outside `[0, 1]`.
    #[error("Chaotic sequence is not finite at index {index}")]
    NonFiniteSequence {
        /// First offending position in the row-major sequence
        index: usize,
    },
}

/// Orthogonal key together with the conditioning diagnostic of its raw matrix.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    /// Orthogonal factor `Q` of the raw matrix.
    pub key: Array2<f64>,
    /// `min |R_ii| / max |R_ii|` of the discarded triangular factor. Values near zero mean
    /// the raw matrix was numerically rank-deficient; `Q` is still orthogonal.
    pub degeneracy_ratio: f64,
}

/// Iterates the logistic map `length` times starting from `seed`.
///
/// The seed itself is not part of the output. No range checks are made here: a control
/// parameter in the periodic regime (well below ~3.57) is accepted and simply produces a
/// weak, low-period sequence.
pub fn generate_sequence(seed: f64, control_parameter: f64, length: usize) -> Vec<f64> {
    let mut sequence = Vec::with_capacity(length);
    let mut current = seed;
    for _ in 0..length {
        current = control_parameter * current * (1.0 - current);
        sequence.push(current);
    }
    sequence
}

/// Derives a `size × size` orthogonal matrix from the chaotic sequence of `seed`.
pub fn generate_orthogonal_matrix(
    seed: f64,
    control_parameter: f64,
    size: usize,
) -> Result<Array2<f64>, ChaosKeyError> {
    derive_key(seed, control_parameter, size).map(|derivation| derivation.key)
}

/// Same as [`generate_orthogonal_matrix`] but also returns the degeneracy diagnostic.
pub fn derive_key(
    seed: f64,
    control_parameter: f64,
    size: usize,
) -> Result<KeyDerivation, ChaosKeyError> {
    if size == 0 {
        return Err(ChaosKeyError::EmptyDimension);
    }
    let total = size
        .checked_mul(size)
        .ok_or(ChaosKeyError::DimensionOverflow { size })?;

    let sequence = generate_sequence(seed, control_parameter, total);
    if let Some(index) = sequence.iter().position(|x| !x.is_finite()) {
        return Err(ChaosKeyError::NonFiniteSequence { index });
    }

    let raw = Array2::from_shape_vec((size, size), sequence)
        .map_err(|_| ChaosKeyError::DimensionOverflow { size })?;
    key_matrix_from_raw(raw.view())
}

/// Orthogonalizes a square raw matrix with a Householder QR decomposition.
///
/// `R` is not kept, but its diagonal is recovered as `diag(Qᵗ·A)` to report how close the
/// raw matrix was to singular.
pub fn key_matrix_from_raw(raw: ArrayView2<'_, f64>) -> Result<KeyDerivation, ChaosKeyError> {
    let (rows, cols) = raw.dim();
    if rows != cols {
        return Err(ChaosKeyError::NotSquare { rows, cols });
    }
    if rows == 0 {
        return Err(ChaosKeyError::EmptyDimension);
    }

    let a = Mat::<f64>::from_fn(rows, cols, |i, j| raw[[i, j]]);
    let q = a.qr().compute_Q();
    let key = Array2::from_shape_fn((rows, cols), |(i, j)| q[(i, j)]);

    let r = key.t().dot(&raw);
    let (min_diag, max_diag) = r
        .diag()
        .iter()
        .map(|value| value.abs())
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let degeneracy_ratio = if max_diag > 0.0 { min_diag / max_diag } else { 0.0 };

    Ok(KeyDerivation { key, degeneracy_ratio })
}

/// Largest entry of `|QᵗQ − I|`.
pub fn orthogonality_error(q: ArrayView2<'_, f64>) -> f64 {
    let gram = q.t().dot(&q);
    gram.indexed_iter()
        .map(|((i, j), value)| {
            let expected = if i == j { 1.0 } else { 0.0 };
            (value - expected).abs()
        })
        .fold(0.0, f64::max)
}

/// Maximum absolute gap between the first `steps` iterates of two seeds.
///
/// The map has zero derivative at x = 0.5, so offsets around that seed collapse instead of growing.
pub fn sensitivity_divergence(
    seed_a: f64,
    seed_b: f64,
    control_parameter: f64,
    steps: usize,
) -> f64 {
    let a = generate_sequence(seed_a, control_parameter, steps);
    let b = generate_sequence(seed_b, control_parameter, steps);
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    const R: f64 = 3.99;

    #[test]
    fn test_sequence_excludes_seed() {
        let seq = generate_sequence(0.4, R, 3);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0], R * 0.4 * (1.0 - 0.4));
        assert_eq!(seq[1], R * seq[0] * (1.0 - seq[0]));
        assert!(generate_sequence(0.4, R, 0).is_empty());
    }

    #[test]
    fn test_sequence_is_deterministic() {
        let a = generate_sequence(0.742, R, 4096);
        let b = generate_sequence(0.742, R, 4096);
        assert_eq!(a, b);
    }

    #[test]
    fn test_matrix_is_deterministic() {
        let a = generate_orthogonal_matrix(0.459382, R, 32).unwrap();
        let b = generate_orthogonal_matrix(0.459382, R, 32).unwrap();
        let max_gap = (&a - &b).iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(max_gap < 1e-12, "keys diverged by {max_gap}");
    }

    #[test]
    fn test_orthogonality_across_sizes() {
        for size in [1, 2, 3, 16, 64, 128] {
            let q = generate_orthogonal_matrix(0.555, R, size).unwrap();
            assert_eq!(q.dim(), (size, size));
            let err = orthogonality_error(q.view());
            assert!(err < 1e-6, "size {size}: orthogonality error {err}");
        }
    }

    #[test]
    fn test_one_by_one_key_is_unit() {
        let q = generate_orthogonal_matrix(0.3, R, 1).unwrap();
        assert!((q[[0, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_determinant_is_unit_magnitude() {
        let q = generate_orthogonal_matrix(0.5, R, 2).unwrap();
        let det = q[[0, 0]] * q[[1, 1]] - q[[0, 1]] * q[[1, 0]];
        assert!((det.abs() - 1.0).abs() < 1e-10, "det = {det}");

        let q = generate_orthogonal_matrix(0.42, R, 3).unwrap();
        let det = q[[0, 0]] * (q[[1, 1]] * q[[2, 2]] - q[[1, 2]] * q[[2, 1]])
            - q[[0, 1]] * (q[[1, 0]] * q[[2, 2]] - q[[1, 2]] * q[[2, 0]])
            + q[[0, 2]] * (q[[1, 0]] * q[[2, 1]] - q[[1, 1]] * q[[2, 0]]);
        assert!((det.abs() - 1.0).abs() < 1e-10, "det = {det}");
    }

    #[test]
    fn test_sensitivity_to_seed() {
        for seed in [0.4, 0.742] {
            let gap = sensitivity_divergence(seed, seed + 1e-10, R, 50);
            assert!(gap > 0.1, "seeds 1e-10 apart from {seed} only diverged by {gap}");
        }
        assert_eq!(sensitivity_divergence(0.4, 0.4, R, 50), 0.0);
    }

    #[test]
    fn test_rank_deficient_raw_still_orthogonal() {
        let raw = array![[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]];
        let derivation = key_matrix_from_raw(raw.view()).unwrap();
        assert!(orthogonality_error(derivation.key.view()) < 1e-10);
        assert!(derivation.degeneracy_ratio < 1e-8);
    }

    #[test]
    fn test_well_conditioned_raw_ratio() {
        let raw = array![[2.0, 0.0], [0.0, 1.0]];
        let derivation = key_matrix_from_raw(raw.view()).unwrap();
        assert!((derivation.degeneracy_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert_eq!(
            generate_orthogonal_matrix(0.5, R, 0).unwrap_err(),
            ChaosKeyError::EmptyDimension
        );
        let raw = Array2::<f64>::zeros((2, 3));
        assert_eq!(
            key_matrix_from_raw(raw.view()).unwrap_err(),
            ChaosKeyError::NotSquare { rows: 2, cols: 3 }
        );
        assert_eq!(
            generate_orthogonal_matrix(0.5, R, usize::MAX).unwrap_err(),
            ChaosKeyError::DimensionOverflow { size: usize::MAX }
        );
    }

    #[test]
    fn test_escaping_map_is_rejected() {
        let err = generate_orthogonal_matrix(0.5, 25.0, 8).unwrap_err();
        assert!(matches!(err, ChaosKeyError::NonFiniteSequence { .. }));
    }

    proptest! {
        #[test]
        fn prop_sequence_stays_in_unit_interval(seed in 0.001f64..0.999, r in 3.57f64..4.0) {
            for value in generate_sequence(seed, r, 256) {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }
}

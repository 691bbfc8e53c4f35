/* src/vault_codex.rs */
#![warn(missing_docs)]
//! # Vault Codex: Orthogonal Vector Transform Engine
//!
//! [`VaultEngine`] owns a chaotic orthogonal key and provides:
//!
//! - batch and single-vector encryption (`ciphertext = plaintext · Key`)
//! - decryption through the transpose (`plaintext = ciphertext · Keyᵗ`)
//! - exact brute-force top-k Euclidean search over ciphertexts, sequential or sharded
//! - sealed ciphertext envelopes carrying dimension and key fingerprint
//!
//! Multiplying by an orthogonal matrix preserves norms and inner products, so distances,
//! cosine similarities and nearest-neighbor rankings survive encryption unchanged up to
//! floating-point rounding.
//!
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::{cmp::Ordering, fmt};

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::chaos_key::{self, ChaosKeyError};

/// Logistic-map control parameter used by [`VaultEngine::new`].
pub const DEFAULT_CONTROL_PARAMETER: f64 = 3.99;

/// Approximate onset of chaos for the logistic map (Feigenbaum point).
pub const CHAOS_ONSET: f64 = 3.57;

// =====================================================================================
// ERROR HANDLING
// =====================================================================================

/// Unified error type for the vault engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    /// A vector length or matrix column count disagrees with the bound dimension.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension the engine is bound to
        expected: usize,
        /// Dimension actually supplied
        found: usize,
    },

    /// The seed lies outside the open interval `(0, 1)`.
    #[error("Invalid seed {seed}: must lie strictly between 0 and 1")]
    InvalidSeed {
        /// Offending seed
        seed: f64,
    },

    /// The engine was asked to bind to dimension zero.
    #[error("Invalid dimension: must be at least 1")]
    InvalidDimension,

    /// A search was requested with `top_k == 0`.
    #[error("Invalid top_k: must be at least 1")]
    InvalidTopK,

    /// A sealed batch was produced under a different key.
    #[error("Key mismatch: batch sealed with {found}, engine holds {expected}")]
    KeyMismatch {
        /// Fingerprint of this engine's key
        expected: String,
        /// Fingerprint recorded in the batch
        found: String,
    },

    /// An engine configuration value is out of range.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// Any other malformed argument.
    #[error("Invalid Input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },

    /// Key derivation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(#[from] ChaosKeyError),
}

/// A specialized `Result` type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

// =====================================================================================
// CONFIGURATION
// =====================================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Logistic-map control parameter `r`
    pub control_parameter: f64,
    /// Below this `r` a warning is logged; the orbit is likely periodic
    pub chaos_onset: f64,
    /// `min |R_ii| / max |R_ii|` below which the raw key matrix is reported as degenerate
    pub degeneracy_threshold: f64,
    /// Batches with at least this many rows are encrypted on the rayon pool
    pub parallel_row_threshold: usize,
    /// Shard size used by [`VaultEngine::search_sharded_default`]
    pub default_shard_rows: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            control_parameter: DEFAULT_CONTROL_PARAMETER,
            chaos_onset: CHAOS_ONSET,
            degeneracy_threshold: 1e-12,
            parallel_row_threshold: 256,
            default_shard_rows: 4096,
        }
    }
}

impl VaultConfig {
    /// Checks every field for a usable range.
    pub fn validate(&self) -> Result<()> {
        let r = self.control_parameter;
        if !(r > 0.0 && r <= 4.0) {
            return Err(VaultError::Configuration(format!(
                "control_parameter {r} must lie in (0, 4] to keep the map inside [0, 1]"
            )));
        }
        if !(self.chaos_onset > 0.0 && self.chaos_onset <= 4.0) {
            return Err(VaultError::Configuration(format!(
                "chaos_onset {} must lie in (0, 4]",
                self.chaos_onset
            )));
        }
        if !(self.degeneracy_threshold >= 0.0 && self.degeneracy_threshold < 1.0) {
            return Err(VaultError::Configuration(format!(
                "degeneracy_threshold {} must lie in [0, 1)",
                self.degeneracy_threshold
            )));
        }
        if self.parallel_row_threshold == 0 {
            return Err(VaultError::Configuration(
                "parallel_row_threshold must be at least 1".to_string(),
            ));
        }
        if self.default_shard_rows == 0 {
            return Err(VaultError::Configuration(
                "default_shard_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =====================================================================================
// KEY IDENTITY & SEALED CIPHERTEXT
// =====================================================================================

/// Public identity of a key matrix: a blake3 digest over dimension, control parameter and
/// matrix entries. It reveals nothing about the seed beyond what the key itself does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    fn of(dimension: usize, control_parameter: f64, key: &Array2<f64>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"isovault-key-v1");
        hasher.update(&(dimension as u64).to_le_bytes());
        hasher.update(&control_parameter.to_le_bytes());
        for value in key.iter() {
            hasher.update(&value.to_le_bytes());
        }
        Self(hasher.finalize().to_hex()[..32].to_string())
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KEY-{}", self.0)
    }
}

/// Persistable ciphertext batch. Keeps the dimension and the identity of the key it was
/// sealed under; the seed itself never leaves the key owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedBatch {
    /// Vector dimension
    pub dimension: usize,
    /// Fingerprint of the sealing key
    pub key_fingerprint: KeyFingerprint,
    /// Number of vectors
    pub rows: usize,
    /// Row-major ciphertext values, `rows * dimension` long
    pub data: Vec<f64>,
}

impl EncryptedBatch {
    /// Ciphertext as an `rows × dimension` matrix.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        let expected = self.rows.checked_mul(self.dimension).ok_or_else(|| {
            VaultError::InvalidInput {
                message: format!("{} rows of dimension {} overflow", self.rows, self.dimension),
            }
        })?;
        if self.data.len() != expected {
            return Err(VaultError::InvalidInput {
                message: format!(
                    "sealed batch holds {} values, header promises {expected}",
                    self.data.len()
                ),
            });
        }
        Array2::from_shape_vec((self.rows, self.dimension), self.data.clone()).map_err(|e| {
            VaultError::InvalidInput {
                message: e.to_string(),
            }
        })
    }
}

// =====================================================================================
// SEARCH RESULTS & METRICS
// =====================================================================================

/// One nearest-neighbor candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Row index in the searched database
    pub index: usize,
    /// Euclidean distance to the query
    pub distance: f64,
}

impl SearchHit {
    /// Ascending distance, ties broken by ascending index.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Euclidean distance between two equal-length vectors.
#[inline]
pub fn euclidean_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity; `0.0` when either vector has zero norm.
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Stacks equal-length rows into a matrix, rejecting ragged input.
pub fn rows_to_array(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(VaultError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), width), flat).map_err(|e| VaultError::InvalidInput {
        message: e.to_string(),
    })
}

/// Exact top-k over `database` rows. `offset` is added to every reported index so shards
/// report global positions.
fn top_k_scan(
    query: ArrayView1<'_, f64>,
    database: ArrayView2<'_, f64>,
    top_k: usize,
    offset: usize,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = database
        .outer_iter()
        .enumerate()
        .map(|(i, row)| {
            // NaN distances rank after every real distance
            let distance = euclidean_distance(query, row);
            SearchHit {
                index: offset + i,
                distance: if distance.is_nan() { f64::INFINITY } else { distance },
            }
        })
        .collect();
    select_top_k(&mut hits, top_k);
    hits
}

/// Keeps the `top_k` best hits of `hits`, sorted.
fn select_top_k(hits: &mut Vec<SearchHit>, top_k: usize) {
    if top_k < hits.len() {
        hits.select_nth_unstable_by(top_k - 1, SearchHit::rank_cmp);
        hits.truncate(top_k);
    }
    hits.sort_unstable_by(SearchHit::rank_cmp);
}

// =====================================================================================
// VAULT ENGINE
// =====================================================================================

/// Owns an orthogonal key matrix and performs distance-preserving encryption and search.
///
/// The key is computed once at construction and never mutated, so a shared reference can
/// be used from any number of threads without locking.
pub struct VaultEngine {
    dimension: usize,
    key: Array2<f64>,
    fingerprint: KeyFingerprint,
    degeneracy_ratio: f64,
    config: VaultConfig,
}

impl fmt::Debug for VaultEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEngine")
            .field("dimension", &self.dimension)
            .field("fingerprint", &self.fingerprint)
            .field("control_parameter", &self.config.control_parameter)
            .field("degeneracy_ratio", &self.degeneracy_ratio)
            .finish_non_exhaustive()
    }
}

impl VaultEngine {
    /// Creates an engine for `dimension`-length vectors keyed by `seed`, using the default
    /// control parameter of 3.99.
    ///
    /// # Arguments
    ///
    /// * `seed` - Private key, strictly between 0 and 1
    /// * `dimension` - Embedding dimension, at least 1
    pub fn new(seed: f64, dimension: usize) -> Result<Self> {
        Self::with_config(seed, dimension, VaultConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    #[instrument(level = "debug", skip(seed, config), fields(r = config.control_parameter))]
    pub fn with_config(seed: f64, dimension: usize, config: VaultConfig) -> Result<Self> {
        config.validate()?;
        if dimension == 0 {
            return Err(VaultError::InvalidDimension);
        }
        if !(seed > 0.0 && seed < 1.0) {
            return Err(VaultError::InvalidSeed { seed });
        }
        if config.control_parameter < config.chaos_onset {
            warn!(
                "Control parameter {} is below the chaos onset {}; the key sequence may be periodic",
                config.control_parameter, config.chaos_onset
            );
        }

        info!("Generating orthogonal key for dim={}", dimension);
        let derivation = chaos_key::derive_key(seed, config.control_parameter, dimension)?;
        if derivation.degeneracy_ratio < config.degeneracy_threshold {
            warn!(
                degeneracy_ratio = derivation.degeneracy_ratio,
                "Raw key matrix is numerically degenerate; key remains orthogonal but its sign pattern is arbitrary"
            );
        }

        let fingerprint = KeyFingerprint::of(dimension, config.control_parameter, &derivation.key);
        info!("Key generation complete: {}", fingerprint);

        Ok(Self {
            dimension,
            key: derivation.key,
            fingerprint,
            degeneracy_ratio: derivation.degeneracy_ratio,
            config,
        })
    }

    /// Bound vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Control parameter the key was derived with.
    pub fn control_parameter(&self) -> f64 {
        self.config.control_parameter
    }

    /// Public identity of the key.
    pub fn fingerprint(&self) -> &KeyFingerprint {
        &self.fingerprint
    }

    /// Conditioning diagnostic of the raw key matrix.
    pub fn degeneracy_ratio(&self) -> f64 {
        self.degeneracy_ratio
    }

    /// Read-only view of the key matrix.
    pub fn key_matrix(&self) -> ArrayView2<'_, f64> {
        self.key.view()
    }

    /// Active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn check_width(&self, found: usize) -> Result<()> {
        if found != self.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                found,
            });
        }
        Ok(())
    }

    /// Multiplies every row by `matrix`. Each row goes through the same kernel regardless
    /// of the execution path, so sequential and parallel results are bit-identical.
    fn transform_rows(&self, vectors: ArrayView2<'_, f64>, matrix: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros(vectors.raw_dim());
        let zip = Zip::from(out.rows_mut()).and(vectors.rows());
        if vectors.nrows() >= self.config.parallel_row_threshold {
            zip.par_for_each(|mut target, row| target.assign(&row.dot(&matrix)));
        } else {
            zip.for_each(|mut target, row| target.assign(&row.dot(&matrix)));
        }
        out
    }

    /// Encrypts an `N × dimension` batch: `vectors · Key`.
    pub fn encrypt_batch(&self, vectors: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(vectors.ncols())?;
        debug!(rows = vectors.nrows(), "Encrypting batch");
        Ok(self.transform_rows(vectors, self.key.view()))
    }

    /// Encrypts one vector through the batch path.
    pub fn encrypt_single(&self, vector: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let batch = self.encrypt_batch(vector.insert_axis(Axis(0)))?;
        Ok(batch.row(0).to_owned())
    }

    /// Decrypts an `N × dimension` batch: `ciphertexts · Keyᵗ`.
    pub fn decrypt_batch(&self, ciphertexts: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(ciphertexts.ncols())?;
        debug!(rows = ciphertexts.nrows(), "Decrypting batch");
        Ok(self.transform_rows(ciphertexts, self.key.t()))
    }

    /// Decrypts one vector through the batch path.
    pub fn decrypt_single(&self, vector: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let batch = self.decrypt_batch(vector.insert_axis(Axis(0)))?;
        Ok(batch.row(0).to_owned())
    }

    fn check_search_args(
        &self,
        query: ArrayView1<'_, f64>,
        database: ArrayView2<'_, f64>,
        top_k: usize,
    ) -> Result<()> {
        if top_k == 0 {
            return Err(VaultError::InvalidTopK);
        }
        self.check_width(query.len())?;
        // An empty database has no meaningful column count.
        if database.nrows() > 0 {
            self.check_width(database.ncols())?;
        }
        Ok(())
    }

    /// Exact top-k Euclidean search of `encrypted_query` against every row of
    /// `encrypted_database`.
    ///
    /// Returns `min(top_k, N)` hits sorted by ascending distance; equal distances keep
    /// their original row order.
    pub fn search(
        &self,
        encrypted_query: ArrayView1<'_, f64>,
        encrypted_database: ArrayView2<'_, f64>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.check_search_args(encrypted_query, encrypted_database, top_k)?;
        debug!(rows = encrypted_database.nrows(), top_k, "Blind search");
        Ok(top_k_scan(encrypted_query, encrypted_database, top_k, 0))
    }

    /// Same result as [`search`](Self::search), computed as per-shard top-k candidates on
    /// the rayon pool and merged with the same ordering.
    pub fn search_sharded(
        &self,
        encrypted_query: ArrayView1<'_, f64>,
        encrypted_database: ArrayView2<'_, f64>,
        top_k: usize,
        shard_rows: usize,
    ) -> Result<Vec<SearchHit>> {
        if shard_rows == 0 {
            return Err(VaultError::InvalidInput {
                message: "shard_rows must be at least 1".to_string(),
            });
        }
        self.check_search_args(encrypted_query, encrypted_database, top_k)?;

        let rows = encrypted_database.nrows();
        let starts: Vec<usize> = (0..rows).step_by(shard_rows).collect();
        debug!(rows, shards = starts.len(), top_k, "Sharded blind search");

        let mut candidates: Vec<SearchHit> = starts
            .par_iter()
            .flat_map_iter(|&start| {
                let end = (start + shard_rows).min(rows);
                let shard = encrypted_database.slice(s![start..end, ..]);
                top_k_scan(encrypted_query, shard, top_k, start)
            })
            .collect();
        select_top_k(&mut candidates, top_k);
        Ok(candidates)
    }

    /// [`search_sharded`](Self::search_sharded) with the configured shard size.
    pub fn search_sharded_default(
        &self,
        encrypted_query: ArrayView1<'_, f64>,
        encrypted_database: ArrayView2<'_, f64>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.search_sharded(
            encrypted_query,
            encrypted_database,
            top_k,
            self.config.default_shard_rows,
        )
    }

    /// Encrypts a batch and wraps it with its dimension and key fingerprint.
    pub fn seal_batch(&self, vectors: ArrayView2<'_, f64>) -> Result<EncryptedBatch> {
        let encrypted = self.encrypt_batch(vectors)?;
        let rows = encrypted.nrows();
        Ok(EncryptedBatch {
            dimension: self.dimension,
            key_fingerprint: self.fingerprint.clone(),
            rows,
            data: encrypted.iter().copied().collect(),
        })
    }

    /// Verifies a sealed batch belongs to this key and decrypts it.
    pub fn open_batch(&self, batch: &EncryptedBatch) -> Result<Array2<f64>> {
        if batch.key_fingerprint != self.fingerprint {
            return Err(VaultError::KeyMismatch {
                expected: self.fingerprint.to_string(),
                found: batch.key_fingerprint.to_string(),
            });
        }
        self.check_width(batch.dimension)?;
        let ciphertext = batch.to_array()?;
        self.decrypt_batch(ciphertext.view())
    }
}

// =====================================================================================
// TESTS
// =====================================================================================

/* src/lib.rs */
#![warn(missing_docs)]
//! # Isovault: Chaotic-Key Orthogonal Transform for Blind Vector Search
//!
//! Derives a deterministic orthogonal key matrix from a low-entropy logistic-map seed and
//! applies it as a rotation to embedding vectors. Rotation is an isometry, so Euclidean
//! distances, cosine similarities and nearest-neighbor rankings are identical in plaintext
//! and ciphertext space, and a service can rank encrypted vectors without seeing plaintext.
//!
//! ## Modules
//!
//! - [`chaos_key`]: logistic-map sequence generation and QR orthogonalization
//! - [`vault_codex`]: the [`VaultEngine`] transform, decryption and exact top-k search
//! - [`mock_data`]: reproducible synthetic embeddings
//! - [`validation`]: isometry audit and retrieval accuracy reports
//!
//! This is not a cryptosystem: no semantic security and no resistance to key recovery
//! is claimed for the chaotic key derivation.
//!
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

pub mod chaos_key;
pub mod mock_data;
pub mod validation;
pub mod vault_codex;

pub use chaos_key::{
    generate_orthogonal_matrix, generate_sequence, ChaosKeyError, KeyDerivation,
};
pub use mock_data::MockDataGenerator;
pub use vault_codex::{
    cosine_similarity, euclidean_distance, EncryptedBatch, KeyFingerprint, SearchHit,
    VaultConfig, VaultEngine, VaultError, DEFAULT_CONTROL_PARAMETER,
};

/* src/validation.rs */
#![warn(missing_docs)]
//! # Validation: Isometry Audits and Retrieval Reports
//!
//! Checks that run a [`VaultEngine`] end to end and produce serializable reports:
//!
//! - [`IsometryAudit`]: distance and cosine drift over random vector pairs
//! - [`RetrievalDemo`]: a planted near-duplicate must be the top encrypted hit
//! - [`RetrievalReport`]: top-1 accuracy of paired query/passage embeddings searched in
//!   ciphertext space, fed from an externally produced [`EmbeddingSet`]
//!
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::fmt;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::mock_data::MockDataGenerator;
use crate::vault_codex::{
    cosine_similarity, euclidean_distance, rows_to_array, Result, SearchHit, VaultEngine,
    VaultError,
};

/// Accuracy (percent) strictly above which a retrieval report passes.
pub const PASS_THRESHOLD_PERCENT: f64 = 90.0;

// =====================================================================================
// ISOMETRY AUDIT
// =====================================================================================

/// Worst-case drift of distances and cosine similarities under encryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsometryAudit {
    /// Vector dimension
    pub dimension: usize,
    /// Number of random pairs checked
    pub pairs: usize,
    /// `max |‖a−b‖ − ‖E(a)−E(b)‖|`
    pub max_distance_deviation: f64,
    /// `max |cos(a,b) − cos(E(a),E(b))|`
    pub max_cosine_deviation: f64,
    /// Tolerance both maxima are compared against
    pub tolerance: f64,
    /// Whether both maxima are below the tolerance
    pub passed: bool,
}

impl IsometryAudit {
    /// Draws `pairs` random vector pairs in `[-1, 1)`, encrypts them and measures drift.
    pub fn run(
        engine: &VaultEngine,
        generator: &mut MockDataGenerator,
        pairs: usize,
        tolerance: f64,
    ) -> Result<Self> {
        if generator.dimension() != engine.dimension() {
            return Err(VaultError::DimensionMismatch {
                expected: engine.dimension(),
                found: generator.dimension(),
            });
        }

        let dimension = engine.dimension();
        let mut left = Array2::<f64>::zeros((pairs, dimension));
        let mut right = Array2::<f64>::zeros((pairs, dimension));
        for i in 0..pairs {
            left.row_mut(i).assign(&generator.random_vector(-1.0, 1.0));
            right.row_mut(i).assign(&generator.random_vector(-1.0, 1.0));
        }
        let encrypted_left = engine.encrypt_batch(left.view())?;
        let encrypted_right = engine.encrypt_batch(right.view())?;

        let mut max_distance_deviation = 0.0_f64;
        let mut max_cosine_deviation = 0.0_f64;
        for i in 0..pairs {
            let plain = euclidean_distance(left.row(i), right.row(i));
            let cipher = euclidean_distance(encrypted_left.row(i), encrypted_right.row(i));
            max_distance_deviation = max_distance_deviation.max((plain - cipher).abs());

            let plain = cosine_similarity(left.row(i), right.row(i));
            let cipher = cosine_similarity(encrypted_left.row(i), encrypted_right.row(i));
            max_cosine_deviation = max_cosine_deviation.max((plain - cipher).abs());
        }

        let passed = max_distance_deviation < tolerance && max_cosine_deviation < tolerance;
        info!(
            pairs,
            max_distance_deviation, max_cosine_deviation, passed, "Isometry audit finished"
        );
        Ok(Self {
            dimension,
            pairs,
            max_distance_deviation,
            max_cosine_deviation,
            tolerance,
            passed,
        })
    }
}

// =====================================================================================
// RETRIEVAL DEMO
// =====================================================================================

/// Outcome of searching for a planted near-duplicate in an encrypted database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDemo {
    /// Database size
    pub documents: usize,
    /// Row holding the near-duplicate of the query
    pub target_index: usize,
    /// Plaintext cosine similarity between query and target
    pub plaintext_similarity: f64,
    /// Zero-based rank of the target in the encrypted ranking
    pub target_rank: usize,
    /// Best `top_k` encrypted hits
    pub hits: Vec<SearchHit>,
    /// Whether the target was ranked first
    pub found: bool,
}

/// Builds `documents` random unit vectors, replaces row `target_index` with a σ = 0.01
/// near-duplicate of a fresh query, encrypts everything and runs a blind search.
pub fn run_retrieval_demo(
    engine: &VaultEngine,
    generator: &mut MockDataGenerator,
    documents: usize,
    target_index: usize,
    top_k: usize,
) -> Result<RetrievalDemo> {
    if target_index >= documents {
        return Err(VaultError::InvalidInput {
            message: format!("target index {target_index} outside database of {documents}"),
        });
    }

    let mut database = generator.generate_embeddings(documents);
    let (query, target) = generator.create_similar_pair()?;
    database.row_mut(target_index).assign(&target);
    let plaintext_similarity = cosine_similarity(query.view(), target.view());

    let encrypted_db = engine.encrypt_batch(database.view())?;
    let encrypted_query = engine.encrypt_single(query.view())?;
    let ranking = engine.search(encrypted_query.view(), encrypted_db.view(), documents)?;

    let target_rank = ranking
        .iter()
        .position(|hit| hit.index == target_index)
        .unwrap_or(documents);
    let hits: Vec<SearchHit> = ranking.into_iter().take(top_k).collect();
    debug!(target_rank, "Retrieval demo ranked target");

    Ok(RetrievalDemo {
        documents,
        target_index,
        plaintext_similarity,
        target_rank,
        found: target_rank == 0,
        hits,
    })
}

// =====================================================================================
// RETRIEVAL ACCURACY REPORT
// =====================================================================================

/// Precomputed paired embeddings: `queries[i]` should retrieve `passages[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// Name of the dataset the pairs came from
    #[serde(default = "EmbeddingSet::unnamed")]
    pub dataset: String,
    /// Name of the encoder that produced the vectors
    #[serde(default = "EmbeddingSet::unnamed")]
    pub model: String,
    /// Query vectors
    pub queries: Vec<Vec<f64>>,
    /// Passage vectors, aligned with `queries`
    pub passages: Vec<Vec<f64>>,
}

impl EmbeddingSet {
    fn unnamed() -> String {
        "unknown".to_string()
    }

    /// Query and passage matrices.
    pub fn to_arrays(&self) -> Result<(Array2<f64>, Array2<f64>)> {
        Ok((rows_to_array(&self.queries)?, rows_to_array(&self.passages)?))
    }

    /// Shared vector dimension, if any rows are present.
    pub fn dimension(&self) -> Option<usize> {
        self.queries.first().map(Vec::len)
    }
}

/// Pass/fail verdict of a [`RetrievalReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    /// Accuracy above [`PASS_THRESHOLD_PERCENT`]
    Pass,
    /// Accuracy at or below [`PASS_THRESHOLD_PERCENT`]
    Fail,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Pass => write!(f, "PASS"),
            ReportStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Top-1 retrieval accuracy over encrypted query/passage pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    /// Dataset name
    pub dataset: String,
    /// Number of query/passage pairs
    pub samples: usize,
    /// Percentage of queries whose nearest encrypted passage is their own
    pub accuracy: f64,
    /// Encoder name
    pub model: String,
    /// Verdict against [`PASS_THRESHOLD_PERCENT`]
    pub status: ReportStatus,
}

impl RetrievalReport {
    /// Encrypts both sides and counts queries whose top-1 hit is the aligned passage.
    pub fn evaluate(
        engine: &VaultEngine,
        queries: ArrayView2<'_, f64>,
        passages: ArrayView2<'_, f64>,
        dataset: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let samples = queries.nrows();
        if samples == 0 {
            return Err(VaultError::InvalidInput {
                message: "no query/passage pairs to evaluate".to_string(),
            });
        }
        if passages.nrows() != samples {
            return Err(VaultError::InvalidInput {
                message: format!("{samples} queries but {} passages", passages.nrows()),
            });
        }

        info!(samples, "Encrypting query and passage embeddings");
        let encrypted_queries = engine.encrypt_batch(queries)?;
        let encrypted_passages = engine.encrypt_batch(passages)?;

        let outcomes = (0..samples)
            .into_par_iter()
            .map(|i| {
                engine
                    .search(encrypted_queries.row(i), encrypted_passages.view(), 1)
                    .map(|hits| hits.first().is_some_and(|hit| hit.index == i))
            })
            .collect::<Result<Vec<bool>>>()?;
        let hits = outcomes.iter().filter(|&&hit| hit).count();

        let accuracy = hits as f64 / samples as f64 * 100.0;
        let status = if accuracy > PASS_THRESHOLD_PERCENT {
            ReportStatus::Pass
        } else {
            ReportStatus::Fail
        };
        info!("Accuracy on encrypted data: {:.1}% ({}/{})", accuracy, hits, samples);

        Ok(Self {
            dataset: dataset.into(),
            samples,
            accuracy,
            model: model.into(),
            status,
        })
    }

    /// Evaluates an [`EmbeddingSet`] with its own dataset and model labels.
    pub fn from_embedding_set(engine: &VaultEngine, set: &EmbeddingSet) -> Result<Self> {
        let (queries, passages) = set.to_arrays()?;
        Self::evaluate(
            engine,
            queries.view(),
            passages.view(),
            set.dataset.clone(),
            set.model.clone(),
        )
    }

    /// Human-readable summary block.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        format!(
            "\n{rule}\nISOVAULT: VERIFICATION SUMMARY\n{rule}\n\
             Dataset Used:       {}\n\
             Sample Size:        {} pairs\n\
             Embedding Model:    {}\n\
             {}\n\
             Retrieval Accuracy: {:.1}%\n\
             System Status:      {}\n\
             {rule}\n",
            self.dataset,
            self.samples,
            self.model,
            "-".repeat(60),
            self.accuracy,
            self.status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    #[test]
    fn test_isometry_audit_passes() {
        let engine = VaultEngine::new(0.742, 64).unwrap();
        let mut generator = MockDataGenerator::new(64, 17);
        let audit = IsometryAudit::run(&engine, &mut generator, 1000, 1e-6).unwrap();
        assert!(audit.passed, "{audit:?}");
        assert_eq!(audit.pairs, 1000);
    }

    #[test]
    fn test_isometry_audit_rejects_wrong_generator() {
        let engine = VaultEngine::new(0.742, 8).unwrap();
        let mut generator = MockDataGenerator::new(9, 17);
        assert!(IsometryAudit::run(&engine, &mut generator, 10, 1e-6).is_err());
    }

    #[test]
    fn test_retrieval_demo_finds_target() {
        let engine = VaultEngine::new(0.459382, 128).unwrap();
        let mut generator = MockDataGenerator::new(128, 3);
        let demo = run_retrieval_demo(&engine, &mut generator, 100, 42, 3).unwrap();
        assert!(demo.found);
        assert_eq!(demo.hits.len(), 3);
        assert_eq!(demo.hits[0].index, 42);
        assert!(demo.plaintext_similarity > 0.98);
    }

    #[test]
    fn test_retrieval_demo_rejects_out_of_range_target() {
        let engine = VaultEngine::new(0.5, 8).unwrap();
        let mut generator = MockDataGenerator::new(8, 3);
        assert!(matches!(
            run_retrieval_demo(&engine, &mut generator, 10, 10, 3),
            Err(VaultError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_report_passes_on_aligned_pairs() {
        let engine = VaultEngine::new(0.42, 32).unwrap();
        let mut generator = MockDataGenerator::new(32, 12);
        let passages = generator.generate_embeddings(50);
        let mut queries = passages.clone();
        for (i, mut row) in queries.axis_iter_mut(Axis(0)).enumerate() {
            let noisy = generator.near_duplicate(passages.row(i), 0.01).unwrap();
            row.assign(&noisy);
        }

        let report =
            RetrievalReport::evaluate(&engine, queries.view(), passages.view(), "synthetic", "mock")
                .unwrap();
        assert_eq!(report.samples, 50);
        assert_eq!(report.accuracy, 100.0);
        assert_eq!(report.status, ReportStatus::Pass);
        assert!(report.summary().contains("System Status:      PASS"));
    }

    #[test]
    fn test_report_fails_on_shuffled_pairs() {
        let engine = VaultEngine::new(0.42, 16).unwrap();
        let passages = Array2::from_shape_fn((10, 16), |(i, j)| if i == j { 1.0 } else { 0.0 });
        // Each query sits on the next passage, so no query retrieves its own.
        let queries = Array2::from_shape_fn((10, 16), |(i, j)| if (i + 1) % 10 == j { 1.0 } else { 0.0 });

        let report =
            RetrievalReport::evaluate(&engine, queries.view(), passages.view(), "shifted", "mock")
                .unwrap();
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.status, ReportStatus::Fail);
    }

    #[test]
    fn test_report_input_errors() {
        let engine = VaultEngine::new(0.42, 4).unwrap();
        let empty = Array2::<f64>::zeros((0, 4));
        assert!(RetrievalReport::evaluate(&engine, empty.view(), empty.view(), "d", "m").is_err());

        let queries = Array2::<f64>::zeros((3, 4));
        let passages = Array2::<f64>::zeros((2, 4));
        assert!(
            RetrievalReport::evaluate(&engine, queries.view(), passages.view(), "d", "m").is_err()
        );
    }

    #[test]
    fn test_embedding_set_json_and_status_format() {
        let json = r#"{
            "queries": [[1.0, 0.0], [0.0, 1.0]],
            "passages": [[0.9, 0.1], [0.1, 0.9]]
        }"#;
        let set: EmbeddingSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.dataset, "unknown");
        assert_eq!(set.dimension(), Some(2));

        let engine = VaultEngine::new(0.3, 2).unwrap();
        let report = RetrievalReport::from_embedding_set(&engine, &set).unwrap();
        assert_eq!(report.status, ReportStatus::Pass);

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["status"], "PASS");
    }
}

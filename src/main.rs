/* src/main.rs */
#![warn(missing_docs)]
//! # Isovault CLI - Chaotic Orthogonal Key Toolkit
//!
//! Command-line front end for the isovault engine: key generation diagnostics, isometry
//! verification, encrypted retrieval demos, ciphertext sealing and retrieval accuracy
//! reports over externally produced embeddings.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::fs as async_fs;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use isovault::{
    chaos_key::{generate_sequence, orthogonality_error, sensitivity_divergence},
    validation::{run_retrieval_demo, EmbeddingSet, IsometryAudit, RetrievalDemo, RetrievalReport},
    vault_codex::rows_to_array,
    EncryptedBatch, MockDataGenerator, VaultConfig, VaultEngine,
};

// =====================================================================================
// CLI CONFIGURATION & ARGUMENTS
// =====================================================================================

/// Isovault CLI - distance-preserving chaotic rotation for blind vector search
#[derive(Parser, Debug)]
#[command(
    name = "isovault",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chaotic-key orthogonal transform for nearest-neighbor search over encrypted embeddings"
)]
struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Configuration file path (.yaml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    output_format: OutputFormat,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive a key and report its fingerprint and orthogonality
    Keygen {
        /// Secret seed in (0, 1)
        #[arg(short, long)]
        seed: f64,

        /// Vector dimension
        #[arg(short, long, default_value = "128")]
        dimension: usize,
    },

    /// Check distance and cosine preservation over random pairs
    Verify {
        /// Secret seed in (0, 1)
        #[arg(short, long, default_value = "0.742")]
        seed: f64,

        /// Vector dimension
        #[arg(short, long, default_value = "128")]
        dimension: usize,

        /// Number of random pairs
        #[arg(short, long, default_value = "1000")]
        pairs: usize,

        /// Maximum tolerated deviation
        #[arg(short, long, default_value = "1e-6")]
        tolerance: f64,

        /// Seed of the mock data generator
        #[arg(long, default_value = "0")]
        rng_seed: u64,
    },

    /// Plant a near-duplicate in a mock database and find it in ciphertext space
    Demo {
        /// Secret seed in (0, 1)
        #[arg(short, long, default_value = "0.459382")]
        seed: f64,

        /// Vector dimension
        #[arg(short, long, default_value = "128")]
        dimension: usize,

        /// Database size
        #[arg(short = 'n', long, default_value = "100")]
        documents: usize,

        /// Row that receives the near-duplicate
        #[arg(short, long, default_value = "42")]
        target_index: usize,

        /// Number of hits to show
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Seed of the mock data generator
        #[arg(long, default_value = "0")]
        rng_seed: u64,
    },

    /// Show how fast two nearby seeds diverge under the logistic map
    Sensitivity {
        /// Base seed in (0, 1)
        #[arg(short, long, default_value = "0.4")]
        seed: f64,

        /// Perturbation added to the base seed
        #[arg(short, long, default_value = "1e-10")]
        delta: f64,

        /// Iterations to compare
        #[arg(long, default_value = "50")]
        steps: usize,
    },

    /// Encrypt a JSON array of vectors into a sealed batch
    Seal {
        /// JSON file holding `[[f64, ...], ...]`
        #[arg(short, long)]
        input: PathBuf,

        /// Secret seed in (0, 1)
        #[arg(short, long)]
        seed: f64,

        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Measure top-1 retrieval accuracy of precomputed embeddings after encryption
    Validate {
        /// JSON embedding set with `queries` and `passages`
        #[arg(short, long)]
        embeddings: PathBuf,

        /// Secret seed in (0, 1)
        #[arg(short, long, default_value = "0.42")]
        seed: f64,

        /// Path of the JSON report to write
        #[arg(long)]
        out: PathBuf,
    },

    /// Print the summary of a saved retrieval report
    Report {
        /// Report written by `validate`
        path: PathBuf,
    },
}

/// Log level configuration
#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Yaml,
    Binary,
    Text,
}

// =====================================================================================
// APPLICATION CONFIGURATION
// =====================================================================================

/// Application configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    /// Engine configuration
    pub engine: VaultConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    pub with_thread_ids: bool,
    pub with_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            with_thread_ids: true,
            with_file: true,
        }
    }
}

// =====================================================================================
// OUTPUT RENDERING
// =====================================================================================

/// Plain-text rendering for `--output-format text`.
trait TextReport {
    fn to_text(&self) -> String;
}

/// Machine-readable encoding of `value`; `Text` falls back to JSON.
fn serialize<T: Serialize>(value: &T, format: OutputFormat) -> Result<Vec<u8>> {
    Ok(match format {
        OutputFormat::Json | OutputFormat::Text => serde_json::to_string_pretty(value)?.into_bytes(),
        OutputFormat::Yaml => serde_yaml::to_string(value)?.into_bytes(),
        OutputFormat::Binary => bincode::serialize(value)?,
    })
}

fn render<T: Serialize + TextReport>(value: &T, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Text => Ok(value.to_text().into_bytes()),
        _ => serialize(value, format),
    }
}

fn emit(data: &[u8], format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, data)
                .with_context(|| format!("Failed to write output to: {}", path.display()))?;
            info!("Results written to: {}", path.display());
        }
        None => write_terminated(&mut io::stdout().lock(), data, format)?,
    }
    Ok(())
}

/// Writes `data`, newline-terminated unless it is a bincode stream.
fn write_terminated<W: Write>(writer: &mut W, data: &[u8], format: OutputFormat) -> io::Result<()> {
    writer.write_all(data)?;
    if format != OutputFormat::Binary {
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[derive(Debug, Serialize, Deserialize)]
struct KeygenResult {
    dimension: usize,
    control_parameter: f64,
    fingerprint: String,
    orthogonality_error: f64,
    degeneracy_ratio: f64,
    generation_time_ms: u64,
}

impl TextReport for KeygenResult {
    fn to_text(&self) -> String {
        format!(
            "Fingerprint: {}\nDimension: {}\nControl parameter: {}\nOrthogonality error: {:.3e}\nDegeneracy ratio: {:.3e}\nGeneration time: {} ms",
            self.fingerprint,
            self.dimension,
            self.control_parameter,
            self.orthogonality_error,
            self.degeneracy_ratio,
            self.generation_time_ms
        )
    }
}

impl TextReport for IsometryAudit {
    fn to_text(&self) -> String {
        format!(
            "Pairs checked: {} (dim={})\nMax distance deviation: {:.3e}\nMax cosine deviation: {:.3e}\nTolerance: {:.1e}\nResult: {}",
            self.pairs,
            self.dimension,
            self.max_distance_deviation,
            self.max_cosine_deviation,
            self.tolerance,
            if self.passed { "PASS" } else { "FAIL" }
        )
    }
}

impl TextReport for RetrievalDemo {
    fn to_text(&self) -> String {
        let mut text = format!(
            "Database size: {}\nTarget index: {}\nPlaintext similarity (query vs target): {:.4}\n",
            self.documents, self.target_index, self.plaintext_similarity
        );
        for (rank, hit) in self.hits.iter().enumerate() {
            text.push_str(&format!(
                "  #{} index={} distance={:.6}\n",
                rank + 1,
                hit.index,
                hit.distance
            ));
        }
        text.push_str(if self.found {
            "SUCCESS: target ranked first in the encrypted domain"
        } else {
            "FAILURE: target missed"
        });
        text
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SensitivityResult {
    seed_a: f64,
    seed_b: f64,
    control_parameter: f64,
    steps: usize,
    max_divergence: f64,
    first_step_above_threshold: Option<usize>,
}

/// Gap that counts as "diverged" in the sensitivity report.
const DIVERGENCE_THRESHOLD: f64 = 0.1;

impl TextReport for SensitivityResult {
    fn to_text(&self) -> String {
        let first = self
            .first_step_above_threshold
            .map_or_else(|| "never".to_string(), |step| step.to_string());
        format!(
            "Seeds: {} vs {} (r={})\nMax divergence over {} steps: {:.6}\nFirst step with gap > {}: {}",
            self.seed_a,
            self.seed_b,
            self.control_parameter,
            self.steps,
            self.max_divergence,
            DIVERGENCE_THRESHOLD,
            first
        )
    }
}

impl TextReport for RetrievalReport {
    fn to_text(&self) -> String {
        self.summary()
    }
}

// =====================================================================================
// COMMAND IMPLEMENTATIONS
// =====================================================================================

fn build_engine(seed: f64, dimension: usize, config: &AppConfig) -> Result<VaultEngine> {
    VaultEngine::with_config(seed, dimension, config.engine.clone())
        .with_context(|| format!("Failed to initialize engine for dimension {dimension}"))
}

/// Execute keygen command
fn cmd_keygen(seed: f64, dimension: usize, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let start_time = Instant::now();
    let engine = build_engine(seed, dimension, config)?;
    let result = KeygenResult {
        dimension,
        control_parameter: engine.control_parameter(),
        fingerprint: engine.fingerprint().to_string(),
        orthogonality_error: orthogonality_error(engine.key_matrix()),
        degeneracy_ratio: engine.degeneracy_ratio(),
        generation_time_ms: start_time.elapsed().as_millis() as u64,
    };
    emit(&render(&result, format)?, format, None)
}

/// Execute verify command
fn cmd_verify(
    seed: f64,
    dimension: usize,
    pairs: usize,
    tolerance: f64,
    rng_seed: u64,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    info!("Verifying isometry over {} random pairs", pairs);
    let engine = build_engine(seed, dimension, config)?;
    let mut generator = MockDataGenerator::new(dimension, rng_seed);
    let audit = IsometryAudit::run(&engine, &mut generator, pairs, tolerance)?;
    emit(&render(&audit, format)?, format, None)?;
    if !audit.passed {
        bail!("Isometry deviation exceeded tolerance {tolerance}");
    }
    Ok(())
}

/// Execute demo command
fn cmd_demo(
    seed: f64,
    dimension: usize,
    documents: usize,
    target_index: usize,
    top_k: usize,
    rng_seed: u64,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    info!("Database size: {} documents, dimension {}", documents, dimension);
    let engine = build_engine(seed, dimension, config)?;
    let mut generator = MockDataGenerator::new(dimension, rng_seed);
    let demo = run_retrieval_demo(&engine, &mut generator, documents, target_index, top_k)?;
    emit(&render(&demo, format)?, format, None)?;
    if !demo.found {
        warn!("Target ranked {} instead of first", demo.target_rank + 1);
    }
    Ok(())
}

fn sensitivity_result(seed: f64, delta: f64, steps: usize, control_parameter: f64) -> SensitivityResult {
    let seed_b = seed + delta;
    let first_step_above_threshold = generate_sequence(seed, control_parameter, steps)
        .iter()
        .zip(&generate_sequence(seed_b, control_parameter, steps))
        .position(|(x, y)| (x - y).abs() > DIVERGENCE_THRESHOLD);
    SensitivityResult {
        seed_a: seed,
        seed_b,
        control_parameter,
        steps,
        max_divergence: sensitivity_divergence(seed, seed_b, control_parameter, steps),
        first_step_above_threshold,
    }
}

/// Execute sensitivity command
fn cmd_sensitivity(
    seed: f64,
    delta: f64,
    steps: usize,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    let result = sensitivity_result(seed, delta, steps, config.engine.control_parameter);
    emit(&render(&result, format)?, format, None)
}

/// Execute seal command
async fn cmd_seal(
    input: &Path,
    seed: f64,
    output: Option<&Path>,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    let content = async_fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let rows: Vec<Vec<f64>> =
        serde_json::from_str(&content).with_context(|| "Failed to parse vector rows")?;
    let vectors = rows_to_array(&rows)?;
    let engine = build_engine(seed, vectors.ncols(), config)?;
    let sealed = engine.seal_batch(vectors.view())?;
    info!("Sealed {} vectors under {}", sealed.rows, sealed.key_fingerprint);
    emit(&serialize(&sealed, format)?, format, output)
}

/// Execute validate command
async fn cmd_validate(
    embeddings: &Path,
    seed: f64,
    out: &Path,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    info!("Loading embeddings from {}", embeddings.display());
    let content = async_fs::read_to_string(embeddings)
        .await
        .with_context(|| format!("Failed to read embeddings: {}", embeddings.display()))?;
    let set: EmbeddingSet =
        serde_json::from_str(&content).with_context(|| "Failed to parse embedding set")?;
    let dimension = set
        .dimension()
        .context("Embedding set contains no queries")?;
    info!("Collected {} query-passage pairs (dim={})", set.queries.len(), dimension);

    let engine = build_engine(seed, dimension, config)?;
    let report = RetrievalReport::from_embedding_set(&engine, &set)?;
    write_report(&report, out).await?;
    emit(&render(&report, format)?, format, None)
}

async fn write_report(report: &RetrievalReport, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        async_fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    async_fs::write(out, serde_json::to_string_pretty(report)?)
        .await
        .with_context(|| format!("Failed to write report: {}", out.display()))?;
    info!("Report saved to {}", out.display());
    Ok(())
}

async fn read_report(path: &Path) -> Result<RetrievalReport> {
    let content = async_fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| "Failed to parse report")
}

/// Execute report command
async fn cmd_report(path: &Path, format: OutputFormat) -> Result<()> {
    let report = read_report(path).await?;
    emit(&render(&report, format)?, format, None)
}

// =====================================================================================
// MAIN APPLICATION ENTRY POINT
// =====================================================================================

/// Setup logging configuration
fn setup_logging(args: &Args, logging: &LoggingConfig) -> Result<()> {
    let level = Level::from(args.log_level.clone());

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(logging.with_thread_ids)
        .with_file(logging.with_file)
        .with_line_number(logging.with_file);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Load application configuration
async fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let config: AppConfig = match config_path {
        Some(path) => {
            let content = async_fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            if matches!(path.extension().and_then(|s| s.to_str()), Some("yaml" | "yml")) {
                serde_yaml::from_str(&content).with_context(|| "Failed to parse YAML config")?
            } else {
                serde_json::from_str(&content).with_context(|| "Failed to parse JSON config")?
            }
        }
        None => AppConfig::default(),
    };
    config.engine.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Config first so the logging section can shape the subscriber
    let config = load_config(args.config.as_deref()).await?;
    setup_logging(&args, &config.logging)?;

    let format = args.output_format;
    match &args.command {
        Commands::Keygen { seed, dimension } => cmd_keygen(*seed, *dimension, &config, format),
        Commands::Verify { seed, dimension, pairs, tolerance, rng_seed } => {
            cmd_verify(*seed, *dimension, *pairs, *tolerance, *rng_seed, &config, format)
        }
        Commands::Demo { seed, dimension, documents, target_index, top_k, rng_seed } => cmd_demo(
            *seed,
            *dimension,
            *documents,
            *target_index,
            *top_k,
            *rng_seed,
            &config,
            format,
        ),
        Commands::Sensitivity { seed, delta, steps } => {
            cmd_sensitivity(*seed, *delta, *steps, &config, format)
        }
        Commands::Seal { input, seed, output } => {
            cmd_seal(input, *seed, output.as_deref(), &config, format).await
        }
        Commands::Validate { embeddings, seed, out } => {
            cmd_validate(embeddings, *seed, out, &config, format).await
        }
        Commands::Report { path } => cmd_report(path, format).await,
    }
}

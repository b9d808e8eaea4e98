//! On-disk artifacts: tables, summary documents, kernel and config inputs.
//!
//! Every table is written with serde-derived headers through the `csv` crate,
//! which prints floats in shortest round-trip form (`inf` for infinities).
//! Summary documents are pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use coercivity_core::archimedean::{ArchimedeanReport, BoundConstants};
use coercivity_core::resonant::{ResonantReport, ResonantSummary};
use coercivity_core::verifier::{IuSummary, RNG_ALGORITHM, VerificationReport};
use coercivity_core::{CertificationConfig, CertifyError, Grid, KernelProfile, KernelSource};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const KERNEL_PROFILE_CSV: &str = "kernel_profile.csv";
pub const IU_CHECK_CSV: &str = "IU_check_random.csv";
pub const IU_STATS_JSON: &str = "IU_stats.json";
pub const RESONANT_SCAN_CSV: &str = "resonant_Q_scan.csv";
pub const RESONANT_THRESHOLD_CSV: &str = "resonant_amp_threshold.csv";
pub const RESONANT_SUMMARY_JSON: &str = "resonant_summary.json";
pub const ARCH_SCAN_CSV: &str = "arch_bounds_scan.csv";
pub const ARCH_CONSTANTS_JSON: &str = "arch_bounds_constants.json";

/// Where a run puts its files: tables and summaries under `<root>/data`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Path of a data artifact.
    #[must_use]
    pub fn data(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    /// Root-relative form used in logs and the artifact index.
    #[must_use]
    pub fn relative(name: &str) -> String {
        format!("data/{name}")
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        Ok(())
    }
}

/// Write `rows` as a CSV table with a header row.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `doc` as pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Kernel profile table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelRow {
    pub xi: f64,
    #[serde(rename = "Khat")]
    pub khat: f64,
}

pub fn write_kernel_profile(path: &Path, kernel: &KernelProfile) -> Result<()> {
    let rows: Vec<KernelRow> = kernel.rows().map(|(xi, khat)| KernelRow { xi, khat }).collect();
    write_table(path, &rows)
}

/// A kernel profile read back from a `xi,Khat` table at one explicit path.
#[derive(Debug, Clone)]
pub struct CsvKernelSource {
    path: PathBuf,
}

impl CsvKernelSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KernelSource for CsvKernelSource {
    fn kernel_profile(&self) -> coercivity_core::Result<KernelProfile> {
        let location = self.path.display().to_string();
        if !self.path.is_file() {
            return Err(CertifyError::data_not_found("kernel profile table", location));
        }
        let malformed = |err: csv::Error| {
            CertifyError::configuration("kernel", &location, format!("unreadable xi,Khat table: {err}"))
        };
        let mut rdr = csv::Reader::from_path(&self.path).map_err(malformed)?;
        let mut xs = Vec::new();
        let mut values = Vec::new();
        for row in rdr.deserialize::<KernelRow>() {
            let row = row.map_err(malformed)?;
            xs.push(row.xi);
            values.push(row.khat);
        }
        KernelProfile::from_values(Grid::from_points(xs)?, values)
    }

    fn describe(&self) -> String {
        format!("kernel table {}", self.path.display())
    }
}

// ---------------------------------------------------------------------------
// Configuration file
// ---------------------------------------------------------------------------

/// Load configuration from an explicit path, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<CertificationConfig> {
    let Some(path) = path else {
        return Ok(CertificationConfig::default());
    };
    if !path.is_file() {
        return Err(CertifyError::configuration(
            "--config",
            path.display(),
            "file does not exist",
        )
        .into());
    }
    let text = fs::read_to_string(path)?;
    Ok(CertificationConfig::from_json_str(&text)?)
}

// ---------------------------------------------------------------------------
// Summary documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IuStatsDocument {
    pub source_csv: String,
    pub lhs_col: &'static str,
    pub rhs_col: &'static str,
    #[serde(flatten)]
    pub summary: IuSummary,
    pub seed: u64,
    pub rng: &'static str,
    pub samples: usize,
    pub note: &'static str,
}

impl IuStatsDocument {
    #[must_use]
    pub fn new(report: &VerificationReport, seed: u64) -> Self {
        Self {
            source_csv: OutputLayout::relative(IU_CHECK_CSV),
            lhs_col: "Q",
            rhs_col: "rhs",
            summary: report.summary,
            seed,
            rng: RNG_ALGORITHM,
            samples: report.samples.len(),
            note: "Sanity-check only; not part of the proof.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResonantSummaryDocument {
    #[serde(flatten)]
    pub summary: ResonantSummary,
    pub notes: [&'static str; 2],
}

impl From<&ResonantReport> for ResonantSummaryDocument {
    fn from(report: &ResonantReport) -> Self {
        Self {
            summary: report.summary,
            notes: [
                "Model-based negative bump; amp encodes the strength of a hypothetical off-line zero.",
                "Small amp_threshold across (gamma, R) means resonance is an efficient detector.",
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Inequalities {
    pub lower: &'static str,
    pub upper: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchConstantsDocument {
    #[serde(flatten)]
    pub constants: BoundConstants,
    pub inequalities: Inequalities,
    pub notes: [&'static str; 3],
}

impl From<&ArchimedeanReport> for ArchConstantsDocument {
    fn from(report: &ArchimedeanReport) -> Self {
        Self {
            constants: report.constants,
            inequalities: Inequalities {
                lower: "Re psi >= log|z| - C_lower/(1+xi^2)",
                upper: "Re psi <= log|z| + C_upper/(1+xi^2)",
            },
            notes: [
                "Bounds are verified at grid points only; raise xi_max or refine xi_step to tighten.",
                "Constants refer to the archimedean term on the contour z = 1/4 + i xi/(4 pi).",
                "precision_bits is the digamma series tolerance; resid itself is accurate to about 1e-12 relative.",
            ],
        }
    }
}

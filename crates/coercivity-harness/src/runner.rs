//! Stage orchestration.
//!
//! A run executes the stages in dependency order: the kernel profile first,
//! then the two scans that consume it, then the self-contained archimedean
//! scan. Configuration and grid errors stop the run. A numeric failure (or a
//! missing upstream table) fails only its own stage; stages that need its
//! output are skipped and the rest still run.

use std::path::PathBuf;
use std::time::Instant;

use coercivity_core::{
    ArchimedeanBoundEstimator, CertificationConfig, InequalityVerifier, KernelProfile,
    KernelSource, ResonantPlan, ResonantScanner, SamplingPlan,
};
use serde::Serialize;

use crate::artifacts::{
    ARCH_CONSTANTS_JSON, ARCH_SCAN_CSV, ArchConstantsDocument, CsvKernelSource, IU_CHECK_CSV,
    IU_STATS_JSON, IuStatsDocument, KERNEL_PROFILE_CSV, OutputLayout, RESONANT_SCAN_CSV,
    RESONANT_SUMMARY_JSON, RESONANT_THRESHOLD_CSV, ResonantSummaryDocument, write_json,
    write_kernel_profile, write_table,
};
use crate::error::{HarnessError, Result};
use crate::integrity::{append_hash_manifest, build_artifact_index, write_artifact_index};
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Kernels,
    CheckIu,
    Resonant,
    Archimedean,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Self::Kernels, Self::CheckIu, Self::Resonant, Self::Archimedean];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kernels => "kernels",
            Self::CheckIu => "check_iu",
            Self::Resonant => "resonant",
            Self::Archimedean => "archimedean",
        }
    }

    #[must_use]
    pub const fn needs_kernel(self) -> bool {
        matches!(self, Self::CheckIu | Self::Resonant)
    }
}

/// What a stage produced, as recorded in the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.stages.iter().all(|s| s.outcome == Outcome::Pass)
    }

    #[must_use]
    pub fn outcome_of(&self, stage: Stage) -> Option<Outcome> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.outcome)
    }
}

/// Result of one successful stage body.
struct StageOutput {
    outcome: Outcome,
    artifacts: Vec<String>,
    details: serde_json::Value,
}

/// Runs certification stages against one configuration and output root.
pub struct CertificationRunner {
    config: CertificationConfig,
    layout: OutputLayout,
    kernel_table: Option<PathBuf>,
}

impl CertificationRunner {
    pub fn new(config: CertificationConfig, out: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            layout: OutputLayout::new(out),
            kernel_table: None,
        })
    }

    /// Read the kernel from a `xi,Khat` table instead of building it.
    #[must_use]
    pub fn with_kernel_table(mut self, path: Option<PathBuf>) -> Self {
        self.kernel_table = path;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CertificationConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn kernel_source(&self) -> Result<Box<dyn KernelSource>> {
        Ok(match &self.kernel_table {
            Some(path) => Box::new(CsvKernelSource::new(path)),
            None => {
                let params = self.config.kernel_params()?;
                Box::new(KernelProfile::build(&params, &self.config.kernel_grid()?))
            }
        })
    }

    /// Obtain the kernel profile for the dependent scans.
    pub fn load_kernel(&self) -> Result<KernelProfile> {
        Ok(self.kernel_source()?.kernel_profile()?)
    }

    pub fn write_kernels(&self, kernel: &KernelProfile) -> Result<Vec<String>> {
        self.layout.ensure()?;
        write_kernel_profile(&self.layout.data(KERNEL_PROFILE_CSV), kernel)?;
        Ok(vec![OutputLayout::relative(KERNEL_PROFILE_CSV)])
    }

    /// Randomized inequality check. `Ok(true)` when the tolerant verdict holds.
    pub fn check_iu(&self, kernel: &KernelProfile) -> Result<(bool, Vec<String>)> {
        self.layout.ensure()?;
        let params = self.config.kernel_params()?;
        let plan = SamplingPlan::from_config(&self.config)?;
        let report = InequalityVerifier::new(kernel, params, plan)
            .with_workers(self.config.workers)
            .run()?;
        write_table(&self.layout.data(IU_CHECK_CSV), &report.samples)?;
        write_json(
            &self.layout.data(IU_STATS_JSON),
            &IuStatsDocument::new(&report, plan.seed),
        )?;
        Ok((
            report.summary.all_ok_tol,
            vec![
                OutputLayout::relative(IU_CHECK_CSV),
                OutputLayout::relative(IU_STATS_JSON),
            ],
        ))
    }

    pub fn resonant(&self, kernel: &KernelProfile) -> Result<(f64, Vec<String>)> {
        self.layout.ensure()?;
        let plan = ResonantPlan::from_config(&self.config)?;
        let report = ResonantScanner::new(kernel, plan)
            .with_workers(self.config.workers)
            .run()?;
        write_table(&self.layout.data(RESONANT_SCAN_CSV), &report.scan)?;
        write_table(&self.layout.data(RESONANT_THRESHOLD_CSV), &report.thresholds)?;
        write_json(
            &self.layout.data(RESONANT_SUMMARY_JSON),
            &ResonantSummaryDocument::from(&report),
        )?;
        Ok((
            report.summary.min_q,
            vec![
                OutputLayout::relative(RESONANT_SCAN_CSV),
                OutputLayout::relative(RESONANT_THRESHOLD_CSV),
                OutputLayout::relative(RESONANT_SUMMARY_JSON),
            ],
        ))
    }

    pub fn archimedean(&self) -> Result<((f64, f64), Vec<String>)> {
        self.layout.ensure()?;
        let report = ArchimedeanBoundEstimator::from_config(&self.config)?
            .with_workers(self.config.workers)
            .run()?;
        write_table(&self.layout.data(ARCH_SCAN_CSV), &report.rows)?;
        write_json(
            &self.layout.data(ARCH_CONSTANTS_JSON),
            &ArchConstantsDocument::from(&report),
        )?;
        Ok((
            (report.constants.c_lower, report.constants.c_upper),
            vec![
                OutputLayout::relative(ARCH_SCAN_CSV),
                OutputLayout::relative(ARCH_CONSTANTS_JSON),
            ],
        ))
    }

    /// Every stage in order, then the artifact index and hash manifest.
    pub fn run_all(&self, log: &mut LogEmitter) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut kernel: Option<KernelProfile> = None;

        for stage in Stage::ALL {
            if stage.needs_kernel() && kernel.is_none() {
                let entry = log
                    .entry(LogLevel::Warn, stage.name(), "stage_skipped")
                    .with_outcome(Outcome::Skip)
                    .with_details(serde_json::json!({"reason": "kernel profile unavailable"}));
                log.emit_entry(&entry)?;
                report.stages.push(StageReport {
                    stage,
                    outcome: Outcome::Skip,
                    duration_ms: 0,
                    artifacts: Vec::new(),
                    error: None,
                });
                continue;
            }

            log.emit(LogLevel::Info, stage.name(), "stage_start")?;
            let started = Instant::now();
            let result = match stage {
                Stage::Kernels => self.kernels_stage().map(|(k, out)| {
                    kernel = Some(k);
                    out
                }),
                Stage::CheckIu | Stage::Resonant => {
                    let Some(k) = kernel.as_ref() else { continue };
                    self.run_kernel_stage(stage, k)
                }
                Stage::Archimedean => self.archimedean().map(|((c_lower, c_upper), artifacts)| {
                    StageOutput {
                        outcome: Outcome::Pass,
                        artifacts,
                        details: serde_json::json!({"C_lower": c_lower, "C_upper": c_upper}),
                    }
                }),
            };
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(out) => {
                    let level = if out.outcome == Outcome::Pass {
                        LogLevel::Info
                    } else {
                        LogLevel::Warn
                    };
                    let entry = log
                        .entry(level, stage.name(), "stage_result")
                        .with_outcome(out.outcome)
                        .with_duration_ms(duration_ms)
                        .with_artifacts(out.artifacts.clone())
                        .with_details(out.details);
                    log.emit_entry(&entry)?;
                    report.stages.push(StageReport {
                        stage,
                        outcome: out.outcome,
                        duration_ms,
                        artifacts: out.artifacts,
                        error: None,
                    });
                }
                Err(err) => {
                    let fatal = err.is_fatal();
                    let entry = log
                        .entry(
                            if fatal { LogLevel::Fatal } else { LogLevel::Error },
                            stage.name(),
                            "stage_failed",
                        )
                        .with_outcome(Outcome::Error)
                        .with_duration_ms(duration_ms)
                        .with_details(error_details(&err));
                    log.emit_entry(&entry)?;
                    if fatal {
                        log.flush()?;
                        return Err(err);
                    }
                    report.stages.push(StageReport {
                        stage,
                        outcome: Outcome::Error,
                        duration_ms,
                        artifacts: Vec::new(),
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let root = self.layout.root();
        let index = build_artifact_index(root, log.run_id())?;
        write_artifact_index(root, &index)?;
        let hashed = append_hash_manifest(root)?;
        let entry = log
            .entry(LogLevel::Info, "run", "run_complete")
            .with_outcome(if report.all_passed() {
                Outcome::Pass
            } else {
                Outcome::Fail
            })
            .with_details(serde_json::json!({
                "artifacts": index.artifacts.len(),
                "hashed": hashed,
                "stages": &report.stages,
            }));
        log.emit_entry(&entry)?;
        log.flush()?;
        Ok(report)
    }

    fn kernels_stage(&self) -> Result<(KernelProfile, StageOutput)> {
        let source = self.kernel_source()?;
        let kernel = source.kernel_profile()?;
        let artifacts = self.write_kernels(&kernel)?;
        let details = serde_json::json!({
            "source": source.describe(),
            "points": kernel.grid().len(),
        });
        Ok((
            kernel,
            StageOutput {
                outcome: Outcome::Pass,
                artifacts,
                details,
            },
        ))
    }

    fn run_kernel_stage(&self, stage: Stage, kernel: &KernelProfile) -> Result<StageOutput> {
        if stage == Stage::CheckIu {
            let (all_ok_tol, artifacts) = self.check_iu(kernel)?;
            Ok(StageOutput {
                outcome: if all_ok_tol { Outcome::Pass } else { Outcome::Fail },
                artifacts,
                details: serde_json::json!({"all_ok_tol": all_ok_tol}),
            })
        } else {
            let (min_q, artifacts) = self.resonant(kernel)?;
            Ok(StageOutput {
                outcome: Outcome::Pass,
                artifacts,
                details: serde_json::json!({"min_Q": min_q}),
            })
        }
    }
}

fn error_details(err: &HarnessError) -> serde_json::Value {
    let code = match err {
        HarnessError::Certify(e) => e.code(),
        HarnessError::Io(_) => "io_error",
        HarnessError::Csv(_) => "csv_error",
        HarnessError::Json(_) => "json_error",
    };
    serde_json::json!({"code": code, "error": err.to_string()})
}

//! CLI entrypoint for the coercivity certification harness.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use coercivity_harness::CertificationRunner;
use coercivity_harness::artifacts::load_config;
use coercivity_harness::integrity::{ARTIFACT_INDEX_JSON, HASH_MANIFEST, append_hash_manifest};
use coercivity_harness::structured_log::LogEmitter;

/// Grid-based certification of the coercivity inequality.
#[derive(Debug, Parser)]
#[command(name = "coercivity-harness")]
#[command(about = "Kernel tables, inequality checks, resonant scans and archimedean bounds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// JSON configuration file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output root; tables and summaries go to `<out>/data`.
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Worker threads for the scan loops (overrides the configuration).
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tabulate the kernel profile.
    Kernels {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run the randomized inequality check; fails if the tolerant verdict fails.
    CheckIu {
        #[command(flatten)]
        common: CommonArgs,
        /// Read the kernel from a `xi,Khat` table instead of building it.
        #[arg(long)]
        kernel: Option<PathBuf>,
    },
    /// Closed-form flipping amplitudes and the full resonant scan.
    Resonant {
        #[command(flatten)]
        common: CommonArgs,
        /// Read the kernel from a `xi,Khat` table instead of building it.
        #[arg(long)]
        kernel: Option<PathBuf>,
    },
    /// Archimedean residual scan and bound constants.
    Archimedean {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// All stages in dependency order, with a structured log and hash manifest.
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Read the kernel from a `xi,Khat` table instead of building it.
        #[arg(long)]
        kernel: Option<PathBuf>,
        /// Structured JSONL log path (default: `<out>/run_log.jsonl`); `-` writes to stderr.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long, default_value = "certify")]
        run_id: String,
    },
    /// Append SHA-256 lines for every file under `data/` and `figures/`.
    HashArtifacts {
        /// Root containing `data/` and `figures/`.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn runner(
    common: &CommonArgs,
    kernel: Option<PathBuf>,
) -> Result<CertificationRunner, Box<dyn std::error::Error>> {
    let mut config = load_config(common.config.as_deref())?;
    if let Some(workers) = common.workers {
        config.workers = workers;
    }
    Ok(CertificationRunner::new(config, &common.out)?.with_kernel_table(kernel))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Kernels { common } => {
            let runner = runner(&common, None)?;
            let kernel = runner.load_kernel()?;
            for path in runner.write_kernels(&kernel)? {
                eprintln!("[kernels] wrote {path} ({} points)", kernel.grid().len());
            }
        }
        Command::CheckIu { common, kernel } => {
            let runner = runner(&common, kernel)?;
            let profile = runner.load_kernel()?;
            let (all_ok_tol, written) = runner.check_iu(&profile)?;
            eprintln!("[check-iu] wrote {}", written.join(", "));
            if !all_ok_tol {
                return Err("inequality check failed under tolerance".into());
            }
            eprintln!("[check-iu] all samples pass under tolerance");
        }
        Command::Resonant { common, kernel } => {
            let runner = runner(&common, kernel)?;
            let profile = runner.load_kernel()?;
            let (min_q, written) = runner.resonant(&profile)?;
            eprintln!("[resonant] wrote {}", written.join(", "));
            eprintln!("[resonant] min Q = {min_q}");
        }
        Command::Archimedean { common } => {
            let runner = runner(&common, None)?;
            let ((c_lower, c_upper), written) = runner.archimedean()?;
            eprintln!("[archimedean] wrote {}", written.join(", "));
            eprintln!("[archimedean] C_lower = {c_lower}, C_upper = {c_upper}");
        }
        Command::Run {
            common,
            kernel,
            log,
            run_id,
        } => {
            let runner = runner(&common, kernel)?;
            std::fs::create_dir_all(&common.out)?;
            let log_path = log.unwrap_or_else(|| common.out.join("run_log.jsonl"));
            let mut emitter = if log_path.as_os_str() == "-" {
                LogEmitter::to_stderr(&run_id)
            } else {
                LogEmitter::to_file(&log_path, &run_id)?
            };
            let report = runner.run_all(&mut emitter)?;
            for stage in &report.stages {
                eprintln!(
                    "[run] {:<12} {:?} ({} ms)",
                    stage.stage.name(),
                    stage.outcome,
                    stage.duration_ms
                );
                if let Some(err) = &stage.error {
                    eprintln!("[run]   {err}");
                }
            }
            eprintln!(
                "[run] log {}, index {}, manifest {}",
                log_path.display(),
                common.out.join(ARTIFACT_INDEX_JSON).display(),
                common.out.join(HASH_MANIFEST).display()
            );
            if !report.all_passed() {
                return Err("one or more stages did not pass".into());
            }
        }
        Command::HashArtifacts { root } => {
            let count = append_hash_manifest(&root)?;
            eprintln!(
                "[hash-artifacts] appended {count} line(s) to {}",
                root.join(HASH_MANIFEST).display()
            );
        }
    }

    Ok(())
}

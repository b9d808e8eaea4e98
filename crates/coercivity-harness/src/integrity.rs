//! SHA-256 fingerprints for produced artifacts.
//!
//! `hashes.sha256` is append-only: each invocation adds one
//! `<sha256>  <relative path>` line per file found under `data/` and
//! `figures/`, so the manifest keeps the history of every run.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::Digest;

use crate::error::Result;
use crate::structured_log::ArtifactIndex;

pub const HASH_MANIFEST: &str = "hashes.sha256";
pub const ARTIFACT_INDEX_JSON: &str = "artifact_index.json";

/// Subdirectories whose files are fingerprinted.
pub const HASHED_DIRS: [&str; 2] = ["data", "figures"];

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub fn sha256_hex(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    Ok(hex_lower(&sha2::Sha256::digest(&data)))
}

/// Files under `HASHED_DIRS` of `root`, as sorted root-relative paths with
/// `/` separators. Missing directories are skipped.
pub fn collect_artifacts(root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for dir in HASHED_DIRS {
        let base = root.join(dir);
        if base.is_dir() {
            walk(&base, &mut found)?;
        }
    }
    let mut rel: Vec<String> = found
        .iter()
        .filter_map(|p| p.strip_prefix(root).ok())
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    rel.sort();
    Ok(rel)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Append one manifest line per artifact. Returns the number of lines written.
pub fn append_hash_manifest(root: &Path) -> Result<usize> {
    let files = collect_artifacts(root)?;
    let mut lines = String::new();
    for rel in &files {
        let digest = sha256_hex(&root.join(rel))?;
        lines.push_str(&format!("{digest}  {rel}\n"));
    }
    let mut manifest = OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.join(HASH_MANIFEST))?;
    manifest.write_all(lines.as_bytes())?;
    Ok(files.len())
}

/// Index every artifact under `root` with its digest and size.
pub fn build_artifact_index(root: &Path, run_id: &str) -> Result<ArtifactIndex> {
    let mut index = ArtifactIndex::new(run_id);
    for rel in collect_artifacts(root)? {
        let path = root.join(&rel);
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => "table",
            Some("json") => "summary",
            Some("png" | "svg" | "pdf") => "figure",
            _ => "other",
        };
        let size = fs::metadata(&path)?.len();
        let digest = sha256_hex(&path)?;
        index.add(rel.clone(), kind, digest).describe_last(size, describe(&rel));
    }
    Ok(index)
}

fn describe(rel: &str) -> String {
    let name = rel.rsplit('/').next().unwrap_or(rel);
    let text = match name {
        "kernel_profile.csv" => "kernel profile xi,Khat",
        "IU_check_random.csv" => "per-packet inequality check",
        "IU_stats.json" => "inequality check verdicts",
        "resonant_Q_scan.csv" => "quadratic form over gamma x R x amp",
        "resonant_amp_threshold.csv" => "closed-form flipping amplitudes",
        "resonant_summary.json" => "global minimum of the resonant scan",
        "arch_bounds_scan.csv" => "archimedean residual on the grid",
        "arch_bounds_constants.json" => "grid-certified archimedean constants",
        _ => "artifact",
    };
    text.to_string()
}

pub fn write_artifact_index(root: &Path, index: &ArtifactIndex) -> Result<PathBuf> {
    let path = root.join(ARTIFACT_INDEX_JSON);
    fs::write(&path, index.to_json()?)?;
    Ok(path)
}

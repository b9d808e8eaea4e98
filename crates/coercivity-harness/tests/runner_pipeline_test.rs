//! Integration test: full certification runs through the stage runner.

use std::fs;
use std::path::{Path, PathBuf};

use coercivity_core::CertificationConfig;
use coercivity_harness::integrity::{ARTIFACT_INDEX_JSON, HASH_MANIFEST};
use coercivity_harness::structured_log::{LogEmitter, Outcome, validate_log_text};
use coercivity_harness::{CertificationRunner, Stage};

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_config() -> CertificationConfig {
    CertificationConfig {
        kernel_xi_max: 16.0,
        kernel_points: 513,
        iu_samples: 8,
        iu_center_range: [-6.0, 6.0],
        res_gammas: vec![2.0, 4.0],
        res_rs: vec![2.0, 8.0],
        res_amp_list: vec![0.0, 0.3],
        arch_xi_max: 8.0,
        arch_xi_step: 0.5,
        ..CertificationConfig::default()
    }
}

fn header(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string()
}

fn load_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn full_run_writes_every_artifact_and_a_valid_log() {
    let out = unique_tmp_dir("coercivity-run-full");
    let runner = CertificationRunner::new(small_config(), &out).unwrap();
    let mut log = LogEmitter::to_buffer("full");
    let report = runner.run_all(&mut log).unwrap();

    assert!(report.all_passed(), "{report:?}");
    assert_eq!(report.stages.len(), 4);

    let data = out.join("data");
    assert_eq!(header(&data.join("kernel_profile.csv")), "xi,Khat");
    assert_eq!(header(&data.join("IU_check_random.csv")), "i,Q,rhs,ok");
    assert_eq!(header(&data.join("resonant_Q_scan.csv")), "gamma,R,amp,Q");
    assert_eq!(
        header(&data.join("resonant_amp_threshold.csv")),
        "gamma,R,Q0,Qb_unit,amp_threshold"
    );
    assert_eq!(header(&data.join("arch_bounds_scan.csv")), "xi,Repsi,log_mod_z,resid");

    let stats = load_json(&data.join("IU_stats.json"));
    assert_eq!(stats["source_csv"], "data/IU_check_random.csv");
    assert_eq!(stats["lhs_col"], "Q");
    assert_eq!(stats["seed"], 123);
    assert_eq!(stats["samples"], 8);
    assert_eq!(stats["all_ok_tol"], true);
    assert!(stats["eps_used"].as_f64().unwrap() >= 1e-12);

    let resonant = load_json(&data.join("resonant_summary.json"));
    assert!(resonant["min_Q"].is_number());
    assert!(resonant["at"]["gamma"].is_number());
    assert_eq!(resonant["sigma_z"], 0.75);

    let arch = load_json(&data.join("arch_bounds_constants.json"));
    assert_eq!(arch["grid_points"], 33);
    assert_eq!(arch["precision_bits"], 50);
    assert!(arch["C_lower"].as_f64().unwrap() > 0.0);
    assert!(arch["inequalities"]["lower"].is_string());

    let index = load_json(&out.join(ARTIFACT_INDEX_JSON));
    assert_eq!(index["run_id"], "full");
    assert_eq!(index["artifacts"].as_array().unwrap().len(), 8);

    let manifest = fs::read_to_string(out.join(HASH_MANIFEST)).unwrap();
    assert_eq!(manifest.lines().count(), 8);
    assert!(manifest.lines().all(|l| l.contains("  data/")));

    let text = log.buffered().unwrap();
    let (lines, errors) = validate_log_text(text);
    assert!(errors.is_empty(), "{errors:?}");
    // start + result per stage, plus run_complete.
    assert_eq!(lines, 9);
    assert!(text.contains("\"trace_id\":\"full::kernels::001\""));
}

#[test]
fn worker_count_does_not_change_outputs() {
    let serial_out = unique_tmp_dir("coercivity-run-serial");
    let parallel_out = unique_tmp_dir("coercivity-run-parallel");
    let serial_cfg = small_config();
    let parallel_cfg = CertificationConfig {
        workers: 3,
        ..small_config()
    };
    CertificationRunner::new(serial_cfg, &serial_out)
        .unwrap()
        .run_all(&mut LogEmitter::to_buffer("s"))
        .unwrap();
    CertificationRunner::new(parallel_cfg, &parallel_out)
        .unwrap()
        .run_all(&mut LogEmitter::to_buffer("p"))
        .unwrap();

    for name in [
        "IU_check_random.csv",
        "resonant_Q_scan.csv",
        "resonant_amp_threshold.csv",
        "arch_bounds_scan.csv",
    ] {
        let a = fs::read(serial_out.join("data").join(name)).unwrap();
        let b = fs::read(parallel_out.join("data").join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between worker counts");
    }
}

#[test]
fn missing_kernel_table_skips_dependent_stages_only() {
    let out = unique_tmp_dir("coercivity-run-missing-kernel");
    let runner = CertificationRunner::new(small_config(), &out)
        .unwrap()
        .with_kernel_table(Some(out.join("nowhere.csv")));
    let mut log = LogEmitter::to_buffer("missing");
    let report = runner.run_all(&mut log).unwrap();

    assert_eq!(report.outcome_of(Stage::Kernels), Some(Outcome::Error));
    assert_eq!(report.outcome_of(Stage::CheckIu), Some(Outcome::Skip));
    assert_eq!(report.outcome_of(Stage::Resonant), Some(Outcome::Skip));
    assert_eq!(report.outcome_of(Stage::Archimedean), Some(Outcome::Pass));
    assert!(!report.all_passed());

    let text = log.buffered().unwrap();
    assert!(text.contains("\"event\":\"stage_failed\""));
    assert!(text.contains("data_not_found_error"));
    assert!(out.join("data/arch_bounds_constants.json").is_file());
    assert!(!out.join("data/IU_stats.json").exists());
}

#[test]
fn external_kernel_table_feeds_the_scans() {
    let first = unique_tmp_dir("coercivity-run-kernel-src");
    CertificationRunner::new(small_config(), &first)
        .unwrap()
        .run_all(&mut LogEmitter::to_buffer("a"))
        .unwrap();

    let second = unique_tmp_dir("coercivity-run-kernel-dst");
    let report = CertificationRunner::new(small_config(), &second)
        .unwrap()
        .with_kernel_table(Some(first.join("data/kernel_profile.csv")))
        .run_all(&mut LogEmitter::to_buffer("b"))
        .unwrap();
    assert!(report.all_passed());
    assert_eq!(
        fs::read(first.join("data/resonant_Q_scan.csv")).unwrap(),
        fs::read(second.join("data/resonant_Q_scan.csv")).unwrap()
    );
}

#[test]
fn malformed_kernel_table_aborts_the_run() {
    let out = unique_tmp_dir("coercivity-run-bad-kernel");
    let table = out.join("bad.csv");
    fs::write(&table, "xi,Khat\n0.0,0.0\n1.0,0.1\n3.0,0.2\n").unwrap();
    let runner = CertificationRunner::new(small_config(), &out)
        .unwrap()
        .with_kernel_table(Some(table));
    let mut log = LogEmitter::to_buffer("bad");
    let err = runner.run_all(&mut log).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("grid mismatch"));
    assert!(log.buffered().unwrap().contains("\"level\":\"fatal\""));
    assert!(!out.join(ARTIFACT_INDEX_JSON).exists());
}

#[test]
fn failing_inequality_marks_the_stage_failed() {
    let out = unique_tmp_dir("coercivity-run-negative-floor");
    let cfg = CertificationConfig {
        lstar: -0.2,
        ..small_config()
    };
    let report = CertificationRunner::new(cfg, &out)
        .unwrap()
        .run_all(&mut LogEmitter::to_buffer("neg"))
        .unwrap();
    assert_eq!(report.outcome_of(Stage::CheckIu), Some(Outcome::Fail));
    assert_eq!(report.outcome_of(Stage::Resonant), Some(Outcome::Pass));
    let stats = load_json(&out.join("data/IU_stats.json"));
    assert_eq!(stats["all_ok_tol"], false);
}

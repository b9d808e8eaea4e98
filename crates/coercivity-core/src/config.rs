//! Certification configuration.
//!
//! A flat key/value object; every key is optional and unrecognized keys are
//! ignored. The orchestration layer builds one value and hands it to each
//! stage. Invalid values are reported with the offending field and are never
//! replaced by defaults.

use serde::{Deserialize, Serialize};

use crate::error::{CertifyError, Result};
use crate::grid::Grid;
use crate::kernel::KernelParams;
use crate::special::MAX_PRECISION_BITS;

/// Seed of the verifier's random stream.
pub const DEFAULT_IU_SEED: u64 = 123;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationConfig {
    #[serde(rename = "Xi0")]
    pub xi0: f64,
    pub c0: f64,
    #[serde(rename = "Lstar")]
    pub lstar: f64,

    pub kernel_xi_max: f64,
    pub kernel_points: usize,

    pub iu_samples: usize,
    pub iu_seed: u64,
    pub iu_center_range: [f64; 2],
    pub iu_width_range: [f64; 2],

    pub res_gammas: Vec<f64>,
    #[serde(rename = "res_Rs")]
    pub res_rs: Vec<f64>,
    pub res_sigma_z: f64,
    pub res_amp_list: Vec<f64>,

    pub arch_xi_max: f64,
    pub arch_xi_step: f64,
    pub arch_precision_bits: u32,

    /// Worker threads for the outer scan loops; 1 runs inline.
    pub workers: usize,
}

impl Default for CertificationConfig {
    fn default() -> Self {
        Self {
            xi0: 16.0,
            c0: 0.5,
            lstar: 0.0,
            kernel_xi_max: 64.0,
            kernel_points: 4097,
            iu_samples: 64,
            iu_seed: DEFAULT_IU_SEED,
            iu_center_range: [-24.0, 24.0],
            iu_width_range: [0.5, 2.0],
            res_gammas: vec![4.0, 6.0, 8.0, 12.0, 16.0],
            res_rs: vec![2.0, 4.0, 8.0, 12.0, 16.0, 24.0, 32.0],
            res_sigma_z: 0.75,
            res_amp_list: vec![0.0, 0.05, 0.1, 0.2, 0.3],
            arch_xi_max: 256.0,
            arch_xi_step: 0.25,
            arch_precision_bits: 50,
            workers: 1,
        }
    }
}

impl CertificationConfig {
    /// Parse a JSON object and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|err| CertifyError::configuration("<config>", json_excerpt(json), err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Report the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.kernel_params()?;
        finite_positive("kernel_xi_max", self.kernel_xi_max)?;
        if self.kernel_points < 2 {
            return Err(CertifyError::configuration(
                "kernel_points",
                self.kernel_points,
                "must be at least 2",
            ));
        }

        if self.iu_samples == 0 {
            return Err(CertifyError::configuration("iu_samples", 0, "must be at least 1"));
        }
        ordered_range("iu_center_range", self.iu_center_range)?;
        ordered_range("iu_width_range", self.iu_width_range)?;
        if self.iu_width_range[0] <= 0.0 {
            return Err(CertifyError::configuration(
                "iu_width_range",
                format!("{:?}", self.iu_width_range),
                "widths must be > 0",
            ));
        }

        finite_list("res_gammas", &self.res_gammas)?;
        finite_list("res_Rs", &self.res_rs)?;
        finite_list("res_amp_list", &self.res_amp_list)?;
        finite_positive("res_sigma_z", self.res_sigma_z)?;

        finite_positive("arch_xi_max", self.arch_xi_max)?;
        finite_positive("arch_xi_step", self.arch_xi_step)?;
        if self.arch_precision_bits == 0 || self.arch_precision_bits > MAX_PRECISION_BITS {
            return Err(CertifyError::configuration(
                "arch_precision_bits",
                self.arch_precision_bits,
                format!("must be in 1..={MAX_PRECISION_BITS}"),
            ));
        }

        if self.workers == 0 {
            return Err(CertifyError::configuration("workers", 0, "must be at least 1"));
        }
        Ok(())
    }

    pub fn kernel_params(&self) -> Result<KernelParams> {
        KernelParams::new(self.xi0, self.c0, self.lstar)
    }

    /// `linspace(-kernel_xi_max, kernel_xi_max, kernel_points)`.
    pub fn kernel_grid(&self) -> Result<Grid> {
        Grid::linspace(-self.kernel_xi_max, self.kernel_xi_max, self.kernel_points)
    }

    pub fn archimedean_grid(&self) -> Result<Grid> {
        Grid::symmetric(self.arch_xi_max, self.arch_xi_step)
    }
}

fn finite_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CertifyError::configuration(field, value, "must be finite and > 0"))
    }
}

fn finite_list(field: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(CertifyError::configuration(field, "[]", "must not be empty"));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(CertifyError::configuration(field, bad, "entries must be finite"));
    }
    Ok(())
}

fn ordered_range(field: &str, [lo, hi]: [f64; 2]) -> Result<()> {
    if lo.is_finite() && hi.is_finite() && lo < hi {
        Ok(())
    } else {
        Err(CertifyError::configuration(
            field,
            format!("[{lo}, {hi}]"),
            "must be a finite range with low < high",
        ))
    }
}

fn json_excerpt(json: &str) -> String {
    const LIMIT: usize = 80;
    let trimmed = json.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = CertificationConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, CertificationConfig::default());
        assert_eq!(cfg.xi0, 16.0);
        assert_eq!(cfg.res_rs, vec![2.0, 4.0, 8.0, 12.0, 16.0, 24.0, 32.0]);
        assert_eq!(cfg.iu_seed, 123);
    }

    #[test]
    fn original_key_names_are_recognized() {
        let cfg = CertificationConfig::from_json_str(
            r#"{"Xi0": 8.0, "Lstar": 0.1, "res_Rs": [4, 8], "res_sigma_z": 0.5}"#,
        )
        .unwrap();
        assert_eq!(cfg.xi0, 8.0);
        assert_eq!(cfg.lstar, 0.1);
        assert_eq!(cfg.res_rs, vec![4.0, 8.0]);
        assert_eq!(cfg.res_sigma_z, 0.5);
        assert_eq!(cfg.c0, 0.5);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = CertificationConfig::from_json_str(r#"{"plot_dpi": 200, "c0": 0.25}"#).unwrap();
        assert_eq!(cfg.c0, 0.25);
    }

    #[test]
    fn non_positive_xi0_is_fatal() {
        let err = CertificationConfig::from_json_str(r#"{"Xi0": 0}"#).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: Xi0 = 0: must be finite and > 0");
    }

    #[test]
    fn wrong_type_is_a_configuration_error() {
        let err = CertificationConfig::from_json_str(r#"{"c0": "half"}"#).unwrap_err();
        assert!(matches!(err, CertifyError::Configuration { .. }));
    }

    #[test]
    fn empty_scan_lists_rejected() {
        let err = CertificationConfig::from_json_str(r#"{"res_amp_list": []}"#).unwrap_err();
        assert!(err.to_string().contains("res_amp_list"));
    }

    #[test]
    fn precision_beyond_working_precision_rejected() {
        let err =
            CertificationConfig::from_json_str(r#"{"arch_precision_bits": 200}"#).unwrap_err();
        assert!(err.to_string().contains("arch_precision_bits"));
    }

    #[test]
    fn default_grids() {
        let cfg = CertificationConfig::default();
        assert_eq!(cfg.kernel_grid().unwrap().len(), 4097);
        assert_eq!(cfg.archimedean_grid().unwrap().len(), 2049);
    }
}

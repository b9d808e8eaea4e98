//! Error taxonomy shared by every certification stage.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CertifyError {
    /// Invalid or missing numeric parameter. Never replaced by a default.
    #[error("configuration error: {field} = {value}: {reason}")]
    Configuration {
        field: String,
        value: String,
        reason: String,
    },
    /// Kernel, packet, or grid disagree on length or spacing.
    #[error("grid mismatch: {detail}")]
    GridMismatch { detail: String },
    /// A special-function evaluation could not reach the requested precision.
    #[error("numeric precision error in {context}: {detail}")]
    NumericPrecision { context: String, detail: String },
    /// A required upstream artifact is unavailable.
    #[error("data not found: {what} ({location})")]
    DataNotFound { what: String, location: String },
}

impl CertifyError {
    pub fn configuration(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn grid_mismatch(detail: impl Into<String>) -> Self {
        Self::GridMismatch {
            detail: detail.into(),
        }
    }

    pub fn numeric_precision(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NumericPrecision {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn data_not_found(what: impl Into<String>, location: impl Into<String>) -> Self {
        Self::DataNotFound {
            what: what.into(),
            location: location.into(),
        }
    }

    /// Stable machine-readable code used in structured logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::GridMismatch { .. } => "grid_mismatch_error",
            Self::NumericPrecision { .. } => "numeric_precision_error",
            Self::DataNotFound { .. } => "data_not_found_error",
        }
    }

    /// Fatal errors stop the whole run; the rest only abort their own scan.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::GridMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, CertifyError>;

use coercivity_core::CertifyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Certify(#[from] CertifyError),
}

impl HarnessError {
    /// Whether the whole run must stop. Numeric failures and missing upstream
    /// data stay local to a stage; bad input and unwritable output abort.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Certify(err) => err.is_fatal(),
            Self::Io(_) | Self::Csv(_) | Self::Json(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

// Error Handling Module
// Standardized error taxonomy and process exit codes for the table builder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Model read failed: {0}")]
    ModelRead(#[from] earth_model::ModelReadError),

    #[error("Phase list missing or empty: {0}")]
    MissingPhaseList(String),

    #[error("Phase list unreadable: {0}")]
    PhaseListUnreadable(#[from] std::io::Error),

    #[error(
        "Negative tau integral {tau} for p={p} in layer p_top={p_top}, p_bot={p_bot}, \
         z_top={z_top}, z_bot={z_bot}"
    )]
    NegativeTauIntegral {
        tau: f64,
        p: f64,
        p_top: f64,
        p_bot: f64,
        z_top: f64,
        z_bot: f64,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type TableResult<T> = Result<T, TableError>;

/// Process exit codes reported by the binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    BadModelRead = 1,
    BadModelFile = 2,
    BadPhaseList = 3,
    BadTauInterval = 4,
}

impl TableError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            TableError::ModelRead(earth_model::ModelReadError::Unreadable(_)) => {
                ExitCode::BadModelRead
            }
            TableError::ModelRead(_) => ExitCode::BadModelFile,
            TableError::MissingPhaseList(_) | TableError::PhaseListUnreadable(_) => {
                ExitCode::BadPhaseList
            }
            TableError::NegativeTauIntegral { .. } => ExitCode::BadTauInterval,
            TableError::Config(_) | TableError::InvalidInput(_) => ExitCode::BadModelRead,
        }
    }
}

// Validation helpers
pub fn validate_finite(value: f64, name: &str) -> TableResult<f64> {
    if value.is_nan() || value.is_infinite() {
        return Err(TableError::InvalidInput(format!("{} must be finite", name)));
    }
    Ok(value)
}

pub fn validate_positive(value: f64, name: &str) -> TableResult<f64> {
    validate_finite(value, name)?;
    if value <= 0.0 {
        return Err(TableError::InvalidInput(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(value)
}

pub fn validate_non_negative(value: f64, name: &str) -> TableResult<f64> {
    validate_finite(value, name)?;
    if value < 0.0 {
        return Err(TableError::InvalidInput(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(value)
}

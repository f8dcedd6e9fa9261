use scanplan::errors::PlanError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown column '{0}' in scan request")]
    UnknownColumn(String),

    #[error("Invalid setting override '{0}', expected name=value")]
    InvalidOverride(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

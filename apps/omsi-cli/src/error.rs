use omsi_core::OmsiError;
use omsi_system::SystemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    System(#[from] SystemError),

    #[error("Invalid loop file: {0}")]
    Invalid(String),
}

pub type CliResult<T> = Result<T, CliError>;

impl From<OmsiError> for CliError {
    fn from(err: OmsiError) -> Self {
        CliError::System(err.into())
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {0}")]
    Configuration(#[from] crate::config::LoadError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

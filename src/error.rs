use crate::history::HistoryError;
use crate::prediction::ml::MlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid hour: {0} (expected 0-23)")]
    InvalidHour(u8),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    #[error("ml error: {0}")]
    Ml(#[from] MlError),
    #[error("prediction task failed: {0}")]
    Task(String),
}

use serde::{Deserialize, Serialize};

/// Query string accepted by `/api/predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictQuery {
    pub hour: u8,
    #[serde(default)]
    pub water_temp: Option<f64>,
    #[serde(default)]
    pub air_temp: Option<f64>,
    #[serde(default)]
    pub weather_condition: i32,
    #[serde(default)]
    pub water_level: f64,
    #[serde(default)]
    pub water_flow: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictErrorResponse {
    pub error_code: PredictErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictErrorCode {
    InvalidParams,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub ml_ready: bool,
    pub timestamp: String,
}

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Successful answer from the prediction service.
#[derive(Debug, Clone, PartialEq)]
pub struct MlPrediction {
    pub surfer_count: u32,
    pub explanation: BTreeMap<String, f64>,
}

/// Features sent to the prediction service. Missing temperatures are sent as
/// 0.0 because the service requires numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MlPredictionParams {
    pub hour: u8,
    pub water_temp: f64,
    pub air_temp: f64,
    pub water_level: f64,
    pub weather_condition: i32,
}

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        retry_after_seconds: Option<u64>,
    },
    #[error("ML transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ML response decode error: {0}")]
    Decode(String),
}

impl MlError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MlError::Http { status, .. } => Some(*status),
            MlError::Transport(_) | MlError::Decode(_) => None,
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            MlError::Http {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            MlError::Transport(_) | MlError::Decode(_) => None,
        }
    }
}

pub trait MlPredictor: Send + Sync + fmt::Debug {
    fn predict(&self, params: &MlPredictionParams) -> Result<MlPrediction, MlError>;

    /// Whether the service reports its model as loaded.
    fn is_ready(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    surfer_count: u32,
    #[serde(default)]
    explanation: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct WarmingUpBody {
    retry_after_seconds: Option<u64>,
}

/// Blocking HTTP client for the prediction service.
///
/// Must be built and dropped outside the async runtime.
pub struct HttpMlClient {
    client: Client,
    base_url: String,
}

impl HttpMlClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MlError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl fmt::Debug for HttpMlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMlClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MlPredictor for HttpMlClient {
    fn predict(&self, params: &MlPredictionParams) -> Result<MlPrediction, MlError> {
        let response = self.client.post(self.url("/predict")).json(params).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(response));
        }

        let body = response.text()?;
        let parsed: PredictResponse =
            serde_json::from_str(&body).map_err(|err| MlError::Decode(err.to_string()))?;
        Ok(MlPrediction {
            surfer_count: parsed.surfer_count,
            explanation: parsed.explanation,
        })
    }

    fn is_ready(&self) -> bool {
        let result = self
            .client
            .get(self.url("/health"))
            .send()
            .and_then(Response::error_for_status)
            .and_then(|response| response.json::<HealthResponse>());
        match result {
            Ok(health) => health.ready,
            Err(err) => {
                debug!(error = %err, "ML health probe failed");
                false
            }
        }
    }
}

fn http_error(response: Response) -> MlError {
    let status = response.status();
    let header_hint = parse_retry_after(
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok()),
    );
    let body = response.text().unwrap_or_else(|err| {
        debug!(error = %err, status = status.as_u16(), "Failed to read ML error body");
        String::new()
    });

    let retry_after_seconds = if is_retryable_status(status) {
        header_hint.or_else(|| retry_after_from_body(&body))
    } else {
        None
    };

    MlError::Http {
        status: status.as_u16(),
        body,
        retry_after_seconds,
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Parses the delta-seconds form of `Retry-After`.
fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value?.trim().parse::<u64>().ok()
}

fn retry_after_from_body(body: &str) -> Option<u64> {
    serde_json::from_str::<WarmingUpBody>(body)
        .ok()?
        .retry_after_seconds
}

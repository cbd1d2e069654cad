use crate::history::HistoryError;
use crate::prediction::baseline::HistoricalSource;
use crate::prediction::ml::{MlError, MlPrediction, MlPredictionParams, MlPredictor};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
enum HistoryBehavior {
    Average(Option<f64>),
    Fail,
}

/// History source returning the same average for every hour.
#[derive(Debug)]
pub struct StaticHistory {
    behavior: HistoryBehavior,
}

impl StaticHistory {
    pub fn with_average(average: f64) -> Self {
        Self {
            behavior: HistoryBehavior::Average(Some(average)),
        }
    }

    pub fn empty() -> Self {
        Self {
            behavior: HistoryBehavior::Average(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: HistoryBehavior::Fail,
        }
    }
}

impl HistoricalSource for StaticHistory {
    fn average_count_for_hour(&self, _hour: u8) -> Result<Option<f64>, HistoryError> {
        match self.behavior {
            HistoryBehavior::Average(average) => Ok(average),
            HistoryBehavior::Fail => Err(HistoryError::ConnectionLock),
        }
    }
}

#[derive(Debug, Clone)]
enum MlBehavior {
    Success(MlPrediction),
    HttpFailure {
        status: u16,
        body: String,
        retry_after_seconds: Option<u64>,
    },
    Malformed(String),
}

/// ML predictor that replays a fixed answer and records what it was asked.
#[derive(Debug)]
pub struct ScriptedMlPredictor {
    behavior: MlBehavior,
    ready: bool,
    calls: Mutex<Vec<MlPredictionParams>>,
}

impl ScriptedMlPredictor {
    fn new(behavior: MlBehavior, ready: bool) -> Self {
        Self {
            behavior,
            ready,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(surfer_count: u32, explanation: &[(&str, f64)]) -> Self {
        let explanation: BTreeMap<String, f64> = explanation
            .iter()
            .map(|(name, weight)| (name.to_string(), *weight))
            .collect();
        Self::new(
            MlBehavior::Success(MlPrediction {
                surfer_count,
                explanation,
            }),
            true,
        )
    }

    pub fn failing_with_status(status: u16, retry_after_seconds: Option<u64>) -> Self {
        Self::new(
            MlBehavior::HttpFailure {
                status,
                body: format!(r#"{{"error": {{"code": {status}}}}}"#),
                retry_after_seconds,
            },
            false,
        )
    }

    pub fn malformed(detail: &str) -> Self {
        Self::new(MlBehavior::Malformed(detail.to_string()), true)
    }

    /// Parameters received so far, in call order.
    pub fn calls(&self) -> Vec<MlPredictionParams> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl MlPredictor for ScriptedMlPredictor {
    fn predict(&self, params: &MlPredictionParams) -> Result<MlPrediction, MlError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(params.clone());
        }
        match &self.behavior {
            MlBehavior::Success(prediction) => Ok(prediction.clone()),
            MlBehavior::HttpFailure {
                status,
                body,
                retry_after_seconds,
            } => Err(MlError::Http {
                status: *status,
                body: body.clone(),
                retry_after_seconds: *retry_after_seconds,
            }),
            MlBehavior::Malformed(detail) => Err(MlError::Decode(detail.clone())),
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

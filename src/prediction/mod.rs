use crate::error::AppError;
use crate::state::{PredictionParams, PredictionResult, PredictionSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod baseline;
pub mod factors;
pub mod ml;
pub mod mock;

use baseline::{HistoricalSource, baseline_for_hour};
use factors::calculate_factor;
use ml::{MlError, MlPrediction, MlPredictionParams, MlPredictor};

pub const WARMING_UP_NOTICE: &str =
    "Model is waking up (Render free tier). Showing fallback estimate.";

/// Result of a prediction that produced a body.
#[derive(Debug)]
pub enum PredictionOutcome {
    /// The ML service answered.
    Ml(PredictionResult),
    /// The ML service is warming up; `result` holds the rule-based estimate and
    /// `cause` the upstream error so the caller can signal it.
    Degraded {
        result: PredictionResult,
        cause: MlError,
    },
}

impl PredictionOutcome {
    pub fn result(&self) -> &PredictionResult {
        match self {
            PredictionOutcome::Ml(result) => result,
            PredictionOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> PredictionResult {
        match self {
            PredictionOutcome::Ml(result) => result,
            PredictionOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PredictionOutcome::Degraded { .. })
    }
}

/// A 429 or 503 from the ML service means the model is still loading.
pub fn is_warming_up(err: &MlError) -> bool {
    matches!(err.status(), Some(429) | Some(503))
}

/// Baseline times factor, rounded half away from zero and never negative.
pub fn rule_based_prediction(base: f64, factor: f64) -> u32 {
    let estimate = (base * factor).round();
    if estimate.is_finite() && estimate > 0.0 {
        estimate.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Combines the historical baseline, rule-based factor and ML service.
#[derive(Debug, Clone)]
pub struct PredictionService {
    history: Arc<dyn HistoricalSource>,
    ml: Arc<dyn MlPredictor>,
}

impl PredictionService {
    pub fn new(history: Arc<dyn HistoricalSource>, ml: Arc<dyn MlPredictor>) -> Self {
        Self { history, ml }
    }

    /// Blocking: queries history and calls the ML service.
    pub fn predict(&self, params: &PredictionParams) -> Result<PredictionOutcome, AppError> {
        let rule_based = self.rule_based_estimate(params)?;

        match self.ml.predict(&ml_params(params)) {
            Ok(prediction) => Ok(PredictionOutcome::Ml(ml_result(params, prediction))),
            Err(err) if is_warming_up(&err) => {
                warn!(
                    status = ?err.status(),
                    retry_after_seconds = ?err.retry_after_seconds(),
                    prediction = rule_based,
                    "ML service warming up, using rule-based fallback"
                );
                Ok(PredictionOutcome::Degraded {
                    result: fallback_result(params, rule_based, err.retry_after_seconds()),
                    cause: err,
                })
            }
            Err(err) => Err(AppError::Ml(err)),
        }
    }

    pub fn rule_based_estimate(&self, params: &PredictionParams) -> Result<u32, AppError> {
        let base = baseline_for_hour(self.history.as_ref(), params.hour())?;
        let factor = calculate_factor(
            params.hour(),
            params.water_temp,
            params.weather(),
            params.water_level,
            params.water_flow,
        );
        let prediction = rule_based_prediction(base, factor);
        debug!(
            hour = params.hour(),
            base, factor, prediction, "Computed rule-based estimate"
        );
        Ok(prediction)
    }
}

fn ml_params(params: &PredictionParams) -> MlPredictionParams {
    MlPredictionParams {
        hour: params.hour(),
        water_temp: params.water_temp.unwrap_or(0.0),
        air_temp: params.air_temp.unwrap_or(0.0),
        water_level: params.water_level,
        weather_condition: params.weather_condition,
    }
}

fn ml_result(params: &PredictionParams, prediction: MlPrediction) -> PredictionResult {
    PredictionResult {
        hour: params.hour(),
        water_temperature: params.water_temp,
        air_temperature: params.air_temp,
        weather_condition: params.weather_condition,
        water_level: params.water_level,
        prediction: prediction.surfer_count,
        explanation: prediction.explanation,
        degraded: false,
        source: PredictionSource::Ml,
        notice: None,
        retry_after_seconds: None,
    }
}

fn fallback_result(
    params: &PredictionParams,
    prediction: u32,
    retry_after_seconds: Option<u64>,
) -> PredictionResult {
    PredictionResult {
        hour: params.hour(),
        water_temperature: params.water_temp,
        air_temperature: params.air_temp,
        weather_condition: params.weather_condition,
        water_level: params.water_level,
        prediction,
        explanation: BTreeMap::new(),
        degraded: true,
        source: PredictionSource::RuleBasedFallback,
        notice: Some(WARMING_UP_NOTICE.to_string()),
        retry_after_seconds,
    }
}

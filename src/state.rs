use crate::error::AppError;
use crate::prediction::PredictionService;
use crate::prediction::baseline::HistoricalSource;
use crate::prediction::ml::MlPredictor;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MAX_HOUR: u8 = 23;

/// Input for a single prediction request.
///
/// Temperatures are optional readings: `None` means the sensor gave nothing,
/// which is not the same as a reading of 0 degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionParams {
    hour: u8,
    pub water_temp: Option<f64>,
    pub air_temp: Option<f64>,
    pub weather_condition: i32,
    pub water_level: f64,
    /// Accepted but not yet used by any rule.
    pub water_flow: f64,
}

impl PredictionParams {
    pub fn new(
        hour: u8,
        water_temp: Option<f64>,
        air_temp: Option<f64>,
        weather_condition: i32,
        water_level: f64,
        water_flow: f64,
    ) -> Result<Self, AppError> {
        if hour > MAX_HOUR {
            return Err(AppError::InvalidHour(hour));
        }
        Ok(Self {
            hour,
            water_temp,
            air_temp,
            weather_condition,
            water_level,
            water_flow,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn weather(&self) -> WeatherSignal {
        WeatherSignal {
            temperature: self.air_temp,
            condition: self.weather_condition,
        }
    }
}

/// Air temperature and condition code as reported by the weather feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSignal {
    pub temperature: Option<f64>,
    pub condition: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Ml,
    RuleBasedFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionResult {
    pub hour: u8,
    pub water_temperature: Option<f64>,
    pub air_temperature: Option<f64>,
    pub weather_condition: i32,
    pub water_level: f64,
    pub prediction: u32,
    pub explanation: BTreeMap<String, f64>,
    pub degraded: bool,
    pub source: PredictionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Shared service context handed to the API layer.
#[derive(Debug, Clone)]
pub struct AppState {
    predictions: PredictionService,
    ml: Arc<dyn MlPredictor>,
}

impl AppState {
    pub fn new(history: Arc<dyn HistoricalSource>, ml: Arc<dyn MlPredictor>) -> Self {
        Self {
            predictions: PredictionService::new(history, Arc::clone(&ml)),
            ml,
        }
    }

    pub fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    pub fn ml(&self) -> &dyn MlPredictor {
        self.ml.as_ref()
    }
}

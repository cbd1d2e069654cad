use crate::api::responses::{
    HealthStatus, HealthSuccessResponse, PredictErrorCode, PredictErrorResponse, PredictQuery,
};
use crate::error::AppError;
use crate::prediction::PredictionOutcome;
use crate::state::{AppState, PredictionParams, PredictionResult};
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum PredictResponse {
    Success(PredictionResult),
    Degraded {
        body: PredictionResult,
        retry_after_seconds: Option<u64>,
    },
    Error {
        status: StatusCode,
        body: PredictErrorResponse,
    },
}

impl IntoResponse for PredictResponse {
    fn into_response(self) -> Response {
        match self {
            PredictResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            PredictResponse::Degraded {
                body,
                retry_after_seconds: Some(seconds),
            } => (
                StatusCode::OK,
                [(RETRY_AFTER, seconds.to_string())],
                Json(body),
            )
                .into_response(),
            PredictResponse::Degraded { body, .. } => (StatusCode::OK, Json(body)).into_response(),
            PredictResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_predict(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> impl IntoResponse {
    let query = match accept_query(query, SystemTime::now()) {
        Ok(query) => query,
        Err(response) => return response,
    };
    // The pipeline does blocking database and HTTP I/O.
    let task = tokio::task::spawn_blocking(move || {
        build_predict_response(&state, query, SystemTime::now())
    });
    match task.await {
        Ok(response) => response,
        Err(err) => predict_internal_error(&AppError::Task(err.to_string())),
    }
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let task = tokio::task::spawn_blocking(move || state.ml().is_ready());
    let ml_ready = match task.await {
        Ok(ready) => ready,
        Err(err) => {
            warn!(error = %err, "ML readiness probe task failed");
            false
        }
    };
    build_health_response(ml_ready, SystemTime::now())
}

/// Malformed, out-of-range or missing query fields get the JSON error body.
fn accept_query(
    query: Result<Query<PredictQuery>, QueryRejection>,
    now: SystemTime,
) -> Result<PredictQuery, PredictResponse> {
    match query {
        Ok(Query(query)) => Ok(query),
        Err(rejection) => Err(invalid_params_response(
            &AppError::InvalidQuery(rejection.body_text()),
            now,
        )),
    }
}

fn build_predict_response(
    state: &AppState,
    query: PredictQuery,
    now: SystemTime,
) -> PredictResponse {
    let params = match PredictionParams::new(
        query.hour,
        query.water_temp,
        query.air_temp,
        query.weather_condition,
        query.water_level,
        query.water_flow,
    ) {
        Ok(params) => params,
        Err(err) => return invalid_params_response(&err, now),
    };

    match state.predictions().predict(&params) {
        Ok(PredictionOutcome::Ml(result)) => PredictResponse::Success(result),
        Ok(PredictionOutcome::Degraded { result, .. }) => PredictResponse::Degraded {
            retry_after_seconds: result.retry_after_seconds,
            body: result,
        },
        Err(err) => predict_internal_error(&err),
    }
}

fn invalid_params_response(err: &AppError, now: SystemTime) -> PredictResponse {
    match format_timestamp(now) {
        Ok(formatted) => PredictResponse::Error {
            status: StatusCode::BAD_REQUEST,
            body: PredictErrorResponse {
                error_code: PredictErrorCode::InvalidParams,
                error_message: err.to_string(),
                timestamp: formatted,
            },
        },
        Err(_err) => predict_internal_error(&AppError::Task(
            "timestamp formatting failure".to_string(),
        )),
    }
}

fn predict_internal_error(err: &AppError) -> PredictResponse {
    error!(error = %err, "Internal error while handling /api/predict");
    PredictResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: PredictErrorResponse {
            error_code: PredictErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: now_timestamp(),
        },
    }
}

fn build_health_response(ml_ready: bool, now: SystemTime) -> Response {
    let status = if ml_ready {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };
    match format_timestamp(now) {
        Ok(timestamp) => (
            StatusCode::OK,
            Json(HealthSuccessResponse {
                status,
                ml_ready,
                timestamp,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Internal error while handling /api/health");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn now_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    })
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::WARMING_UP_NOTICE;
    use crate::prediction::mock::{ScriptedMlPredictor, StaticHistory};
    use crate::state::PredictionSource;
    use axum::http::Uri;
    use axum::http::header::CONTENT_TYPE;
    use std::time::{Duration, UNIX_EPOCH};

    fn app_state(history: StaticHistory, ml: ScriptedMlPredictor) -> AppState {
        AppState::new(Arc::new(history), Arc::new(ml))
    }

    fn query(hour: u8) -> PredictQuery {
        PredictQuery {
            hour,
            water_temp: Some(12.0),
            air_temp: Some(18.0),
            weather_condition: 0,
            water_level: 147.0,
            water_flow: 25.0,
        }
    }

    #[test]
    fn predict_returns_ml_result() {
        let state = app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::succeeding(7, &[("hour", 0.3)]),
        );

        let response = build_predict_response(&state, query(9), UNIX_EPOCH);

        match response {
            PredictResponse::Success(body) => {
                assert_eq!(body.prediction, 7);
                assert_eq!(body.source, PredictionSource::Ml);
                assert!(!body.degraded);
                assert_eq!(body.hour, 9);
                assert_eq!(body.water_level, 147.0);
            }
            _ => panic!("expected success response"),
        }
    }

    #[test]
    fn predict_returns_degraded_body_with_retry_hint() {
        let state = app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::failing_with_status(503, Some(30)),
        );

        let response = build_predict_response(&state, query(9), UNIX_EPOCH);

        match response {
            PredictResponse::Degraded {
                body,
                retry_after_seconds,
            } => {
                assert_eq!(retry_after_seconds, Some(30));
                assert!(body.degraded);
                assert_eq!(body.source, PredictionSource::RuleBasedFallback);
                assert_eq!(body.notice.as_deref(), Some(WARMING_UP_NOTICE));
                // 10 * (1.0 + high water level 0.2)
                assert_eq!(body.prediction, 12);
            }
            _ => panic!("expected degraded response"),
        }
    }

    #[test]
    fn degraded_response_sets_retry_after_header() {
        let state = app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::failing_with_status(429, Some(5)),
        );

        let response = build_predict_response(&state, query(9), UNIX_EPOCH).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok()),
            Some("5")
        );
    }

    #[test]
    fn predict_rejects_invalid_hour() {
        let state = app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::succeeding(7, &[]),
        );

        let response =
            build_predict_response(&state, query(24), UNIX_EPOCH + Duration::from_secs(1));

        match response {
            PredictResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body.error_code, PredictErrorCode::InvalidParams);
                assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
            }
            _ => panic!("expected invalid params response"),
        }
    }

    #[test]
    fn unparsable_hour_gets_invalid_params_body() {
        for uri in [
            "/api/predict?hour=-1",
            "/api/predict?hour=256",
            "/api/predict?hour=abc",
            "/api/predict?water_level=142",
        ] {
            let query = Query::<PredictQuery>::try_from_uri(&Uri::from_static(uri));

            match accept_query(query, UNIX_EPOCH + Duration::from_secs(4)) {
                Err(PredictResponse::Error { status, body }) => {
                    assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
                    assert_eq!(body.error_code, PredictErrorCode::InvalidParams, "{uri}");
                    assert!(body.error_message.starts_with("invalid query"), "{uri}");
                    assert_eq!(body.timestamp, "1970-01-01T00:00:04Z");
                }
                _ => panic!("expected invalid params response for {uri}"),
            }
        }
    }

    #[test]
    fn valid_query_is_accepted() {
        let query = Query::<PredictQuery>::try_from_uri(&Uri::from_static(
            "/api/predict?hour=7&air_temp=21.5&water_level=146",
        ));

        match accept_query(query, UNIX_EPOCH) {
            Ok(query) => {
                assert_eq!(query.hour, 7);
                assert_eq!(query.air_temp, Some(21.5));
                assert_eq!(query.water_temp, None);
                assert_eq!(query.water_level, 146.0);
            }
            Err(_) => panic!("expected query to be accepted"),
        }
    }

    #[tokio::test]
    async fn predict_handler_answers_out_of_range_hour_with_json() {
        let state = Arc::new(app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::succeeding(7, &[]),
        ));
        let query = Query::<PredictQuery>::try_from_uri(&Uri::from_static("/api/predict?hour=256"));

        let response = get_predict(State(state), query).await.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn predict_hides_fatal_ml_error() {
        let state = app_state(
            StaticHistory::with_average(10.0),
            ScriptedMlPredictor::failing_with_status(500, None),
        );

        let response = build_predict_response(&state, query(9), UNIX_EPOCH);

        match response {
            PredictResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, PredictErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
            }
            _ => panic!("expected internal error response"),
        }
    }

    #[test]
    fn predict_fails_when_history_unavailable() {
        let state = app_state(
            StaticHistory::failing(),
            ScriptedMlPredictor::succeeding(7, &[]),
        );

        let response = build_predict_response(&state, query(9), UNIX_EPOCH).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn health_reports_degraded_when_ml_not_ready() {
        let response = build_health_response(false, UNIX_EPOCH + Duration::from_secs(2));

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn format_timestamp_is_rfc3339() {
        let formatted = format_timestamp(UNIX_EPOCH + Duration::from_secs(3));

        assert_eq!(formatted.ok().as_deref(), Some("1970-01-01T00:00:03Z"));
    }
}

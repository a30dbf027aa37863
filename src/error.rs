// Error types for the analysis core, the fetch layer and the HTTP surface.
// Every failure reaching a client is rendered as {"success": false, "error": "..."}.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures of the pure analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Could not aggregate car data: {0}")]
    Aggregation(String),
}

/// Failures while fetching pages from the classifieds site.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            FetchError::Request { source, .. } => source.status(),
            FetchError::InvalidUrl { .. } => None,
        }
    }
}

// Define a custom application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Malformed request: {0}")]
    BadRequest(String),
    #[error("Internal Server Error")]
    InternalServerError(#[from] anyhow::Error),
}

// A body that is valid JSON but does not fit the record schema is an aggregation
// failure, anything else is a plain bad request.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => AppError::Analysis(AnalysisError::Aggregation(e.body_text())),
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

// Implement IntoResponse for AppError to convert errors into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Analysis(AnalysisError::InvalidInput(message)) => {
                tracing::info!("Rejected invalid input: {}", message);
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Analysis(AnalysisError::Aggregation(message)) => {
                tracing::warn!("Aggregation failure: {}", message);
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Fetch(FetchError::InvalidUrl { url, .. }) => {
                tracing::info!("Rejected invalid URL: {}", url);
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Fetch(e) => {
                tracing::warn!(status = ?e.status(), "Fetch failed: {}", e);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::BadRequest(message) => {
                tracing::info!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::InternalServerError(e) => {
                // Log the detailed error here, don't expose it to the client
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(json!({ "success": false, "error": error_message }))).into_response()
    }
}

// Define a custom Result type using our AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_unprocessable_entity() {
        let response = AppError::from(AnalysisError::InvalidInput("bad price".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_errors_hide_details() {
        let error = AppError::from(anyhow::anyhow!("database password is hunter2"));
        assert_eq!(error.to_string(), "Internal Server Error");
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_url_has_no_status() {
        let source = url::Url::parse("::nope").unwrap_err();
        let error = FetchError::InvalidUrl { url: "::nope".into(), source };
        assert!(error.status().is_none());
        assert!(error.to_string().starts_with("Invalid URL '::nope'"));
        assert_eq!(AppError::from(error).into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

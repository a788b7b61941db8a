use crate::models::Validate;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use tracing::error;

/// Erreurs HTTP : corps JSON `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Échec de lecture du stockage : 500, cause journalisée
    pub fn internal(message: &'static str, cause: impl Display) -> Self {
        error!("[http] {}: {}", message, cause);
        ApiError::Internal(message)
    }

    /// Échec d'écriture : 400, cause journalisée et renvoyée au client
    pub fn write_failed(message: &str, cause: impl Display) -> Self {
        error!("[http] {}: {}", message, cause);
        ApiError::BadRequest(format!("{message}: {cause}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Corps JSON désérialisé puis validé ; tout échec devient un 400
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
        let value: T = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
        value
            .validate()
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
        Ok(Payload(value))
    }
}

pub fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("Server not found").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::internal("Failed to fetch servers", "disk").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_hides_cause() {
        let err = ApiError::internal("Failed to fetch servers", "secret path /var/x");
        assert_eq!(err.to_string(), "Failed to fetch servers");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("-1").is_err());
    }
}

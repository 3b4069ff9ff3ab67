use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Message shown to the payer when the gateway answered without a usable PIX charge.
pub const PIX_UNAVAILABLE_MESSAGE: &str = "Erro: Dados PIX não encontrados na resposta da API";

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Invalid caller input (bad tax-id, bad amount, missing parameter).
    Validation(String),
    /// Resource not found error.
    NotFound(String),
    /// Identity or postal lookup failed (non-200, transport, malformed payload).
    Upstream(String),
    /// Payment gateway call failed.
    Gateway(String),
    /// The gateway answered 200 but the charge lacks id, copy-paste code or QR code.
    UnusableIntent(String),
    /// Internal server error.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::Gateway(msg) => write!(f, "Gateway error: {}", msg),
            AppError::UnusableIntent(msg) => write!(f, "Unusable PIX intent: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each variant to a status code and a `{"error": ...}` body.
    ///
    /// Upstream and gateway failures keep their detail in the body so the
    /// payer-facing page can show what went wrong.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Erro ao buscar dados do CPF: {}", msg),
                )
            }
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Erro na requisição: {}", msg),
                )
            }
            AppError::UnusableIntent(msg) => {
                tracing::error!("Gateway response missing PIX data: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PIX_UNAVAILABLE_MESSAGE.to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.as_ref().clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let response = AppError::Validation("CPF inválido".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = AppError::NotFound("CPF não encontrado.".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn gateway_and_unusable_intent_are_server_errors() {
        let gateway = AppError::Gateway("timeout".to_string()).into_response();
        assert_eq!(gateway.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let unusable = AppError::UnusableIntent("missing qrcode".to_string()).into_response();
        assert_eq!(unusable.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn context_delegates_status_to_source() {
        let result: Result<(), AppError> =
            Err(AppError::NotFound("missing".to_string())).context("Identity lookup");
        let err = result.unwrap_err();

        assert!(matches!(err.root(), AppError::NotFound(_)));
        assert_eq!(err.to_string(), "Identity lookup: Not found: missing");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}

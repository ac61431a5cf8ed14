use axum::{
    extract::rejection::{FormRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bank::BankError;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Environment misconfigured: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Bank(#[from] BankError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::InternalError(message.into().into())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {rejection}");
        AppError::MalformedPayload
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        debug!("Rejected form: {rejection}");
        AppError::MalformedPayload
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Bank(BankError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Bank(
                BankError::InvalidQuantity { .. }
                | BankError::QuantityTooLarge { .. }
                | BankError::InvalidMoney(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Bank(BankError::NotPermitted) => StatusCode::FORBIDDEN,
            AppError::Config(_) | AppError::Bank(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("{self}");
            return (status, "Internal server error").into_response();
        }

        (status, self.to_string()).into_response()
    }
}

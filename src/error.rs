use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoverError {
    #[error("Sequence violation: {0}")]
    SequenceViolation(String),

    #[error("Handover {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("Confirmation requires either actualAmount or acceptAsIs=true")]
    MissingAmount,

    #[error("Deposit amount {deposited} is outside tolerance of confirmed amount {expected}")]
    AmountMismatch { expected: Decimal, deposited: Decimal },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User {0} is not the recipient of this handover")]
    NotRecipient(String),

    #[error("User {user} does not hold this cash, {holder} does")]
    NotCashHolder { user: String, holder: String },

    #[error("User {user} does not belong to station {station}")]
    NotStationMember { user: String, station: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl HandoverError {
    /// Stable name clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            HandoverError::SequenceViolation(_) => "SequenceViolation",
            HandoverError::AlreadyFinalized(_) => "AlreadyFinalized",
            HandoverError::MissingAmount => "MissingAmount",
            HandoverError::AmountMismatch { .. } => "AmountMismatch",
            HandoverError::NotFound(_) => "NotFound",
            HandoverError::InvalidRequest(_) => "InvalidRequest",
            HandoverError::NotRecipient(_) => "NotRecipient",
            HandoverError::NotStationMember { .. } => "NotStationMember",
            HandoverError::NotCashHolder { .. } => "NotCashHolder",
            HandoverError::Database(_) => "Database",
            HandoverError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandoverError::SequenceViolation(_)
            | HandoverError::MissingAmount
            | HandoverError::AmountMismatch { .. }
            | HandoverError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            HandoverError::AlreadyFinalized(_) => StatusCode::CONFLICT,
            HandoverError::NotFound(_) => StatusCode::NOT_FOUND,
            HandoverError::NotRecipient(_)
            | HandoverError::NotStationMember { .. }
            | HandoverError::NotCashHolder { .. } => StatusCode::FORBIDDEN,
            HandoverError::Database(_) | HandoverError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HandoverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            HandoverError::SequenceViolation(_) => "Handover sequence violation",
            HandoverError::AlreadyFinalized(_) => "Handover already finalized",
            HandoverError::MissingAmount => "Missing confirmation amount",
            HandoverError::AmountMismatch { .. } => "Deposit amount mismatch",
            HandoverError::NotFound(_) => "Not found",
            HandoverError::InvalidRequest(_) => "Invalid request",
            HandoverError::NotRecipient(_) => "Not the handover recipient",
            HandoverError::NotStationMember { .. } => "Not a station member",
            HandoverError::NotCashHolder { .. } => "Not the cash holder",
            HandoverError::Database(_) => "Database error occurred",
            HandoverError::Internal(_) => "Internal server error",
        };

        // server-side failures are ours to look at, the rest are caller mistakes
        if status.is_server_error() {
            tracing::error!("{}: {}", error_message, self);
        } else {
            tracing::warn!("{}: {}", error_message, self);
        }

        let body = Json(json!({
            "error": error_message,
            "code": self.code(),
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for HandoverError {
    fn from(error: sqlx::Error) -> Self {
        HandoverError::Database(error.to_string())
    }
}

impl From<JsonRejection> for HandoverError {
    fn from(rejection: JsonRejection) -> Self {
        HandoverError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for HandoverError {
    fn from(rejection: PathRejection) -> Self {
        HandoverError::InvalidRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, HandoverError>;

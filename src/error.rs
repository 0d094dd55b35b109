// src/error.rs

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::TransitionError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::Forbidden(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller. Internal failures stay opaque.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Unexpected(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Self::Conflict(conflict_message(db.constraint()).into())
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                Self::Validation("Referenced resource does not exist".into())
            }
            _ => Self::Database(e),
        }
    }
}

fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("master_rooms_hotel_id_name_key") => "Master room with this name already exists for this hotel",
        Some("sub_rooms_hotel_id_master_room_id_name_key") => {
            "Sub room with this name already exists for this master room"
        }
        Some("hotel_amenities_name_key") => "Hotel amenity already exists",
        Some("hotels_name_pincode_key") => "Hotel with this name and pincode already exists",
        Some("users_email_key") | Some("customers_email_key") => "Email is already registered",
        Some("bookings_slot_window_live_idx") => "Slot is already booked",
        _ => "Resource already exists",
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        Self::Conflict(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        Self::Validation(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        Self::Validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        Self::Validation(r.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({ "success": false, "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("Booking").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Database(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_opaque() {
        let err = ApiError::Unexpected(anyhow::anyhow!("connection refused at 10.0.0.3"));
        assert_eq!(err.public_message(), "Internal server error");

        let err = ApiError::not_found("Master room");
        assert_eq!(err.public_message(), "Master room not found");
    }

    #[test]
    fn row_not_found_becomes_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unique_violations_name_the_resource() {
        assert_eq!(conflict_message(Some("hotel_amenities_name_key")), "Hotel amenity already exists");
        assert_eq!(
            conflict_message(Some("master_rooms_hotel_id_name_key")),
            "Master room with this name already exists for this hotel"
        );
        assert_eq!(conflict_message(None), "Resource already exists");
    }

    #[test]
    fn transition_errors_are_conflicts() {
        let err: ApiError = TransitionError::AlreadyIn(BookingStatus::Booked).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Booking is already booked");
    }

    #[tokio::test]
    async fn renders_json_envelope() {
        let res = ApiError::not_found("Hotel").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v, json!({ "success": false, "error": "Hotel not found" }));
    }
}

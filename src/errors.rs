#![allow(dead_code)]

//! Typed resolver-level errors and their user-visible wire shape.
//!
//! Individual sub-result failures (a Horizon call, one orderbook query) are
//! absorbed by the callers that own them and never reach this enum; only
//! validation failures and a terminal `NoRoute` condition are surfaced.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no route: {0}")]
    NoRoute(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("a build is already in progress")]
    BuildInProgress,

    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoRouteFound,
    BadRequest,
    NotFound,
    InsufficientLiquidity,
    UpstreamError,
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: ErrorCode,
    pub message: String,
    pub status_code: u16,
}

impl EngineError {
    pub fn to_wire(&self) -> ErrorResponse {
        let (code, status_code) = match self {
            EngineError::BadRequest(_) => (ErrorCode::BadRequest, 400),
            EngineError::NotFound(_) => (ErrorCode::NotFound, 404),
            EngineError::NoRoute(_) => (ErrorCode::NoRouteFound, 404),
            EngineError::UpstreamUnavailable(_) => (ErrorCode::UpstreamError, 502),
            EngineError::BuildInProgress => (ErrorCode::InternalError, 409),
            EngineError::Internal(_) => (ErrorCode::InternalError, 500),
        };
        ErrorResponse {
            error: true,
            code,
            message: self.to_string(),
            status_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = EngineError::BadRequest("amount must be positive".into());
        let wire = err.to_wire();
        assert_eq!(wire.status_code, 400);
        assert_eq!(wire.code, ErrorCode::BadRequest);
    }

    #[test]
    fn no_route_maps_to_no_route_found() {
        let err = EngineError::NoRoute("no active trading relationships".into());
        assert_eq!(err.to_wire().code, ErrorCode::NoRouteFound);
    }
}

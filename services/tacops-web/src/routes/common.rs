use actix_web::HttpResponse;
use serde::Serialize;
use tacops_client::ApiError;
use tacops_core::{DocumentKind, ErrorCode, TacopsError};
use tacops_dashboard::FormError;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn not_found(message: impl Into<String>) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn conflict(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Conflict().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn bad_gateway(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadGateway().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn internal_error(message: impl Into<String>) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: message.into(),
    })
}

pub fn error_response(code: ErrorCode, message: impl Into<String>) -> HttpResponse {
    match code {
        ErrorCode::InvalidInput | ErrorCode::Parse => bad_request(message),
        ErrorCode::NotFound => not_found(message),
        ErrorCode::Conflict => conflict(message),
        ErrorCode::Unavailable | ErrorCode::Upstream => bad_gateway(message),
        ErrorCode::Internal => internal_error(message),
    }
}

pub fn api_error(err: &ApiError) -> HttpResponse {
    error_response(err.code(), err.detail_or(UNKNOWN_ERROR))
}

pub fn tacops_error(err: &TacopsError) -> HttpResponse {
    error_response(err.code, err.message.clone())
}

/// The `error` body carries the alert text shown to the operator.
pub fn form_error(err: &FormError) -> HttpResponse {
    error_response(err.code(), err.to_string())
}

pub fn parse_document_kind(value: &str) -> Result<DocumentKind, HttpResponse> {
    value
        .parse::<DocumentKind>()
        .map_err(|_| not_found(format!("unknown document kind: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(
            error_response(ErrorCode::InvalidInput, "x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(ErrorCode::NotFound, "x").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(ErrorCode::Conflict, "x").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(ErrorCode::Upstream, "x").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_response(ErrorCode::Internal, "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn document_kind_path_segment() {
        assert_eq!(parse_document_kind("casevac").ok(), Some(DocumentKind::Casevac));
        let response = parse_document_kind("opord").err().map(|response| response.status());
        assert_eq!(response, Some(StatusCode::NOT_FOUND));
    }
}

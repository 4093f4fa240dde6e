//! Development-mode exposure of internal error details.

use axum::{
    Json,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{ErrorDetail, ErrorResponse};

/// Replace the generic message of a 500 response with its logged detail.
///
/// Only mounted when `APP_ENV=development`.
pub async fn expose_error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    let body = ErrorResponse {
        error: "internal_error".to_string(),
        message: detail,
    };
    let rebuilt = (parts.status, Json(body)).into_response();
    let (rebuilt_parts, body) = rebuilt.into_parts();

    parts.headers.remove(http::header::CONTENT_LENGTH);
    parts.headers.extend(rebuilt_parts.headers);
    Response::from_parts(parts, body)
}

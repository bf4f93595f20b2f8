use std::convert::Infallible;

use serde_json::json;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
};

use crate::error::ApiError;

fn error_reply(error: &ApiError) -> reply::Response {
    if let ApiError::Internal(info) = error {
        log::error!("Request failed: {info}");
    }
    reply::with_status(reply::json(&error.body()), error.status()).into_response()
}

fn detail(message: &str, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(&json!({ "detail": message })), status).into_response()
}

/// Renders every rejection as a JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    if let Some(error) = err.find::<ApiError>() {
        return Ok(error_reply(error));
    }

    let response = if err.is_not_found() {
        detail("Not found.", StatusCode::NOT_FOUND)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply(&ApiError::Validation(format!("Invalid request body: {e}")))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        error_reply(&ApiError::Validation(String::from("Invalid query string")))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        detail("Request body is too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        detail("Content-Length header is required", StatusCode::LENGTH_REQUIRED)
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        detail(
            "Request body must be application/json",
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(&ApiError::MethodNotAllowed)
    } else {
        log::error!("Unhandled rejection: {err:?}");
        error_reply(&ApiError::Internal(String::from("Unhandled rejection")))
    };

    Ok(response)
}

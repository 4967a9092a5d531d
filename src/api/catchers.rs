use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, catch, catchers};
use tracing::warn;

use super::response::ApiResponse;

fn envelope(status: Status, message: &str, kind: &str) -> Json<ApiResponse<()>> {
    warn!(status = status.code, kind, "Request failed before reaching a handler");
    Json(ApiResponse {
        success: false,
        message: message.to_string(),
        data: None,
        error: Some(kind.to_string()),
    })
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(Status::BadRequest, "Bad request", "bad_request")
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(Status::Unauthorized, "Authentication required", "authentication_error")
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(
        Status::Forbidden,
        "You don't have permission to perform this action",
        "authorization_error",
    )
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(Status::NotFound, "Resource not found", "not_found_error")
}

#[catch(413)]
pub fn payload_too_large(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(Status::PayloadTooLarge, "Upload is too large", "validation_error")
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(
        Status::UnprocessableEntity,
        "Request body could not be parsed",
        "validation_error",
    )
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ApiResponse<()>> {
    envelope(Status::InternalServerError, "Internal server error", "internal_error")
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        payload_too_large,
        unprocessable,
        internal_error
    ]
}

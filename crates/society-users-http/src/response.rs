//! Users response serialization and error formatting.

use society_users_model::error::UsersError;

use crate::body::UsersResponseBody;

/// Content type for every users response.
pub const CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Serialize a users error into a JSON response body.
///
/// ```json
/// {
///   "code": "NotFound",
///   "message": "no user /Users,7"
/// }
/// ```
#[must_use]
pub fn error_to_json(error: &UsersError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "code": error.code.as_str(),
        "message": error.message,
    }))
    .expect("JSON serialization of error cannot fail")
}

/// Convert a `UsersError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &UsersError) -> http::Response<UsersResponseBody> {
    json_response(error.status_code, error_to_json(error))
}

/// Build a response carrying JSON bytes.
#[must_use]
pub fn json_response(
    status: http::StatusCode,
    json: Vec<u8>,
) -> http::Response<UsersResponseBody> {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(UsersResponseBody::from(json))
        .expect("valid JSON response")
}

/// Build a response with no body.
#[must_use]
pub fn empty_response(status: http::StatusCode) -> http::Response<UsersResponseBody> {
    http::Response::builder()
        .status(status)
        .body(UsersResponseBody::empty())
        .expect("valid empty response")
}

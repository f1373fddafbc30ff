//! Users service error types.
//!
//! Errors travel to clients as `{"code": "<Code>", "message": "<text>"}` with
//! the HTTP status given by [`UsersErrorCode::default_status_code`].

use std::fmt;

/// Well-known users service error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum UsersErrorCode {
    /// Client input (path id, parent id) is structurally invalid.
    #[default]
    BadRequest,
    /// Missing or wrong bearer token.
    Unauthorized,
    /// The addressed resource does not exist.
    NotFound,
    /// No route matches the request path.
    RouteNotFound,
    /// The path matches but the method does not.
    MethodNotAllowed,
    /// A concurrent write won the transaction.
    Conflict,
    /// The body decoded but failed semantic checks.
    ValidationFailed,
    /// The body is not a decodable resource.
    MalformedBody,
    /// A resource could not be encoded for the response.
    InternalEncodingFailure,
    /// Unexpected internal failure.
    InternalError,
    /// The backing store is unreachable or failed.
    UpstreamUnavailable,
}

impl UsersErrorCode {
    /// Returns the error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::RouteNotFound => "RouteNotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::Conflict => "Conflict",
            Self::ValidationFailed => "ValidationFailed",
            Self::MalformedBody => "MalformedBody",
            Self::InternalEncodingFailure => "InternalEncodingFailure",
            Self::InternalError => "InternalError",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::BadRequest => http::StatusCode::BAD_REQUEST,
            Self::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Self::NotFound | Self::RouteNotFound => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict => http::StatusCode::CONFLICT,
            Self::ValidationFailed => http::StatusCode::EXPECTATION_FAILED,
            Self::MalformedBody => http::StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalEncodingFailure | Self::InternalError => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for UsersErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A users service error response.
#[derive(Debug)]
pub struct UsersError {
    /// The error code.
    pub code: UsersErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for UsersError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UsersError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for UsersError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl UsersError {
    /// Create a new `UsersError` from an error code.
    #[must_use]
    pub fn new(code: UsersErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `UsersError` with a custom message.
    #[must_use]
    pub fn with_message(code: UsersErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors --

    /// Invalid client-supplied identifier or parent.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::BadRequest, message)
    }

    /// Resource not found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::NotFound, message)
    }

    /// Semantic validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::ValidationFailed, message)
    }

    /// Undecodable request body.
    #[must_use]
    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::MalformedBody, message)
    }

    /// Store unreachable or failed.
    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::UpstreamUnavailable, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(UsersErrorCode::InternalError, message)
    }

    /// No route for the path.
    #[must_use]
    pub fn route_not_found(path: &str) -> Self {
        Self::with_message(
            UsersErrorCode::RouteNotFound,
            format!("no route matches {path}"),
        )
    }

    /// Method not supported on a matched path.
    #[must_use]
    pub fn method_not_allowed(method: &http::Method, path: &str) -> Self {
        Self::with_message(
            UsersErrorCode::MethodNotAllowed,
            format!("method {method} is not allowed on {path}"),
        )
    }
}

/// Create a `UsersError` from an error code.
///
/// # Examples
///
/// ```
/// use society_users_model::users_error;
/// use society_users_model::error::UsersErrorCode;
///
/// let err = users_error!(Unauthorized);
/// assert_eq!(err.code, UsersErrorCode::Unauthorized);
///
/// let err = users_error!(NotFound, "user not found");
/// assert_eq!(err.message, "user not found");
/// ```
#[macro_export]
macro_rules! users_error {
    ($code:ident) => {
        $crate::error::UsersError::new($crate::error::UsersErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::UsersError::with_message($crate::error::UsersErrorCode::$code, $msg)
    };
}

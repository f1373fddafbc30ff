//! Mapping of store errors onto users errors.

use society_datastore::DatastoreError;
use society_users_model::error::{UsersError, UsersErrorCode};

/// Convert a store error into the error reported to clients.
#[must_use]
pub fn datastore_error_to_users(e: DatastoreError) -> UsersError {
    let code = match &e {
        DatastoreError::NoSuchEntity(_) => UsersErrorCode::NotFound,
        DatastoreError::Conflict(_) => UsersErrorCode::Conflict,
        DatastoreError::InvalidKey(_) => UsersErrorCode::BadRequest,
        DatastoreError::Unavailable(_) | DatastoreError::Internal(_) => {
            UsersErrorCode::UpstreamUnavailable
        }
    };
    UsersError::with_message(code, e.to_string()).with_source(e)
}

//! Users handler implementation bridging HTTP to business logic.

use std::sync::Arc;

use bytes::Bytes;

use society_users_http::body::UsersResponseBody;
use society_users_http::dispatch::{HandlerFuture, UsersHandler};
use society_users_http::response::{empty_response, json_response};
use society_users_http::router::PathParams;
use society_users_model::error::UsersError;
use society_users_model::operations::UsersOperation;
use society_users_model::user::User;

use crate::provider::SocietyUsers;

/// Handler that bridges the HTTP layer to the users provider.
#[derive(Debug)]
pub struct SocietyUsersHandler {
    provider: Arc<SocietyUsers>,
}

impl SocietyUsersHandler {
    /// Create a new handler wrapping a provider.
    #[must_use]
    pub fn new(provider: Arc<SocietyUsers>) -> Self {
        Self { provider }
    }
}

impl UsersHandler for SocietyUsersHandler {
    fn handle_operation(&self, op: UsersOperation, params: PathParams, body: Bytes) -> HandlerFuture {
        let provider = Arc::clone(&self.provider);
        Box::pin(async move { dispatch(provider.as_ref(), op, &params, &body).await })
    }
}

/// Dispatch a users operation to the appropriate provider method.
async fn dispatch(
    provider: &SocietyUsers,
    op: UsersOperation,
    params: &PathParams,
    body: &[u8],
) -> Result<http::Response<UsersResponseBody>, UsersError> {
    match op {
        UsersOperation::CreateUser => {
            let user = provider.handle_create_user(body).await?;
            Ok(json_response(http::StatusCode::CREATED, user.to_wire()?))
        }
        UsersOperation::ListUsers => {
            let users = provider.handle_list_users().await?;
            Ok(json_response(http::StatusCode::OK, User::list_to_wire(&users)?))
        }
        UsersOperation::GetUser => {
            let user = provider.handle_get_user(id(params)?).await?;
            Ok(json_response(http::StatusCode::OK, user.to_wire()?))
        }
        UsersOperation::UpdateUser => {
            let user = provider.handle_update_user(id(params)?, body).await?;
            Ok(json_response(http::StatusCode::OK, user.to_wire()?))
        }
        UsersOperation::DeleteUser => {
            provider.handle_delete_user(id(params)?).await?;
            Ok(empty_response(http::StatusCode::NO_CONTENT))
        }
        UsersOperation::UploadProfileImage => {
            provider.handle_upload_profile_image(id(params)?, body.len())?;
            Ok(empty_response(http::StatusCode::OK))
        }
        // Answered by the preflight middleware; reached only without it.
        UsersOperation::Preflight => Ok(empty_response(http::StatusCode::OK)),
    }
}

/// Extract the `{id}` path parameter.
fn id(params: &PathParams) -> Result<&str, UsersError> {
    params
        .get("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| UsersError::bad_request("missing user id in path"))
}

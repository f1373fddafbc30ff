//! Users handler trait and operation dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use society_users_model::error::UsersError;
use society_users_model::operations::UsersOperation;

use crate::body::UsersResponseBody;
use crate::router::PathParams;

/// Future returned by [`UsersHandler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<UsersResponseBody>, UsersError>> + Send>>;

/// Trait that the users business logic provider must implement.
///
/// The handler receives the routed operation, the path parameters captured
/// by the router and the raw body bytes, and returns a complete HTTP
/// response. This trait is the boundary between the HTTP transport layer
/// and the business logic layer.
pub trait UsersHandler: Send + Sync + 'static {
    /// Handle a users operation and produce an HTTP response.
    fn handle_operation(
        &self,
        op: UsersOperation,
        params: PathParams,
        body: Bytes,
    ) -> HandlerFuture;
}

/// Dispatch a users operation to the handler.
pub async fn dispatch_operation<H: UsersHandler>(
    handler: &H,
    op: UsersOperation,
    params: PathParams,
    body: Bytes,
) -> Result<http::Response<UsersResponseBody>, UsersError> {
    tracing::debug!(operation = %op, body_len = body.len(), "dispatching users operation");
    handler.handle_operation(op, params, body).await
}

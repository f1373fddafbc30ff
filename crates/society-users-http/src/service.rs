//! Users HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use society_users_model::error::UsersError;

use crate::body::UsersResponseBody;
use crate::dispatch::{UsersHandler, dispatch_operation};
use crate::middleware::{
    CommonHeaders, Pipeline, Preflight, PreflightDocument, RequestContext, RequestLogger,
    StaticTokenAuth,
};
use crate::response::error_to_response;
use crate::router::{RouteError, UsersRouter};

/// Configuration for the users HTTP service.
#[derive(Clone, Default)]
pub struct UsersHttpConfig {
    /// Prefix all routes are mounted under, e.g. `/v1`. Empty mounts at root.
    pub base_path: String,
    /// Bearer token required on every non-preflight request; `None` disables
    /// the check.
    pub api_key: Option<String>,
    /// Document returned to `OPTIONS` requests.
    pub preflight: PreflightDocument,
}

impl fmt::Debug for UsersHttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsersHttpConfig")
            .field("base_path", &self.base_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("preflight", &self.preflight)
            .finish()
    }
}

/// Hyper `Service` implementation for the users resource.
///
/// Wraps a [`UsersHandler`] implementation, routes incoming requests, and
/// runs them through the middleware [`Pipeline`].
#[derive(Debug)]
pub struct UsersHttpService<H: UsersHandler> {
    handler: Arc<H>,
    router: Arc<UsersRouter>,
    pipeline: Arc<Pipeline>,
}

impl<H: UsersHandler> UsersHttpService<H> {
    /// Create a new `UsersHttpService` with the standard middleware stack.
    #[must_use]
    pub fn new(handler: Arc<H>, config: UsersHttpConfig) -> Self {
        let mut pipeline = Pipeline::new()
            .layer(RequestLogger)
            .layer(CommonHeaders::default())
            .layer(Preflight::new(&config.preflight));
        if let Some(key) = config.api_key.filter(|k| !k.is_empty()) {
            pipeline = pipeline.layer(StaticTokenAuth::new(key));
        }
        Self::with_pipeline(handler, UsersRouter::new(&config.base_path), pipeline)
    }

    /// Create a service from explicit parts.
    #[must_use]
    pub fn with_pipeline(handler: Arc<H>, router: UsersRouter, pipeline: Pipeline) -> Self {
        tracing::debug!(
            base_path = router.base_path(),
            routes = router.routes().len(),
            layers = ?pipeline.layer_names(),
            "users http service ready"
        );
        Self {
            handler,
            router: Arc::new(router),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Process one request through routing, middleware and the handler.
    ///
    /// Generic over the request body so it can be driven in-process as well
    /// as from hyper.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<UsersResponseBody>
    where
        B: http_body::Body + Send,
        B::Data: Send,
        B::Error: fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();
        let routed = self.router.resolve(&parts.method, &path);
        let ctx = RequestContext::new(
            parts.method,
            path,
            routed.as_ref().ok().map(|m| m.route.operation),
            parts.headers,
        );

        self.pipeline
            .run(&ctx, || async {
                let matched = match routed {
                    Ok(matched) => matched,
                    Err(err) => return route_error_response(&err),
                };
                let body = match collect_body(body).await {
                    Ok(body) => body,
                    Err(err) => return error_to_response(&err),
                };
                let op = matched.route.operation;
                match dispatch_operation(self.handler.as_ref(), op, matched.params, body).await {
                    Ok(response) => response,
                    Err(err) => {
                        tracing::debug!(operation = %op, error = %err, "operation failed");
                        error_to_response(&err)
                    }
                }
            })
            .await
    }
}

impl<H: UsersHandler> Clone for UsersHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: Arc::clone(&self.router),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<H: UsersHandler> hyper::service::Service<http::Request<Incoming>> for UsersHttpService<H> {
    type Response = http::Response<UsersResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

/// Collect the request body into a single `Bytes` buffer.
async fn collect_body<B>(body: B) -> Result<Bytes, UsersError>
where
    B: http_body::Body,
    B::Error: fmt::Display,
{
    body.collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| UsersError::bad_request(format!("failed to read request body: {e}")))
}

fn route_error_response(err: &RouteError) -> http::Response<UsersResponseBody> {
    let mut response = error_to_response(&err.to_users_error());
    if err.allowed_methods().is_empty() {
        return response;
    }
    let allowed = err
        .allowed_methods()
        .iter()
        .map(http::Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(hv) = http::HeaderValue::from_str(&allowed) {
        response.headers_mut().insert(http::header::ALLOW, hv);
    }
    response
}

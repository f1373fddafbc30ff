//! Request/response middleware.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] layers wrapped around
//! the operation handler:
//!
//! ```text
//! request ──> RequestLogger ──> CommonHeaders ──> Preflight ──> StaticTokenAuth ──> handler
//! response <─ RequestLogger <── CommonHeaders <── Preflight <── StaticTokenAuth <──┘
//! ```
//!
//! `on_request` runs outermost first. A layer returning [`Flow::Respond`]
//! stops the chain: neither inner layers nor the handler run. `on_response`
//! then runs innermost first, for every layer whose `on_request` ran,
//! including the one that responded.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use society_users_model::operations::UsersOperation;
use society_users_model::users_error;

use crate::body::UsersResponseBody;
use crate::response::{CONTENT_TYPE, error_to_response, json_response};

/// Response type flowing through the pipeline.
pub type UsersResponse = http::Response<UsersResponseBody>;

/// Per-request facts visible to every layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Generated request id, echoed as `x-request-id`.
    pub request_id: String,
    /// Request method.
    pub method: http::Method,
    /// Request path, without query.
    pub path: String,
    /// Routed operation, `None` when routing failed.
    pub operation: Option<UsersOperation>,
    /// Request headers.
    pub headers: http::HeaderMap,
    /// When the request entered the pipeline.
    pub started: Instant,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    #[must_use]
    pub fn new(
        method: http::Method,
        path: impl Into<String>,
        operation: Option<UsersOperation>,
        headers: http::HeaderMap,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            operation,
            headers,
            started: Instant::now(),
        }
    }
}

/// What a layer wants to happen after `on_request`.
#[derive(Debug)]
pub enum Flow {
    /// Pass the request to the next layer.
    Continue,
    /// Stop here and send this response.
    Respond(UsersResponse),
}

/// One layer of the pipeline.
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspect the request before the handler runs.
    fn on_request(&self, _ctx: &RequestContext) -> Flow {
        Flow::Continue
    }

    /// Adjust the response on its way out.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut UsersResponse) {}
}

/// Ordered middleware stack.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an inner layer.
    #[must_use]
    pub fn layer(mut self, layer: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Names of the layers, outermost first.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Run the request through the layers, calling `inner` unless a layer
    /// short-circuits.
    pub async fn run<F, Fut>(&self, ctx: &RequestContext, inner: F) -> UsersResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = UsersResponse>,
    {
        let mut entered = 0;
        let mut short_circuit = None;
        for layer in &self.layers {
            entered += 1;
            if let Flow::Respond(response) = layer.on_request(ctx) {
                debug!(layer = layer.name(), request_id = %ctx.request_id, "middleware responded early");
                short_circuit = Some(response);
                break;
            }
        }

        let mut response = match short_circuit {
            Some(response) => response,
            None => inner().await,
        };

        for layer in self.layers[..entered].iter().rev() {
            layer.on_response(ctx, &mut response);
        }
        response
    }
}

// ---------------------------------------------------------------------------
// RequestLogger
// ---------------------------------------------------------------------------

/// Logs one line per completed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn on_request(&self, ctx: &RequestContext) -> Flow {
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            "request received"
        );
        Flow::Continue
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut UsersResponse) {
        let latency_ms = ctx.started.elapsed().as_secs_f64() * 1000.0;
        let operation = ctx.operation.map_or("-", |op| op.as_str());
        info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            operation,
            status = response.status().as_u16(),
            latency_ms,
            "request completed"
        );
    }
}

// ---------------------------------------------------------------------------
// CommonHeaders
// ---------------------------------------------------------------------------

/// Default `Access-Control-Allow-Headers` value.
pub const ALLOW_HEADERS: &str =
    "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

/// Default `Access-Control-Allow-Methods` value.
pub const ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE, PATCH";

/// Adds CORS, content-type, request-id and server headers to every response.
#[derive(Debug, Clone)]
pub struct CommonHeaders {
    allow_origin: http::HeaderValue,
    allow_headers: http::HeaderValue,
    allow_methods: http::HeaderValue,
    server: http::HeaderValue,
}

impl Default for CommonHeaders {
    fn default() -> Self {
        Self {
            allow_origin: http::HeaderValue::from_static("*"),
            allow_headers: http::HeaderValue::from_static(ALLOW_HEADERS),
            allow_methods: http::HeaderValue::from_static(ALLOW_METHODS),
            server: http::HeaderValue::from_static("Society"),
        }
    }
}

impl Middleware for CommonHeaders {
    fn name(&self) -> &'static str {
        "common_headers"
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut UsersResponse) {
        let headers = response.headers_mut();

        headers.insert(
            http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        headers.insert(
            http::header::ACCESS_CONTROL_ALLOW_HEADERS,
            self.allow_headers.clone(),
        );
        headers.insert(
            http::header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        headers
            .entry(http::header::CONTENT_TYPE)
            .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));
        headers.insert(http::header::SERVER, self.server.clone());

        if let Ok(hv) = http::HeaderValue::from_str(&ctx.request_id) {
            headers.entry("x-request-id").or_insert(hv);
        }
    }
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

/// The fixed capability document returned to `OPTIONS` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightDocument {
    /// Human-readable pointer to the docs.
    pub documentation: String,
    /// Where the API description lives.
    pub endpoint: String,
}

impl Default for PreflightDocument {
    fn default() -> Self {
        Self {
            documentation: "To learn how to use this endpoint, please refer".to_owned(),
            endpoint: "http://abhijit-kar.com/swagger/".to_owned(),
        }
    }
}

/// Answers routed `OPTIONS` requests with the capability document.
#[derive(Debug, Clone)]
pub struct Preflight {
    document: Vec<u8>,
}

impl Preflight {
    /// Create the layer for a document.
    #[must_use]
    pub fn new(document: &PreflightDocument) -> Self {
        Self {
            document: serde_json::to_vec(document)
                .expect("JSON serialization of preflight document cannot fail"),
        }
    }
}

impl Middleware for Preflight {
    fn name(&self) -> &'static str {
        "preflight"
    }

    fn on_request(&self, ctx: &RequestContext) -> Flow {
        if ctx.operation == Some(UsersOperation::Preflight) {
            Flow::Respond(json_response(http::StatusCode::OK, self.document.clone()))
        } else {
            Flow::Continue
        }
    }
}

// ---------------------------------------------------------------------------
// StaticTokenAuth
// ---------------------------------------------------------------------------

/// Requires `Authorization: Bearer <token>` matching one configured secret.
///
/// Preflight requests pass without a token.
pub struct StaticTokenAuth {
    token: Vec<u8>,
}

impl fmt::Debug for StaticTokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenAuth")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl StaticTokenAuth {
    /// Create the layer for `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().into_bytes(),
        }
    }

    fn is_authorized(&self, headers: &http::HeaderMap) -> bool {
        let presented = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        match presented {
            Some(token) => bool::from(token.as_bytes().ct_eq(&self.token)),
            None => false,
        }
    }
}

impl Middleware for StaticTokenAuth {
    fn name(&self) -> &'static str {
        "static_token_auth"
    }

    fn on_request(&self, ctx: &RequestContext) -> Flow {
        if ctx.operation == Some(UsersOperation::Preflight) || self.is_authorized(&ctx.headers) {
            return Flow::Continue;
        }
        warn!(request_id = %ctx.request_id, path = %ctx.path, "rejected request without valid token");
        let mut response = error_to_response(&users_error!(
            Unauthorized,
            "missing or invalid bearer token"
        ));
        response.headers_mut().insert(
            http::header::WWW_AUTHENTICATE,
            http::HeaderValue::from_static("Bearer"),
        );
        Flow::Respond(response)
    }
}

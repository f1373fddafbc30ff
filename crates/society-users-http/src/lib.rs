//! Users HTTP service layer for Society.
//!
//! This crate turns HTTP requests into users operations:
//!
//! - **Router**: matches method and path templates such as `/users/{id}`
//! - **Middleware**: request logging, CORS common headers, preflight
//!   short-circuit and optional bearer-token auth
//! - **Handler trait**: the boundary between HTTP and business logic
//! - **Service**: hyper `Service` implementation tying it together
//! - **Response helpers**: JSON success/error response formatting

pub mod body;
pub mod dispatch;
pub mod middleware;
pub mod response;
pub mod router;
pub mod service;

pub use body::UsersResponseBody;
pub use dispatch::UsersHandler;
pub use middleware::{Middleware, Pipeline, PreflightDocument, RequestContext};
pub use router::{PathParams, UsersRouter};
pub use service::{UsersHttpConfig, UsersHttpService};

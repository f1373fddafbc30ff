//! Users request router.
//!
//! Routes are an ordered table of `(method, path template)` pairs mounted
//! under an optional base path:
//!
//! ```text
//! OPTIONS /users              Preflight
//! POST    /users              CreateUser
//! GET     /users              ListUsers
//! OPTIONS /users/{id}         Preflight
//! GET     /users/{id}         GetUser
//! PUT     /users/{id}         UpdateUser
//! DELETE  /users/{id}         DeleteUser
//! POST    /users/{id}/image   UploadProfileImage
//! ```
//!
//! A path that matches some template but none with the request's method is
//! reported as method-not-allowed together with the methods it does accept.

use std::fmt;

use http::Method;
use percent_encoding::percent_decode_str;

use society_users_model::error::UsersError;
use society_users_model::operations::UsersOperation;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path pattern with `{name}` placeholders, e.g. `/users/{id}/image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template. Segments wrapped in braces become parameters.
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let segments = split_path(template)
            .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(seg.to_owned()),
            })
            .collect();
        Self {
            raw: template.to_owned(),
            segments,
        }
    }

    /// Match a (base-relative) path, returning the decoded parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::default();
        let mut parts = split_path(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.0.push((name.clone(), value));
                }
            }
        }
        parts.next().is_none().then_some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into segments, ignoring one leading and one trailing slash.
fn split_path(path: &str) -> std::str::Split<'_, char> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/')
}

/// Percent-decoded values captured from a path template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Build parameters from name/value pairs.
    #[must_use]
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One entry of the routing table.
#[derive(Debug, Clone)]
pub struct Route {
    /// Stable name used in logs.
    pub name: &'static str,
    /// HTTP method.
    pub method: Method,
    /// Path pattern relative to the base path.
    pub template: PathTemplate,
    /// Operation dispatched on match.
    pub operation: UsersOperation,
}

impl Route {
    /// Create a route.
    #[must_use]
    pub fn new(
        name: &'static str,
        method: Method,
        template: &str,
        operation: UsersOperation,
    ) -> Self {
        Self {
            name,
            method,
            template: PathTemplate::parse(template),
            operation,
        }
    }
}

/// A successful routing result.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Route,
    /// Parameters captured from the path.
    pub params: PathParams,
}

/// Why a request could not be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Nothing matches the path.
    NotFound {
        /// Request path.
        path: String,
    },
    /// The path matches, but not with this method.
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Methods accepted on this path.
        allowed: Vec<Method>,
    },
}

impl RouteError {
    /// Methods accepted on the path, empty for [`RouteError::NotFound`].
    #[must_use]
    pub fn allowed_methods(&self) -> &[Method] {
        match self {
            Self::NotFound { .. } => &[],
            Self::MethodNotAllowed { allowed, .. } => allowed,
        }
    }

    /// Map to the error reported to clients.
    #[must_use]
    pub fn to_users_error(&self) -> UsersError {
        match self {
            Self::NotFound { path } => UsersError::route_not_found(path),
            Self::MethodNotAllowed { method, path, .. } => {
                UsersError::method_not_allowed(method, path)
            }
        }
    }
}

/// Method + path router for the users resource.
#[derive(Debug, Clone)]
pub struct UsersRouter {
    base_path: String,
    routes: Vec<Route>,
}

impl UsersRouter {
    /// Create a router with the users routes mounted under `base_path`
    /// (e.g. `""` or `"/v1"`).
    #[must_use]
    pub fn new(base_path: &str) -> Self {
        Self::with_routes(base_path, default_routes())
    }

    /// Create a router with a custom route table.
    #[must_use]
    pub fn with_routes(base_path: &str, routes: Vec<Route>) -> Self {
        let trimmed = base_path.trim_end_matches('/');
        let base_path = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_owned()
        } else {
            format!("/{trimmed}")
        };
        Self { base_path, routes }
    }

    /// The normalized base path.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The routing table, in match order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve a request to a route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::NotFound`] when no template matches the path and
    /// [`RouteError::MethodNotAllowed`] when templates match but no method does.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RouteError> {
        let not_found = || RouteError::NotFound {
            path: path.to_owned(),
        };
        let relative = self.strip_base(path).ok_or_else(not_found)?;

        let mut allowed = Vec::new();
        for route in &self.routes {
            let Some(params) = route.template.matches(relative) else {
                continue;
            };
            if route.method == *method {
                return Ok(RouteMatch { route, params });
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            Err(not_found())
        } else {
            Err(RouteError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_owned(),
                allowed,
            })
        }
    }

    fn strip_base<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.base_path.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

fn default_routes() -> Vec<Route> {
    vec![
        Route::new("users_preflight", Method::OPTIONS, "/users", UsersOperation::Preflight),
        Route::new("create_user", Method::POST, "/users", UsersOperation::CreateUser),
        Route::new("list_users", Method::GET, "/users", UsersOperation::ListUsers),
        Route::new("user_preflight", Method::OPTIONS, "/users/{id}", UsersOperation::Preflight),
        Route::new("get_user", Method::GET, "/users/{id}", UsersOperation::GetUser),
        Route::new("update_user", Method::PUT, "/users/{id}", UsersOperation::UpdateUser),
        Route::new("delete_user", Method::DELETE, "/users/{id}", UsersOperation::DeleteUser),
        Route::new(
            "upload_profile_image",
            Method::POST,
            "/users/{id}/image",
            UsersOperation::UploadProfileImage,
        ),
    ]
}

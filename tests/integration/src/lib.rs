//! End-to-end tests for the Society users service.
//!
//! Most scenarios drive [`UsersHttpService::handle`] in-process over a fresh
//! [`MemoryDatastore`]. The TCP tests bind `127.0.0.1:0` and talk to the
//! service with `reqwest`, so no external server is needed.
//!
//! ```text
//! cargo test -p society-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;

use society_datastore::{Key, MemoryDatastore};
use society_users_core::{SocietyUsers, SocietyUsersHandler, UsersConfig};
use society_users_http::{PreflightDocument, UsersHttpConfig, UsersHttpService};

mod test_errors;
mod test_lifecycle;
mod test_preflight;
mod test_server;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Namespace used by [`UsersConfig::default`].
pub const NAMESPACE: &str = "NeverLand";

/// The service under test.
pub type Service = UsersHttpService<SocietyUsersHandler>;

/// A service wired to an in-memory store the test can still reach.
#[derive(Debug, Clone)]
pub struct TestApp {
    /// The HTTP service.
    pub service: Service,
    /// The backing store, for toggling availability or counting entities.
    pub store: Arc<MemoryDatastore>,
}

/// A collected response.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: http::StatusCode,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// Raw body.
    pub body: Bytes,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("response body is not JSON ({e}): {:?}", self.body))
    }

    /// The header value as a string, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Build an app with the default configuration.
#[must_use]
pub fn app() -> TestApp {
    app_with(UsersConfig::default())
}

/// Build an app with a custom configuration.
#[must_use]
pub fn app_with(config: UsersConfig) -> TestApp {
    init_tracing();

    let store = Arc::new(MemoryDatastore::new());
    let http_config = UsersHttpConfig {
        base_path: config.base_path.clone(),
        api_key: config.api_key.clone(),
        preflight: PreflightDocument {
            endpoint: config.documentation_url.clone(),
            ..PreflightDocument::default()
        },
    };
    let provider = SocietyUsers::new(store.clone(), config);
    let handler = SocietyUsersHandler::new(Arc::new(provider));
    TestApp {
        service: UsersHttpService::new(Arc::new(handler), http_config),
        store,
    }
}

impl TestApp {
    /// Send a request with an optional JSON body.
    pub async fn send(
        &self,
        method: http::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> TestResponse {
        let body = body.map_or_else(Bytes::new, |v| Bytes::from(v.to_string()));
        self.send_raw(request(method, path).body(Full::new(body)).unwrap())
            .await
    }

    /// Send a fully built request.
    pub async fn send_raw(&self, req: http::Request<Full<Bytes>>) -> TestResponse {
        let response = self.service.handle(req).await;
        let (parts, body) = response.into_parts();
        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body: body.collect().await.unwrap().to_bytes(),
        }
    }

    /// Create a user under [`family_key`] and return the created document.
    pub async fn create_user(&self, firstname: &str) -> serde_json::Value {
        let response = self
            .send(http::Method::POST, "/users", Some(&new_user(firstname)))
            .await;
        assert_eq!(response.status, http::StatusCode::CREATED, "{:?}", response.body);
        response.json()
    }
}

/// Start a request builder with a JSON content type.
#[must_use]
pub fn request(method: http::Method, path: &str) -> http::request::Builder {
    http::Request::builder()
        .method(method)
        .uri(path)
        .header(http::header::CONTENT_TYPE, "application/json")
}

/// The encoded key of the family every test user belongs to.
#[must_use]
pub fn family_key() -> String {
    let society = Key::id_key("Society", 5_066_549_580_791_808, None, NAMESPACE);
    Key::id_key("Family", 5_668_600_916_475_904, Some(society), NAMESPACE).encode()
}

/// A valid creation body.
#[must_use]
pub fn new_user(firstname: &str) -> serde_json::Value {
    serde_json::json!({
        "parent_id": family_key(),
        "firstname": firstname,
        "lastname": "Kar",
        "email_ids": [format!("{}@example.com", firstname.to_lowercase())],
        "phone_numbers": ["9876543210"],
        "dob": "1990-02-14T00:00:00.000Z",
        "blood_group": "O+",
    })
}

/// Serve `service` on an ephemeral local port and return its address.
pub async fn spawn_server(service: Service) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let http = HttpConnBuilder::new(TokioExecutor::new());
        while let Ok((stream, _)) = listener.accept().await {
            let conn = http
                .serve_connection(TokioIo::new(stream), service.clone())
                .into_owned();
            tokio::spawn(async move {
                let _ = conn.await;
            });
        }
    });

    addr
}

//! Error responses: validation, routing, outages and auth.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;

    use crate::{app, app_with, new_user, request};

    #[tokio::test]
    async fn test_should_reject_malformed_id() {
        let app = app();
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let body = new_user("Ann");
            let response = app.send(method.clone(), "/users/not-a-key!", Some(&body)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "{method}");
            assert_eq!(response.json()["code"], "BadRequest");
        }
    }

    #[tokio::test]
    async fn test_should_reject_malformed_json() {
        let response = app()
            .send_raw(
                request(Method::POST, "/users")
                    .body(Full::new(Bytes::from_static(b"{\"firstname\":")))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json()["code"], "MalformedBody");
    }

    #[tokio::test]
    async fn test_should_reject_invalid_user() {
        let app = app();

        let mut body = new_user("Ann");
        body["firstname"] = "".into();
        let response = app.send(Method::POST, "/users", Some(&body)).await;
        assert_eq!(response.status, StatusCode::EXPECTATION_FAILED);
        assert_eq!(response.json()["code"], "ValidationFailed");

        let mut body = new_user("Ann");
        body["phone_numbers"] = serde_json::json!(["12345"]);
        let response = app.send(Method::POST, "/users", Some(&body)).await;
        assert_eq!(response.status, StatusCode::EXPECTATION_FAILED);

        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_should_require_parent_id_on_create() {
        let mut body = new_user("Ann");
        body.as_object_mut().unwrap().remove("parent_id");
        let response = app().send(Method::POST, "/users", Some(&body)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_unknown_route() {
        let response = app().send(Method::GET, "/groups", None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json()["code"], "RouteNotFound");
    }

    #[tokio::test]
    async fn test_should_return_method_not_allowed_with_allow_header() {
        let response = app().send(Method::PATCH, "/users/abc", None).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        let allow = response.header("allow").unwrap().to_owned();
        for method in ["GET", "PUT", "DELETE", "OPTIONS"] {
            assert!(allow.contains(method), "{allow}");
        }
    }

    #[tokio::test]
    async fn test_should_report_store_outage_as_unavailable() {
        let app = app();
        let created = app.create_user("Ann").await;
        let id = created["id"].as_str().unwrap().to_owned();
        app.store.set_available(false);

        for (method, path, body) in [
            (Method::GET, "/users".to_owned(), None),
            (Method::GET, format!("/users/{id}"), None),
            (Method::POST, "/users".to_owned(), Some(new_user("Bob"))),
            (Method::PUT, format!("/users/{id}"), Some(new_user("Ann"))),
            (Method::DELETE, format!("/users/{id}"), None),
        ] {
            let response = app.send(method.clone(), &path, body.as_ref()).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE, "{method} {path}");
            assert_eq!(response.json()["code"], "UpstreamUnavailable");
        }

        app.store.set_available(true);
        let response = app.send(Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_require_bearer_token_when_configured() {
        let app = app_with(society_users_core::UsersConfig {
            api_key: Some("s3cret".to_owned()),
            ..society_users_core::UsersConfig::default()
        });

        let response = app.send(Method::GET, "/users", None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.header("www-authenticate"), Some("Bearer"));

        let response = app
            .send_raw(
                request(Method::GET, "/users")
                    .header(http::header::AUTHORIZATION, "Bearer wrong")
                    .body(Full::new(Bytes::new()))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let response = app
            .send_raw(
                request(Method::GET, "/users")
                    .header(http::header::AUTHORIZATION, "Bearer s3cret")
                    .body(Full::new(Bytes::new()))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);

        let response = app.send(Method::OPTIONS, "/users", None).await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

//! Preflight and common header scenarios.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use crate::app;

    #[tokio::test]
    async fn test_should_answer_options_with_capability_document() {
        for path in ["/users", "/users/anything"] {
            let response = app().send(Method::OPTIONS, path, None).await;
            assert_eq!(response.status, StatusCode::OK, "{path}");
            assert_eq!(
                response.json(),
                serde_json::json!({
                    "documentation": "To learn how to use this endpoint, please refer",
                    "endpoint": "http://abhijit-kar.com/swagger/",
                })
            );
        }
    }

    #[tokio::test]
    async fn test_should_set_common_headers_on_every_response() {
        let app = app();
        for (method, path) in [
            (Method::OPTIONS, "/users"),
            (Method::GET, "/users"),
            (Method::GET, "/nowhere"),
        ] {
            let response = app.send(method.clone(), path, None).await;
            assert_eq!(response.header("access-control-allow-origin"), Some("*"), "{method} {path}");
            assert!(response.header("access-control-allow-methods").is_some());
            assert!(response.header("access-control-allow-headers").is_some());
            assert_eq!(
                response.header("content-type"),
                Some("application/json; charset=UTF-8")
            );
            assert!(response.header("x-request-id").is_some());
        }
    }

    #[tokio::test]
    async fn test_should_not_touch_store_for_preflight() {
        let app = app();
        app.store.set_available(false);
        let response = app.send(Method::OPTIONS, "/users", None).await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

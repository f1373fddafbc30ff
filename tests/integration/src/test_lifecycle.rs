//! Create, read, update and delete scenarios.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use crate::{app, family_key, new_user};

    #[tokio::test]
    async fn test_should_run_full_user_lifecycle() {
        let app = app();

        let created = app.create_user("Abhijit").await;
        let id = created["id"].as_str().unwrap().to_owned();
        assert_eq!(created["parent_id"], family_key());
        assert_eq!(created["firstname"], "Abhijit");
        assert!(created["date_created"].is_string());
        assert_eq!(created["date_created"], created["date_updated"]);

        let got = app.send(Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(got.status, StatusCode::OK);
        assert_eq!(got.json(), created);

        let mut replacement = new_user("Abhi");
        replacement["role"] = "admin".into();
        let updated = app
            .send(Method::PUT, &format!("/users/{id}"), Some(&replacement))
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        let updated = updated.json();
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["firstname"], "Abhi");
        assert_eq!(updated["role"], "admin");
        assert_eq!(updated["date_created"], created["date_created"]);
        assert!(
            updated["date_updated"].as_str().unwrap() > created["date_updated"].as_str().unwrap()
        );

        let deleted = app.send(Method::DELETE, &format!("/users/{id}"), None).await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert!(deleted.body.is_empty());

        let missing = app.send(Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.json()["code"], "NotFound");

        let again = app.send(Method::DELETE, &format!("/users/{id}"), None).await;
        assert_eq!(again.status, StatusCode::NO_CONTENT);
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_should_list_empty_store_as_empty_array() {
        let response = app().send(Method::GET, "/users", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_should_list_created_users() {
        let app = app();
        let ann = app.create_user("Ann").await;
        let bob = app.create_user("Bob").await;

        let response = app.send(Method::GET, "/users", None).await;
        assert_eq!(response.status, StatusCode::OK);
        let listed = response.json();
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&ann));
        assert!(listed.contains(&bob));
    }

    #[tokio::test]
    async fn test_should_ignore_client_supplied_read_only_fields() {
        let app = app();
        let mut body = new_user("Ann");
        body["id"] = "forged".into();
        body["date_created"] = "2001-01-01T00:00:00.000Z".into();
        body["status"] = "approved".into();
        body["avatar_url"] = "http://evil.example/a.png".into();

        let response = app.send(Method::POST, "/users", Some(&body)).await;
        assert_eq!(response.status, StatusCode::CREATED);
        let created = response.json();
        assert_ne!(created["id"], "forged");
        assert_ne!(created["date_created"], "2001-01-01T00:00:00.000Z");
        assert!(created.get("status").is_none());
        assert!(created.get("avatar_url").is_none());
    }

    #[tokio::test]
    async fn test_should_accept_profile_image_upload() {
        let app = app();
        let created = app.create_user("Ann").await;
        let id = created["id"].as_str().unwrap();

        let response = app
            .send_raw(
                http::Request::builder()
                    .method(Method::POST)
                    .uri(format!("/users/{id}/image"))
                    .header(http::header::CONTENT_TYPE, "image/png")
                    .body(http_body_util::Full::new(bytes::Bytes::from_static(b"\x89PNG\r\n")))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_should_mount_routes_under_base_path() {
        let app = crate::app_with(society_users_core::UsersConfig {
            base_path: "/v1".to_owned(),
            ..society_users_core::UsersConfig::default()
        });

        let response = app.send(Method::GET, "/v1/users", None).await;
        assert_eq!(response.status, StatusCode::OK);

        let response = app.send(Method::GET, "/users", None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}

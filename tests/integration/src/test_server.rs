//! Scenarios over a real TCP listener.

#[cfg(test)]
mod tests {
    use crate::{app, new_user, spawn_server};

    #[tokio::test]
    async fn test_should_serve_users_over_http() {
        let addr = spawn_server(app().service).await;
        let base = format!("http://{addr}");
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/users"))
            .json(&new_user("Ann"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        let created: serde_json::Value = response.json().await.unwrap();
        let id = created["id"].as_str().unwrap();

        let got: serde_json::Value = client
            .get(format!("{base}/users/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(got, created);

        let response = client
            .request(reqwest::Method::OPTIONS, format!("{base}/users"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
}

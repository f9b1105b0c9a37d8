#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::tests::support::{seed_catalog, spawn_app};

    #[tokio::test]
    async fn test_unit_crud_roundtrip() {
        let app = spawn_app().await;
        let id = app.create("/units", json!({"name": "Gram", "symbol": "g"})).await;

        let (status, body) = app.member(Method::GET, &format!("/units/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "g");

        let (status, body) =
            app.admin(Method::PUT, &format!("/units/{}", id), Some(json!({"name": "Grams", "symbol": "g"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Grams");

        let (status, _) = app.admin(Method::DELETE, &format!("/units/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.member(Method::GET, &format!("/units/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_unit_name_is_bad_request() {
        let app = spawn_app().await;
        app.create("/units", json!({"name": "Liter"})).await;
        let (status, body) = app.admin(Method::POST, "/units", Some(json!({"name": "liter"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("Duplicate"));
    }

    #[tokio::test]
    async fn test_food_requires_existing_unit() {
        let app = spawn_app().await;
        let (status, _) = app
            .admin(
                Method::POST,
                "/foods",
                Some(json!({"name": "Milk", "unitOfMeasurement": "6f1c2a52-2a7e-4c55-9d0e-2b8f4f1b9a11"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_food_is_populated_with_unit() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let (status, body) = app.member(Method::GET, &format!("/foods/{}", catalog.rice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unitOfMeasurement"]["id"], catalog.unit.as_str());
        assert_eq!(body["unitOfMeasurement"]["name"], "Kilogram");
    }

    #[tokio::test]
    async fn test_list_pagination_and_search() {
        let app = spawn_app().await;
        seed_catalog(&app).await;

        let (status, body) = app.member(Method::GET, "/foods?page=1&limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["limit"], 1);

        let (_, body) = app.member(Method::GET, "/foods?search=bea", None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["name"], "Beans");
    }

    #[tokio::test]
    async fn test_referenced_unit_cannot_be_deleted() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let (status, body) = app.admin(Method::DELETE, &format!("/units/{}", catalog.unit), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = app.member(Method::GET, &format!("/units/{}", catalog.unit), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_medical_center_needs_contact() {
        let app = spawn_app().await;
        let (status, body) =
            app.admin(Method::POST, "/medical-centers", Some(json!({"name": "Lonely", "address": "Nowhere 1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = app
            .admin(
                Method::POST,
                "/medical-centers",
                Some(json!({"name": "Reachable", "address": "Somewhere 2", "phoneNumber": "555-0199"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_provider_update_and_missing_id() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/providers/{}", catalog.provider),
                Some(json!({"name": "Agro Supplies", "contactPerson": "Ana", "email": "ana@agro.test"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contactPerson"], "Ana");

        let (status, _) = app
            .admin(
                Method::PUT,
                "/providers/0b7a3c64-5f0e-4d7f-8d4e-3a9a6b2b1c00",
                Some(json!({"name": "Nobody"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let app = spawn_app().await;
        let (status, body) = app.member(Method::GET, "/foods/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_filter_is_rejected_as_json() {
        let app = spawn_app().await;
        for uri in ["/food-plans?status=foo", "/food-entries?medicalCenter=x", "/foods?page=abc"] {
            let (status, body) = app.member(Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"]["code"], "INVALID_INPUT", "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let app = spawn_app().await;
        let id = app
            .create("/users", json!({"name": "Clerk", "email": "clerk@test.local", "password": "clerk-pass", "role": "user"}))
            .await;

        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/users/{}", id),
                Some(json!({"name": "Head Clerk", "email": "clerk@test.local", "role": "admin"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");

        // Password unchanged by the update above
        let (status, _) = app
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({"email": "clerk@test.local", "password": "clerk-pass"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.admin(Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let (status, _) = app.admin(Method::DELETE, &format!("/users/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let app = spawn_app().await;
        let me = app.state.tokens.verify(&app.admin_token).unwrap().sub;
        let (status, _) = app.admin(Method::DELETE, &format!("/users/{}", me), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self() {
        let app = spawn_app().await;
        let me = app.state.tokens.verify(&app.admin_token).unwrap().sub;
        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/users/{}", me),
                Some(json!({"name": "Admin", "email": "admin@test.local", "role": "user"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("admin role"));

        // Renaming without touching the role is still allowed
        let (status, body) = app
            .admin(Method::PUT, &format!("/users/{}", me), Some(json!({"name": "Root", "email": "admin@test.local"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");
    }
}

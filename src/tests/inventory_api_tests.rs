#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};

    use crate::db;
    use crate::tests::support::{
        create_plan, entry_body, seed_catalog, spawn_app, spawn_app_on, stock_quantity, test_config,
    };

    #[tokio::test]
    async fn test_stock_follows_entry_lifecycle() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;

        let entry = app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 10.0)])).await;
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(10.0));

        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/food-entries/{}", entry),
                Some(entry_body(&c, &c.center, &plan, &[(&c.rice, 4.0)])),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enteredFoods"][0]["quantity"], 4.0);
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(4.0));

        let (status, _) = app.admin(Method::DELETE, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(0.0));

        let (status, _) = app.admin(Method::DELETE, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let snapshot = app.state.metrics.get_snapshot();
        assert_eq!(snapshot.entries_created, 1);
        assert_eq!(snapshot.entries_updated, 1);
        assert_eq!(snapshot.entries_deleted, 1);
        assert_eq!(snapshot.stock_adjustments, 3);
    }

    #[tokio::test]
    async fn test_repeated_food_in_one_entry_is_summed() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;

        let (status, body) = app
            .admin(
                Method::POST,
                "/food-entries",
                Some(entry_body(&c, &c.center, &plan, &[(&c.rice, 2.5), (&c.beans, 1.0), (&c.rice, 2.5)])),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["enteredFoods"].as_array().unwrap().len(), 3);
        assert_eq!(body["enteredFoods"][1]["food"]["name"], "Beans");
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(5.0));
        assert_eq!(stock_quantity(&app, &c.center, &c.beans).await, Some(1.0));
    }

    #[tokio::test]
    async fn test_update_that_would_go_negative_is_rolled_back() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        let entry = app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 10.0)])).await;

        // Stock consumed elsewhere
        sqlx::query("UPDATE stocks SET quantity = 3 WHERE medical_center_id = ?1 AND food_id = ?2")
            .bind(&c.center)
            .bind(&c.rice)
            .execute(&app.state.db)
            .await
            .unwrap();

        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/food-entries/{}", entry),
                Some(entry_body(&c, &c.center, &plan, &[(&c.rice, 4.0)])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "enteredFoods");

        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(3.0));
        let (_, stored) = app.member(Method::GET, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(stored["enteredFoods"][0]["quantity"], 10.0);

        let (status, _) = app.admin(Method::DELETE, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.member(Method::GET, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_moving_entry_between_centers() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let north_plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        let south_plan = create_plan(&app, &c, &c.other_center, &[(&c.rice, 50.0)]).await;
        let entry = app.create("/food-entries", entry_body(&c, &c.center, &north_plan, &[(&c.rice, 6.0)])).await;

        let (status, body) = app
            .admin(
                Method::PUT,
                &format!("/food-entries/{}", entry),
                Some(entry_body(&c, &c.other_center, &south_plan, &[(&c.rice, 6.0)])),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medicalCenter"]["name"], "South Clinic");
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(0.0));
        assert_eq!(stock_quantity(&app, &c.other_center, &c.rice).await, Some(6.0));
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;

        let empty: &[(&str, f64)] = &[];
        let (status, _) = app.admin(Method::POST, "/food-entries", Some(entry_body(&c, &c.center, &plan, empty))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .admin(Method::POST, "/food-entries", Some(entry_body(&c, &c.center, &plan, &[(&c.rice, -1.0)])))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Plan of another center
        let (status, body) = app
            .admin(Method::POST, "/food-entries", Some(entry_body(&c, &c.other_center, &plan, &[(&c.rice, 1.0)])))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "foodPlan");

        let (status, _) = app
            .member(Method::POST, "/food-entries", Some(entry_body(&c, &c.center, &plan, &[(&c.rice, 1.0)])))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks").fetch_one(&app.state.db).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_entry_list_filters() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let north_plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        let south_plan = create_plan(&app, &c, &c.other_center, &[(&c.rice, 50.0)]).await;
        app.create("/food-entries", entry_body(&c, &c.center, &north_plan, &[(&c.rice, 1.0)])).await;
        app.create("/food-entries", entry_body(&c, &c.center, &north_plan, &[(&c.beans, 2.0)])).await;
        app.create("/food-entries", entry_body(&c, &c.other_center, &south_plan, &[(&c.rice, 3.0)])).await;

        let (status, body) = app.member(Method::GET, "/food-entries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let (_, body) = app.member(Method::GET, &format!("/food-entries?medicalCenter={}", c.center), None).await;
        assert_eq!(body["total"], 2);

        let (_, body) = app.member(Method::GET, &format!("/food-entries?foodPlan={}", south_plan), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["foodPlan"]["id"], south_plan.as_str());
    }

    #[tokio::test]
    async fn test_stock_listing_and_center_view() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 7.0), (&c.beans, 2.0)])).await;

        let (status, body) = app.member(Method::GET, &format!("/stock?food={}", c.rice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["quantity"], 7.0);
        assert_eq!(body["items"][0]["unitOfMeasurement"]["symbol"], "kg");

        let stock_id = body["items"][0]["id"].as_str().unwrap().to_string();
        let (status, row) = app.member(Method::GET, &format!("/stock/{}", stock_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(row["food"]["name"], "Rice");

        let (status, view) = app.member(Method::GET, &format!("/medical-centers/{}/stock", c.center), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["medicalCenter"]["name"], "North Clinic");
        assert_eq!(view["items"].as_array().unwrap().len(), 2);

        let (status, _) =
            app.member(Method::GET, "/medical-centers/3f1e2d3c-4b5a-4697-8887-766554433221/stock", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_drift_detection_and_reconcile() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 8.0), (&c.beans, 2.0)])).await;

        let (status, report) = app.admin(Method::GET, "/stock/drift", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["total"], 0);

        sqlx::query("UPDATE stocks SET quantity = 5 WHERE food_id = ?1")
            .bind(&c.rice)
            .execute(&app.state.db)
            .await
            .unwrap();
        sqlx::query("DELETE FROM stocks WHERE food_id = ?1").bind(&c.beans).execute(&app.state.db).await.unwrap();

        let (_, report) = app.admin(Method::GET, "/stock/drift", None).await;
        assert_eq!(report["total"], 2);
        let items = report["items"].as_array().unwrap();
        let rice = items.iter().find(|d| d["food"]["name"] == "Rice").unwrap();
        assert_eq!(rice["recorded"], 5.0);
        assert_eq!(rice["expected"], 8.0);
        let beans = items.iter().find(|d| d["food"]["name"] == "Beans").unwrap();
        assert!(beans["recorded"].is_null());

        let (status, _) = app.member(Method::POST, "/stock/reconcile", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, corrected) = app.admin(Method::POST, "/stock/reconcile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(corrected["total"], 2);
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(8.0));
        assert_eq!(stock_quantity(&app, &c.center, &c.beans).await, Some(2.0));

        let (_, report) = app.admin(Method::GET, "/stock/drift", None).await;
        assert_eq!(report["total"], 0);
    }

    #[tokio::test]
    async fn test_entry_delete_after_manual_stock_delete_needs_reconcile() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        let entry = app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 10.0)])).await;

        let (_, stocks) = app.member(Method::GET, &format!("/stock?food={}", c.rice), None).await;
        let stock_id = stocks["items"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = app.admin(Method::DELETE, &format!("/stock/{}", stock_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Nothing left to debit, so the entry stays until stock is rebuilt
        let (status, body) = app.admin(Method::DELETE, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "enteredFoods");
        let (status, _) = app.member(Method::GET, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, corrected) = app.admin(Method::POST, "/stock/reconcile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(corrected["total"], 1);
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(10.0));

        let (status, _) = app.admin(Method::DELETE, &format!("/food-entries/{}", entry), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(0.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_entry_mutations_on_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("medfood.db").display());
        let pool = db::connect(&url, 8).await.unwrap();
        db::init_db(&pool).await.unwrap();
        let app = spawn_app_on(pool, test_config()).await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 500.0)]).await;

        let mut entries = Vec::new();
        for _ in 0..16 {
            entries.push(app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.rice, 10.0)])).await);
        }
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(160.0));

        let app = Arc::new(app);
        let mut tasks = tokio::task::JoinSet::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let app = app.clone();
            let uri = format!("/food-entries/{}", entry);
            let revised = entry_body(&c, &c.center, &plan, &[(&c.rice, 5.0)]);
            tasks.spawn(async move {
                if i % 2 == 0 {
                    app.admin(Method::PUT, &uri, Some(revised)).await
                } else {
                    app.admin(Method::DELETE, &uri, None).await
                }
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (status, body) = joined.unwrap();
            if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
                failures.push((status, body));
            }
        }
        assert!(failures.is_empty(), "failed mutations: {:?}", failures);
        // 8 entries revised to 5, 8 deleted
        assert_eq!(stock_quantity(&app, &c.center, &c.rice).await, Some(40.0));
    }

    #[tokio::test]
    async fn test_referenced_food_cannot_be_deleted() {
        let app = spawn_app().await;
        let c = seed_catalog(&app).await;
        let plan = create_plan(&app, &c, &c.center, &[(&c.rice, 50.0)]).await;
        app.create("/food-entries", entry_body(&c, &c.center, &plan, &[(&c.beans, 1.0)])).await;

        for uri in [format!("/foods/{}", c.rice), format!("/foods/{}", c.beans), format!("/medical-centers/{}", c.center)] {
            let (status, _) = app.admin(Method::DELETE, &uri, None).await;
            assert_eq!(status, StatusCode::CONFLICT, "DELETE {}", uri);
        }
    }
}

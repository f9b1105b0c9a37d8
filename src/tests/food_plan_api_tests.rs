#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::tests::support::{create_plan, entry_body, seed_catalog, spawn_app, Catalog, TestApp};

    fn plan_body(catalog: &Catalog, plan_type: &str, start: &str, end: &str, children: &[&str]) -> Value {
        json!({
            "name": format!("{} plan", plan_type),
            "medicalCenter": catalog.center,
            "type": plan_type,
            "startDate": start,
            "endDate": end,
            "plannedFoods": [{"food": catalog.rice, "provider": catalog.provider, "quantity": 10}],
            "childPlans": children,
        })
    }

    async fn get_plan(app: &TestApp, id: &str) -> Value {
        let (status, body) = app.member(Method::GET, &format!("/food-plans/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn test_new_plan_has_zero_completion() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let id = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 100.0)]).await;

        let plan = get_plan(&app, &id).await;
        assert_eq!(plan["type"], "monthly");
        assert_eq!(plan["status"], "active");
        assert_eq!(plan["plannedTotal"], 100.0);
        assert_eq!(plan["realTotal"], 0.0);
        assert_eq!(plan["percentageCompleted"], 0.0);
        assert_eq!(plan["medicalCenter"]["name"], "North Clinic");
        assert_eq!(plan["plannedFoods"][0]["provider"]["name"], "Agro Supplies");
    }

    #[tokio::test]
    async fn test_over_delivery_reports_above_hundred_percent() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let id = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 100.0)]).await;

        app.create("/food-entries", entry_body(&catalog, &catalog.center, &id, &[(&catalog.rice, 150.0)])).await;

        let plan = get_plan(&app, &id).await;
        assert_eq!(plan["realTotal"], 150.0);
        assert_eq!(plan["percentageCompleted"], 150.0);
    }

    #[tokio::test]
    async fn test_real_vs_planned_breakdown() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let id = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 30.0), (&catalog.beans, 30.0)]).await;
        app.create("/food-entries", entry_body(&catalog, &catalog.center, &id, &[(&catalog.rice, 10.0)])).await;
        app.create("/food-entries", entry_body(&catalog, &catalog.center, &id, &[(&catalog.beans, 30.0)])).await;

        let (status, report) = app.member(Method::GET, &format!("/food-plans/{}/real-vs-planned", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["foodPlan"]["id"], id.as_str());
        assert_eq!(report["foods"][0]["food"]["name"], "Rice");
        assert_eq!(report["foods"][0]["percentageCompleted"], 33.33);
        assert_eq!(report["foods"][1]["percentageCompleted"], 100.0);
        assert_eq!(report["realTotal"], 40.0);
        assert_eq!(report["percentageCompleted"], 66.67);
    }

    #[tokio::test]
    async fn test_end_date_must_follow_start_date() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        for end in ["2024-01-01", "2023-12-31"] {
            let (status, body) = app
                .admin(Method::POST, "/food-plans", Some(plan_body(&catalog, "monthly", "2024-01-01", end, &[])))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["details"]["field"], "endDate");
        }
    }

    #[tokio::test]
    async fn test_plan_requires_positive_items() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let mut body = plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[]);
        body["plannedFoods"] = json!([]);
        let (status, _) = app.admin(Method::POST, "/food-plans", Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        body["plannedFoods"] = json!([{"food": catalog.rice, "provider": catalog.provider, "quantity": 0}]);
        let (status, _) = app.admin(Method::POST, "/food-plans", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_plan_hierarchy_rules() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let week = app.create("/food-plans", plan_body(&catalog, "weekly", "2024-01-01", "2024-01-07", &[])).await;

        // Weekly plans cannot group other plans
        let nested = plan_body(&catalog, "weekly", "2024-01-08", "2024-01-14", &[week.as_str()]);
        let (status, _) = app.admin(Method::POST, "/food-plans", Some(nested)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let month =
            app.create("/food-plans", plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[week.as_str()])).await;
        let plan = get_plan(&app, &month).await;
        assert_eq!(plan["childPlans"], json!([week]));

        let year =
            app.create("/food-plans", plan_body(&catalog, "annual", "2024-01-01", "2024-12-31", &[month.as_str()])).await;

        // The month cannot adopt its own ancestor
        let (status, _) = app
            .admin(
                Method::PUT,
                &format!("/food-plans/{}", month),
                Some(plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[week.as_str(), year.as_str()])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nor itself
        let (status, _) = app
            .admin(
                Method::PUT,
                &format!("/food-plans/{}", month),
                Some(plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[month.as_str()])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_child_plan_must_share_center() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let mut other = plan_body(&catalog, "weekly", "2024-01-01", "2024-01-07", &[]);
        other["medicalCenter"] = json!(catalog.other_center);
        let foreign = app.create("/food-plans", other).await;

        let (status, _) = app
            .admin(
                Method::POST,
                "/food-plans",
                Some(plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[foreign.as_str()])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_center_change_blocked_while_referenced() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let used = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 5.0)]).await;
        app.create("/food-entries", entry_body(&catalog, &catalog.center, &used, &[(&catalog.rice, 2.0)])).await;

        let mut moved = plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[]);
        moved["medicalCenter"] = json!(catalog.other_center);
        let (status, body) = app.admin(Method::PUT, &format!("/food-plans/{}", used), Some(moved.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "medicalCenter");
        let plan = get_plan(&app, &used).await;
        assert_eq!(plan["medicalCenter"]["id"], json!(catalog.center));

        // A child plan stays with its parent's center
        let week = app.create("/food-plans", plan_body(&catalog, "weekly", "2024-01-01", "2024-01-07", &[])).await;
        app.create("/food-plans", plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[week.as_str()])).await;
        let mut week_moved = plan_body(&catalog, "weekly", "2024-01-01", "2024-01-07", &[]);
        week_moved["medicalCenter"] = json!(catalog.other_center);
        let (status, _) = app.admin(Method::PUT, &format!("/food-plans/{}", week), Some(week_moved)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Unreferenced plans can move
        let free = create_plan(&app, &catalog, &catalog.center, &[(&catalog.beans, 5.0)]).await;
        let (status, plan) = app.admin(Method::PUT, &format!("/food-plans/{}", free), Some(moved)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plan["medicalCenter"]["id"], json!(catalog.other_center));
    }

    #[tokio::test]
    async fn test_update_keeps_status_unless_given() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let id = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 5.0)]).await;

        let mut body = plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[]);
        body["status"] = json!("concluded");
        let (status, plan) = app.admin(Method::PUT, &format!("/food-plans/{}", id), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plan["status"], "concluded");

        body.as_object_mut().unwrap().remove("status");
        body["name"] = json!("Renamed");
        let (_, plan) = app.admin(Method::PUT, &format!("/food-plans/{}", id), Some(body)).await;
        assert_eq!(plan["name"], "Renamed");
        assert_eq!(plan["status"], "concluded");

        let (status, list) = app.member(Method::GET, "/food-plans?status=concluded", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
    }

    #[tokio::test]
    async fn test_plan_with_entries_cannot_be_deleted() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let id = create_plan(&app, &catalog, &catalog.center, &[(&catalog.rice, 5.0)]).await;
        app.create("/food-entries", entry_body(&catalog, &catalog.center, &id, &[(&catalog.rice, 1.0)])).await;

        let (status, _) = app.admin(Method::DELETE, &format!("/food-plans/{}", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let unused = create_plan(&app, &catalog, &catalog.center, &[(&catalog.beans, 5.0)]).await;
        let (status, _) = app.admin(Method::DELETE, &format!("/food-plans/{}", unused), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_update_missing_plan_is_not_found() {
        let app = spawn_app().await;
        let catalog = seed_catalog(&app).await;
        let (status, _) = app
            .admin(
                Method::PUT,
                "/food-plans/5a0d7a8e-1b2c-4d3e-9f40-123456789abc",
                Some(plan_body(&catalog, "monthly", "2024-01-01", "2024-01-31", &[])),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

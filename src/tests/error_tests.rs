#[cfg(test)]
mod tests {
    use crate::error::{validation, AppError, AppResult, OptionExt};
    use crate::tests::support::test_pool;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Resource not found");

        let error = AppError::RateLimited { retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");
    }

    #[test]
    fn test_app_error_into_response() {
        let cases = [
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
            (AppError::InvalidInput("x".to_string()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (AppError::Unauthorized("x".to_string()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".to_string()), StatusCode::FORBIDDEN),
            (AppError::ServiceUnavailable("x".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Database("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Internal(anyhow::anyhow!("x")), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::RateLimited { retry_after_seconds: 30 }, StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::ValidationError { field: "name".to_string(), message: "x".to_string() },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_validation_error_body_names_field() {
        let response =
            AppError::ValidationError { field: "endDate".to_string(), message: "too early".to_string() }.into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "endDate");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = AppError::Internal(anyhow::anyhow!("secret path /etc/x")).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("/etc/x"));
        assert!(text.contains("error_id"));
    }

    #[tokio::test]
    async fn test_sqlx_constraint_mapping() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO units_of_measurement (id, name) VALUES ('u1', 'Kilogram')")
            .execute(&pool)
            .await
            .unwrap();

        let duplicate: AppError = sqlx::query("INSERT INTO units_of_measurement (id, name) VALUES ('u2', 'kilogram')")
            .execute(&pool)
            .await
            .unwrap_err()
            .into();
        match duplicate {
            AppError::BadRequest(msg) => assert!(msg.contains("units_of_measurement.name")),
            other => panic!("expected BadRequest, got {:?}", other),
        }

        sqlx::query("INSERT INTO foods (id, name, unit_id) VALUES ('f1', 'Rice', 'u1')")
            .execute(&pool)
            .await
            .unwrap();
        let referenced: AppError = sqlx::query("DELETE FROM units_of_measurement WHERE id = 'u1'")
            .execute(&pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(referenced, AppError::Conflict(_)));

        let missing: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(missing, AppError::NotFound(_)));
        let timeout: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(timeout, AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("Food").unwrap(), 42);

        let none: Option<i32> = None;
        let result: AppResult<i32> = none.ok_or_not_found("Food");
        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Food not found"),
            _ => panic!("expected NotFound"),
        }
    }

    #[test]
    fn test_validation_helpers() {
        assert_eq!(validation::required_text("  Rice ", "name", 10).unwrap(), "Rice");
        assert!(validation::required_text("   ", "name", 10).is_err());
        assert!(validation::required_text("abcdefghijk", "name", 10).is_err());
        assert!(validation::required_text("a\0b", "name", 10).is_err());

        assert_eq!(validation::optional_text(Some(" "), "symbol", 10).unwrap(), None);
        assert_eq!(validation::optional_text(None, "symbol", 10).unwrap(), None);

        assert!(validation::positive_quantity(0.5, "quantity").is_ok());
        assert!(validation::positive_quantity(0.0, "quantity").is_err());
        assert!(validation::positive_quantity(f64::NAN, "quantity").is_err());

        assert_eq!(validation::email("Ana@Clinic.ORG", "email").unwrap(), "ana@clinic.org");
        assert!(validation::email("ana@clinic", "email").is_err());
        assert!(validation::email("@clinic.org", "email").is_err());

        assert!(validation::password("12345", "password").is_err());
        assert!(validation::password("123456", "password").is_ok());
        assert!(validation::password(&"x".repeat(73), "password").is_err());
    }
}

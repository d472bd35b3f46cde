use crate::{
    auth::auth::AuthUser,
    domain::settings::{self, CENTER_NAME},
    error::{ApiError, db_failure},
    utils::settings_cache::SettingsCache,
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::info;

const DEFAULT_CENTER_NAME: &str = "المركز الطبي";

/// Printed at the top of every report.
pub(crate) async fn center_name(pool: &MySqlPool) -> Result<String, ApiError> {
    let name = sqlx::query_scalar::<_, String>(
        "SELECT setting_value FROM general_settings WHERE setting_key = ?",
    )
    .bind(CENTER_NAME)
    .fetch_optional(pool)
    .await
    .map_err(db_failure("Failed to read center name"))?;

    Ok(name.unwrap_or_else(|| DEFAULT_CENTER_NAME.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Stored settings plus the attendance values in force", body = Object, example = json!({
            "stored": {"work_start": "08:00", "center_name": "Al Salam Medical Center"},
            "attendance": {"work_start": "08:00:00", "work_end": "14:00:00", "late_grace_minutes": 15, "checkin_open_before_minutes": 60}
        }))
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn get_settings(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
) -> actix_web::Result<impl Responder> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT setting_key, setting_value FROM general_settings ORDER BY setting_key",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_failure("Failed to read settings"))?;

    let stored: BTreeMap<String, String> = rows.into_iter().collect();
    let attendance = crate::api::attendance::attendance_settings(&cache, pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "stored": stored,
        "attendance": attendance
    })))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body(content = Object, description = "Map of setting key to new value", example = json!({"work_start": "08:30", "late_grace_minutes": "10"})),
    responses(
        (status = 200, description = "Settings saved", body = Object, example = json!({"message": "Settings saved", "updated": 2})),
        (status = 400, description = "Unknown key or invalid value"),
        (status = 403, description = "Admin only")
    ),
    tag = "Settings",
    security(("bearer_auth" = []))
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    payload: web::Json<BTreeMap<String, String>>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if payload.is_empty() {
        return Err(ApiError::bad_request("No settings provided").into());
    }
    for (key, value) in payload.iter() {
        settings::validate(key, value).map_err(ApiError::bad_request)?;
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(db_failure("Failed to start settings transaction"))?;

    for (key, value) in payload.iter() {
        sqlx::query(
            r#"
            INSERT INTO general_settings (setting_key, setting_value) VALUES (?, ?)
            ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)
            "#,
        )
        .bind(key)
        .bind(value.trim())
        .execute(&mut *tx)
        .await
        .map_err(db_failure("Failed to save setting"))?;
    }

    tx.commit()
        .await
        .map_err(db_failure("Failed to commit settings"))?;

    cache.invalidate().await;
    info!(by = auth.employee_id, keys = ?payload.keys().collect::<Vec<_>>(), "Settings updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Settings saved",
        "updated": payload.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn hr_cannot_change_settings() {
        let app = test_app!(|cfg| {
            cfg.route("/api/settings", web::put().to(update_settings));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/settings")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "work_start": "08:30" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn unknown_keys_and_bad_values_are_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/settings", web::put().to(update_settings));
        });

        for body in [
            json!({ "theme": "dark" }),
            json!({ "work_start": "8 o'clock" }),
            json!({ "late_grace_minutes": "-5" }),
            json!({}),
        ] {
            let req = actix_test::TestRequest::put()
                .uri("/api/settings")
                .insert_header(bearer(1, Role::Admin))
                .set_json(&body)
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }
}

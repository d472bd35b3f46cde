use crate::{
    auth::auth::AuthUser,
    db::{is_duplicate, is_missing_reference},
    error::{ApiError, FieldError, db_failure},
    model::evening_schedule::{EveningSchedule, SCHEDULE_COLUMNS},
    utils::{
        change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed},
        month::month_range,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSchedule {
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-03-05")]
    pub shift_date: NaiveDate,
    #[schema(value_type = String, example = "16:00:00")]
    pub shift_start: NaiveTime,
    #[schema(value_type = String, example = "22:00:00")]
    pub shift_end: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ScheduleQuery {
    /// `YYYY-MM`
    pub month: String,
    /// HR/Admin only; employees always see their own
    pub employee_id: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/evening-schedules",
    request_body = CreateSchedule,
    responses(
        (status = 201, description = "Evening shift scheduled", body = Object, example = json!({"message": "Evening shift scheduled", "id": 9})),
        (status = 400, description = "Shift ends before it starts"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee already has an evening shift that day")
    ),
    tag = "EveningSchedule",
    security(("bearer_auth" = []))
)]
pub async fn create_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateSchedule>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    // shifts never wrap past midnight
    if payload.shift_end <= payload.shift_start {
        return Err(ApiError::Validation(vec![FieldError::invalid(
            "shift_end",
            "shift_end must be after shift_start",
        )])
        .into());
    }

    let res = sqlx::query(
        r#"
        INSERT INTO evening_schedules (employee_id, shift_date, shift_start, shift_end, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.shift_date)
    .bind(payload.shift_start)
    .bind(payload.shift_end)
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await;

    match res {
        Ok(r) => {
            let id = r.last_insert_id();
            info!(id, employee_id = payload.employee_id, date = %payload.shift_date, "Evening shift scheduled");
            feed.publish(ChangeEvent::new(
                "evening_schedules",
                ChangeAction::Insert,
                id,
                Audience::Employees(vec![payload.employee_id]),
            ));
            Ok(HttpResponse::Created().json(json!({ "message": "Evening shift scheduled", "id": id })))
        }
        Err(e) if is_duplicate(&e) => Err(ApiError::conflict(
            "Employee already has an evening shift that day",
        )
        .into()),
        Err(e) if is_missing_reference(&e) => Err(ApiError::not_found("Employee not found").into()),
        Err(e) => {
            error!(error = %e, employee_id = payload.employee_id, "Failed to schedule evening shift");
            Err(ApiError::Internal.into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/evening-schedules",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Evening shifts in the month", body = [EveningSchedule]),
        (status = 400, description = "Malformed month")
    ),
    tag = "EveningSchedule",
    security(("bearer_auth" = []))
)]
pub async fn list_schedules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ScheduleQuery>,
) -> actix_web::Result<impl Responder> {
    let (first, next) = month_range(&query.month)
        .ok_or_else(|| ApiError::bad_request("month must be YYYY-MM"))?;

    let employee_filter = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.employee_id)
    };

    let mut sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM evening_schedules WHERE shift_date >= ? AND shift_date < ?"
    );
    if employee_filter.is_some() {
        sql.push_str(" AND employee_id = ?");
    }
    sql.push_str(" ORDER BY shift_date ASC, shift_start ASC");

    let mut q = sqlx::query_as::<_, EveningSchedule>(&sql).bind(first).bind(next);
    if let Some(employee_id) = employee_filter {
        q = q.bind(employee_id);
    }

    let rows = q
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to list evening schedules"))?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    delete,
    path = "/api/evening-schedules/{schedule_id}",
    params(("schedule_id" = u64, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Evening shift removed", body = Object, example = json!({"message": "Evening shift removed"})),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Schedule not found")
    ),
    tag = "EveningSchedule",
    security(("bearer_auth" = []))
)]
pub async fn delete_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let res = sqlx::query("DELETE FROM evening_schedules WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete evening schedule"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Schedule not found").into());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Evening shift removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn shift_must_end_after_it_starts() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evening-schedules", web::post().to(create_schedule));
        });

        for (start, end) in [("22:00:00", "16:00:00"), ("16:00:00", "16:00:00")] {
            let req = actix_test::TestRequest::post()
                .uri("/api/evening-schedules")
                .insert_header(bearer(2, Role::Hr))
                .set_json(json!({
                    "employee_id": 12,
                    "shift_date": "2026-03-05",
                    "shift_start": start,
                    "shift_end": end
                }))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{start}-{end}");
        }
    }

    #[actix_web::test]
    async fn employees_cannot_schedule() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evening-schedules", web::post().to(create_schedule));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/evening-schedules")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({
                "employee_id": 12,
                "shift_date": "2026-03-05",
                "shift_start": "16:00:00",
                "shift_end": "22:00:00"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn month_is_validated() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evening-schedules", web::get().to(list_schedules));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/evening-schedules?month=2026-13")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

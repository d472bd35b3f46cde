use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::db::{is_duplicate, is_missing_reference};
use crate::domain::attendance_window::{
    AttendanceSettings, Shift, TimesheetSummary, WindowError, classify_check_in,
    classify_check_out, summarize,
};
use crate::error::{ApiError, db_failure};
use crate::model::attendance::{ATTENDANCE_COLUMNS, Attendance};
use crate::utils::month::{current_month, month_range};
use crate::utils::settings_cache::SettingsCache;
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

pub(crate) async fn attendance_settings(
    cache: &SettingsCache,
    pool: &MySqlPool,
) -> Result<AttendanceSettings, ApiError> {
    cache.attendance(pool).await.map_err(|e| {
        error!(error = %e, "Failed to load attendance settings");
        ApiError::Internal
    })
}

/// The evening schedule for that day wins over the regular day shift.
pub(crate) async fn shift_for(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    settings: &AttendanceSettings,
) -> Result<Shift, ApiError> {
    let evening = sqlx::query_as::<_, (NaiveTime, NaiveTime)>(
        "SELECT shift_start, shift_end FROM evening_schedules WHERE employee_id = ? AND shift_date = ?",
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(db_failure("Failed to load evening schedule"))?;

    Ok(match evening {
        Some((start, end)) => Shift { start, end },
        None => settings.day_shift(),
    })
}

fn window_error(e: WindowError) -> ApiError {
    ApiError::bad_request(e.to_string())
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in", body = Object, example = json!({
            "message": "Checked in successfully", "status": "late", "late_minutes": 12
        })),
        (status = 400, description = "Already checked in today, or outside the check-in window"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<SettingsCache>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id;
    let now = Utc::now().with_timezone(&config.local_offset());
    let (today, at) = (now.date_naive(), now.time());

    let settings = attendance_settings(&cache, pool.get_ref()).await?;
    let shift = shift_for(pool.get_ref(), employee_id, today, &settings).await?;
    let result = classify_check_in(at, shift, &settings).map_err(window_error)?;

    let insert = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, check_in_status, late_minutes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(at)
    .bind(result.status.to_string())
    .bind(result.late_minutes)
    .execute(pool.get_ref())
    .await;

    match insert {
        Ok(_) => {
            info!(employee_id, status = %result.status, "Checked in");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Checked in successfully",
                "status": result.status.to_string(),
                "late_minutes": result.late_minutes
            })))
        }
        // Duplicate check-in for same day
        Err(e) if is_duplicate(&e) => Err(ApiError::bad_request("Already checked in today").into()),
        // token outlived the employee row
        Err(e) if is_missing_reference(&e) => Err(ApiError::not_found("Employee not found").into()),
        Err(e) => {
            error!(error = %e, employee_id, "Check-in failed");
            Err(ApiError::Internal.into())
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "message": "Checked out successfully", "status": "complete", "worked_minutes": 360
        })),
        (status = 400, description = "No active check-in found for today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<SettingsCache>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id;
    let now = Utc::now().with_timezone(&config.local_offset());
    let (today, at) = (now.date_naive(), now.time());

    let open = sqlx::query_as::<_, (u64, Option<NaiveTime>)>(
        r#"
        SELECT id, check_in FROM attendance
        WHERE employee_id = ? AND date = ? AND check_out IS NULL
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_failure("Failed to load open check-in"))?;

    let (record_id, came_at) = match open {
        Some((id, Some(check_in))) => (id, check_in),
        _ => return Err(ApiError::bad_request("No active check-in found for today").into()),
    };

    let settings = attendance_settings(&cache, pool.get_ref()).await?;
    let shift = shift_for(pool.get_ref(), employee_id, today, &settings).await?;
    let result = classify_check_out(came_at, at, shift).map_err(window_error)?;

    let res = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, check_out_status = ?, early_leave_minutes = ?, worked_minutes = ?
        WHERE id = ? AND check_out IS NULL
        "#,
    )
    .bind(at)
    .bind(result.status.to_string())
    .bind(result.early_leave_minutes)
    .bind(result.worked_minutes)
    .bind(record_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Check-out failed");
        ApiError::Internal
    })?;

    if res.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active check-in found for today").into());
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "status": result.status.to_string(),
        "early_leave_minutes": result.early_leave_minutes,
        "worked_minutes": result.worked_minutes
    })))
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct TimesheetQuery {
    /// Defaults to the caller
    #[schema(example = 12)]
    pub employee_id: Option<u64>,
    /// `YYYY-MM`, defaults to the current month
    #[schema(example = "2026-03")]
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct Timesheet {
    pub employee_id: u64,
    #[schema(example = "2026-03")]
    pub month: String,
    pub records: Vec<Attendance>,
    pub summary: TimesheetSummary,
}

pub(crate) async fn load_timesheet(
    pool: &MySqlPool,
    employee_id: u64,
    month: String,
) -> Result<Timesheet, ApiError> {
    let (from, to) = month_range(&month)
        .ok_or_else(|| ApiError::bad_request("month must be formatted YYYY-MM"))?;

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
         WHERE employee_id = ? AND date >= ? AND date < ? ORDER BY date ASC"
    );
    let records = sqlx::query_as::<_, Attendance>(&sql)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .map_err(db_failure("Failed to load timesheet"))?;

    let summary = summarize(&records);
    Ok(Timesheet {
        employee_id,
        month,
        records,
        summary,
    })
}

/// Monthly timesheet
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Timesheet with summary", body = Timesheet),
        (status = 400, description = "Bad month"),
        (status = 403, description = "Another employee's timesheet")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<TimesheetQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = query.employee_id.unwrap_or(auth.employee_id);
    auth.require_self_or_hr(employee_id)?;

    let month = query.month.clone().unwrap_or_else(|| {
        current_month(Utc::now().with_timezone(&config.local_offset()).date_naive())
    });

    let sheet = load_timesheet(pool.get_ref(), employee_id, month).await?;
    Ok(HttpResponse::Ok().json(sheet))
}

#[derive(Deserialize, ToSchema)]
pub struct CorrectAttendance {
    #[schema(example = "08:00:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "14:00:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "Badge reader offline")]
    pub notes: Option<String>,
}

/// Manual correction by HR; statuses are recomputed.
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}",
    params(("attendance_id" = u64, Path, description = "Attendance row ID")),
    request_body = CorrectAttendance,
    responses(
        (status = 200, description = "Corrected", body = Attendance),
        (status = 400, description = "Invalid times"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Attendance row not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn correct_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    path: web::Path<u64>,
    payload: web::Json<CorrectAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let attendance_id = path.into_inner();

    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
    let current = sqlx::query_as::<_, Attendance>(&sql)
        .bind(attendance_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_failure("Failed to load attendance row"))?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    let check_in = payload.check_in.or(current.check_in);
    let check_out = payload.check_out.or(current.check_out);
    let notes = payload.notes.clone().or(current.notes);

    let settings = attendance_settings(&cache, pool.get_ref()).await?;
    let shift = shift_for(pool.get_ref(), current.employee_id, current.date, &settings).await?;

    // HR corrections may fall outside the self-service window, so only the
    // late/early arithmetic is reused here
    let (in_status, late) = match check_in {
        Some(t) => {
            let widened = AttendanceSettings {
                checkin_open_before_minutes: 24 * 60,
                ..settings.clone()
            };
            let widened_shift = Shift {
                start: shift.start,
                end: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(shift.end),
            };
            let r = classify_check_in(t, widened_shift, &widened).map_err(window_error)?;
            (Some(r.status.to_string()), r.late_minutes)
        }
        None => (None, 0),
    };

    let (out_status, early, worked) = match (check_in, check_out) {
        (Some(came), Some(left)) => {
            let r = classify_check_out(came, left, shift).map_err(window_error)?;
            (
                Some(r.status.to_string()),
                r.early_leave_minutes,
                r.worked_minutes,
            )
        }
        (None, Some(_)) => {
            return Err(ApiError::bad_request("check_out requires a check_in").into());
        }
        _ => (None, 0, 0),
    };

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_in = ?, check_out = ?, check_in_status = ?, check_out_status = ?,
            late_minutes = ?, early_leave_minutes = ?, worked_minutes = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(check_in)
    .bind(check_out)
    .bind(&in_status)
    .bind(&out_status)
    .bind(late)
    .bind(early)
    .bind(worked)
    .bind(&notes)
    .bind(attendance_id)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to correct attendance"))?;

    info!(attendance_id, by = auth.employee_id, "Attendance corrected");

    Ok(HttpResponse::Ok().json(Attendance {
        check_in,
        check_out,
        check_in_status: in_status,
        check_out_status: out_status,
        late_minutes: late as i32,
        early_leave_minutes: early as i32,
        worked_minutes: worked as i32,
        notes,
        ..current
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn check_in_requires_token() {
        let app = test_app!(|cfg| {
            cfg.route("/api/attendance/check-in", web::post().to(check_in));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/attendance/check-in")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn employee_cannot_view_colleague_timesheet() {
        let app = test_app!(|cfg| {
            cfg.route("/api/attendance", web::get().to(timesheet));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/attendance?employee_id=3&month=2026-03")
            .insert_header(bearer(4, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn malformed_month_is_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/attendance", web::get().to(timesheet));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/attendance?month=March")
            .insert_header(bearer(4, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn corrections_are_hr_only() {
        let app = test_app!(|cfg| {
            cfg.route("/api/attendance/{id}", web::put().to(correct_attendance));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/attendance/1")
            .insert_header(bearer(4, Role::Employee))
            .set_json(json!({"check_in": "08:00:00"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

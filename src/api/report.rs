use crate::{
    api::{
        attendance::{TimesheetQuery, load_timesheet},
        employee::fetch_employee,
        leave_request::fetch_leave,
        setting::center_name,
    },
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::employee::Employee,
    utils::{
        month::current_month,
        print::{Letterhead, badge_qr, render_badge, render_leave_form, render_timesheet},
    },
};
use actix_web::{HttpResponse, Responder, http::header::ContentType, web};
use chrono::Utc;
use sqlx::MySqlPool;
use tracing::error;

fn html(page: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(page)
}

async fn employee_or_404(pool: &MySqlPool, employee_id: u64) -> Result<Employee, ApiError> {
    fetch_employee(pool, employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

fn letterhead<'a>(center: &'a str, employee: &'a Employee) -> Letterhead<'a> {
    Letterhead {
        center,
        employee_name: &employee.full_name,
        employee_code: &employee.employee_code,
        department: employee.department.as_deref(),
    }
}

/// Printable monthly timesheet
#[utoipa::path(
    get,
    path = "/api/reports/timesheet",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Printable HTML page", body = String, content_type = "text/html"),
        (status = 400, description = "Bad month"),
        (status = 403, description = "Another employee's timesheet"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn timesheet_report(
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
    let employee = employee_or_404(pool.get_ref(), employee_id).await?;
    let center = center_name(pool.get_ref()).await?;

    Ok(html(render_timesheet(
        &letterhead(&center, &employee),
        &sheet.month,
        &sheet.records,
        &sheet.summary,
    )))
}

/// Printable leave request form
#[utoipa::path(
    get,
    path = "/api/reports/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Printable HTML page", body = String, content_type = "text/html"),
        (status = 403, description = "Another employee's request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn leave_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;
    auth.require_self_or_hr(leave.employee_id)?;

    let employee = employee_or_404(pool.get_ref(), leave.employee_id).await?;
    let center = center_name(pool.get_ref()).await?;

    Ok(html(render_leave_form(&letterhead(&center, &employee), &leave)))
}

/// Printable staff badge with a QR code of the employee code
#[utoipa::path(
    get,
    path = "/api/reports/badge/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Printable HTML badge", body = String, content_type = "text/html"),
        (status = 403, description = "Another employee's badge"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn badge_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = employee_or_404(pool.get_ref(), employee_id).await?;
    let center = center_name(pool.get_ref()).await?;
    let qr = badge_qr(&employee.employee_code).map_err(|e| {
        error!(error = %e, employee_id, "Failed to encode badge QR");
        ApiError::Internal
    })?;

    Ok(html(render_badge(
        &letterhead(&center, &employee),
        employee.job_title.as_deref(),
        &qr,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn colleague_timesheet_report_is_forbidden() {
        let app = test_app!(|cfg| {
            cfg.route("/api/reports/timesheet", web::get().to(timesheet_report));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/reports/timesheet?employee_id=99&month=2026-03")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn colleague_badge_is_forbidden() {
        let app = test_app!(|cfg| {
            cfg.route("/api/reports/badge/{id}", web::get().to(badge_report));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/reports/badge/99")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn report_month_is_validated() {
        let app = test_app!(|cfg| {
            cfg.route("/api/reports/timesheet", web::get().to(timesheet_report));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/reports/timesheet?month=2026-3x")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

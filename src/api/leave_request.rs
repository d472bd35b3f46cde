use crate::auth::auth::AuthUser;
use crate::domain::leave_rules::{CreateLeave, LeaveStatus, LeaveType, deduct};
use crate::error::{ApiError, db_failure};
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest};
use crate::notify::push::{PushDispatcher, PushMessage};
use crate::utils::change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed};
use crate::utils::db_utils::paginate;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID (HR/Admin only; employees always see their own)
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

pub(crate) async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveRequest>, ApiError> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, leave_id, "Failed to fetch leave request");
            ApiError::Internal
        })
}

fn announce(feed: &ChangeFeed, leave: u64, owner: u64, action: ChangeAction) {
    feed.publish(ChangeEvent::new(
        "leave_requests",
        action,
        leave,
        Audience::Employees(vec![owner]),
    ));
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(content = CreateLeave, description = "Leave request form", content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted", "id": 31, "days": 3, "status": "pending"
        })),
        (status = 400, description = "Missing required fields or reversed dates"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id;
    let leave = payload.validate()?;

    let res = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, days, reason, substitute_name)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(leave.leave_type.to_string())
    .bind(leave.start_date)
    .bind(leave.end_date)
    .bind(leave.days)
    .bind(&leave.reason)
    .bind(&leave.substitute_name)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to create leave request");
        ApiError::Internal
    })?;

    let id = res.last_insert_id();
    feed.publish(ChangeEvent::new(
        "leave_requests",
        ChangeAction::Insert,
        id,
        Audience::Employees(vec![employee_id]),
    ));

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "days": leave.days,
        "status": LeaveStatus::Pending.to_string()
    })))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave approved", "remaining_balance": 18
        })),
        (status = 400, description = "Leave request already processed"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Insufficient balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    push: web::Data<PushDispatcher>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();

    let mut tx = pool
        .begin()
        .await
        .map_err(db_failure("Failed to start approval transaction"))?;

    let row = sqlx::query_as::<_, (u64, String, i32, String)>(
        "SELECT employee_id, leave_type, days, status FROM leave_requests WHERE id = ? FOR UPDATE",
    )
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_failure("Approve leave: load failed"))?;

    let (owner, leave_type, days, status) =
        row.ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    if status != LeaveStatus::Pending.to_string() {
        return Err(ApiError::bad_request("Leave request already processed").into());
    }

    let leave_type = LeaveType::from_str(&leave_type).map_err(|_| {
        error!(leave_id, %leave_type, "Stored leave type is unknown");
        ApiError::Internal
    })?;

    let mut remaining = None;
    if let Some(column) = leave_type.balance_column() {
        let select = format!("SELECT {column} FROM employees WHERE id = ? FOR UPDATE");
        let balance = sqlx::query_scalar::<_, i32>(&select)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_failure("Approve leave: balance lookup failed"))?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;

        let left = deduct(balance as i64, days as i64).map_err(|e| {
            ApiError::conflict(format!(
                "Insufficient {} balance: {} available, {} requested",
                leave_type.arabic_label(),
                e.available,
                e.requested
            ))
        })?;

        let update = format!("UPDATE employees SET {column} = ? WHERE id = ?");
        sqlx::query(&update)
            .bind(left)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Approve leave: balance update failed"))?;
        remaining = Some(left);
    }

    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = 'approved', reviewed_by = ?, reviewed_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(auth.employee_id)
    .bind(leave_id)
    .execute(&mut *tx)
    .await
    .map_err(db_failure("Approve leave: status update failed"))?;

    tx.commit()
        .await
        .map_err(db_failure("Approve leave: commit failed"))?;

    info!(leave_id, owner, days, by = auth.employee_id, "Leave approved");

    announce(&feed, leave_id, owner, ChangeAction::Update);
    push.spawn_notify(
        pool.get_ref().clone(),
        vec![owner],
        PushMessage::new("تمت الموافقة على الإجازة", format!("{days} يوم"), Some("/leave")),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved",
        "remaining_balance": remaining
    })))
}

/// Pending → `to`, guarded so only one decision wins.
async fn decide(
    pool: &MySqlPool,
    leave_id: u64,
    to: LeaveStatus,
    reviewer: Option<u64>,
    owner_only: Option<u64>,
) -> Result<u64, ApiError> {
    let mut sql = String::from(
        "UPDATE leave_requests SET status = ?, reviewed_by = ?, reviewed_at = CURRENT_TIMESTAMP \
         WHERE id = ? AND status = 'pending'",
    );
    if owner_only.is_some() {
        sql.push_str(" AND employee_id = ?");
    }

    let mut q = sqlx::query(&sql)
        .bind(to.to_string())
        .bind(reviewer)
        .bind(leave_id);
    if let Some(owner) = owner_only {
        q = q.bind(owner);
    }

    let res = q.execute(pool).await.map_err(|e| {
        error!(error = %e, leave_id, to = %to, "Leave status change failed");
        ApiError::Internal
    })?;

    Ok(res.rows_affected())
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({"message": "Leave rejected"})),
        (status = 400, description = "Leave request not found or already processed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    push: web::Data<PushDispatcher>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();

    if decide(pool.get_ref(), leave_id, LeaveStatus::Rejected, Some(auth.employee_id), None).await? == 0 {
        return Err(ApiError::bad_request("Leave request not found or already processed").into());
    }

    if let Some(leave) = fetch_leave(pool.get_ref(), leave_id).await? {
        announce(&feed, leave_id, leave.employee_id, ChangeAction::Update);
        push.spawn_notify(
            pool.get_ref().clone(),
            vec![leave.employee_id],
            PushMessage::new("تم رفض طلب الإجازة", leave.start_date.to_string(), Some("/leave")),
        );
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

/// Cancel own pending request
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(("leave_id" = u64, Path, description = "ID of the caller's leave request")),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({"message": "Leave cancelled"})),
        (status = 400, description = "Not found, not yours, or already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let changed = decide(
        pool.get_ref(),
        leave_id,
        LeaveStatus::Cancelled,
        None,
        Some(auth.employee_id),
    )
    .await?;
    if changed == 0 {
        return Err(ApiError::bad_request("Leave request not found or already processed").into());
    }

    announce(&feed, leave_id, auth.employee_id, ChangeAction::Update);
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave cancelled" })))
}

/// Leave request details
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Another employee's request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let leave = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;
    auth.require_self_or_hr(leave.employee_id)?;

    Ok(HttpResponse::Ok().json(leave))
}

/// Leave applications
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 10);

    // employees only ever see their own requests
    let employee_filter = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.employee_id)
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = employee_filter {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        LeaveStatus::from_str(status)
            .map_err(|_| ApiError::bad_request(format!("Unknown leave status '{status}'")))?;
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_failure("Failed to count leave requests"))?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page as u64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to fetch leave list"))?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};
    use serde_json::Value;

    #[actix_web::test]
    async fn missing_required_fields_block_submission() {
        let app = test_app!(|cfg| {
            cfg.route("/api/leave", web::post().to(create_leave));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/leave")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({ "leave_type": "اعتيادية", "start_date": "2026-04-05" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["fields"][0]["field"], "end_date");
        assert_eq!(body["fields"][1]["field"], "reason");
    }

    #[actix_web::test]
    async fn unknown_leave_type_is_a_bad_request() {
        let app = test_app!(|cfg| {
            cfg.route("/api/leave", web::post().to(create_leave));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/leave")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({
                "leave_type": "vacation",
                "start_date": "2026-04-05",
                "end_date": "2026-04-06",
                "reason": "x"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_approve_or_reject() {
        let app = test_app!(|cfg| {
            cfg.route("/api/leave/{id}/approve", web::put().to(approve_leave))
                .route("/api/leave/{id}/reject", web::put().to(reject_leave));
        });

        for action in ["approve", "reject"] {
            let req = actix_test::TestRequest::put()
                .uri(&format!("/api/leave/3/{action}"))
                .insert_header(bearer(12, Role::Employee))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{action}");
        }
    }

    #[actix_web::test]
    async fn unknown_status_filter_is_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/leave", web::get().to(leave_list));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/leave?status=archived")
            .insert_header(bearer(2, Role::Hr))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

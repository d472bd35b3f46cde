use crate::{
    auth::auth::AuthUser,
    db::is_duplicate,
    error::{ApiError, FieldError, db_failure},
    model::asset::{ASSET_COLUMNS, ASSET_STATUSES, Asset},
    utils::db_utils::{build_update_sql, execute_update, paginate},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "category",
    "serial_number",
    "location",
    "status",
    "purchase_date",
    "notes",
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAsset {
    #[schema(example = "ECG monitor")]
    pub name: String,
    #[schema(example = "medical_device")]
    pub category: String,
    #[schema(example = "ECG-2231-77")]
    pub serial_number: Option<String>,
    #[schema(example = "ER room 2")]
    pub location: Option<String>,
    #[schema(value_type = Option<String>, format = "date", example = "2025-11-20")]
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignAsset {
    #[schema(example = 12)]
    pub employee_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssetQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<u64>,
    /// Matches name or serial number
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AssetListResponse {
    pub data: Vec<Asset>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn map_write_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> ApiError {
    move |e| {
        if is_duplicate(&e) {
            ApiError::conflict("Serial number already registered")
        } else {
            error!(error = %e, "{}", context);
            ApiError::Internal
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/assets",
    request_body = CreateAsset,
    responses(
        (status = 201, description = "Asset registered", body = Object, example = json!({"message": "Asset registered", "id": 7})),
        (status = 400, description = "Name or category missing"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Serial number already registered")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn create_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAsset>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(FieldError::missing("name"));
    }
    if payload.category.trim().is_empty() {
        errors.push(FieldError::missing("category"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors).into());
    }

    let serial = payload
        .serial_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let res = sqlx::query(
        r#"
        INSERT INTO assets (name, category, serial_number, location, purchase_date, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.category.trim())
    .bind(serial)
    .bind(&payload.location)
    .bind(payload.purchase_date)
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(map_write_error("Failed to register asset"))?;

    let id = res.last_insert_id();
    info!(id, "Asset registered");
    Ok(HttpResponse::Created().json(json!({ "message": "Asset registered", "id": id })))
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
    Like(String),
}

#[utoipa::path(
    get,
    path = "/api/assets",
    params(AssetQuery),
    responses(
        (status = 200, description = "Paginated asset list", body = AssetListResponse),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn list_assets(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssetQuery>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(status) = query.status.as_deref() {
        if !ASSET_STATUSES.contains(&status) {
            return Err(ApiError::bad_request(format!("Unknown asset status '{status}'")).into());
        }
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }
    if let Some(category) = query.category.as_deref() {
        where_sql.push_str(" AND category = ?");
        args.push(FilterValue::Str(category));
    }
    if let Some(location) = query.location.as_deref() {
        where_sql.push_str(" AND location = ?");
        args.push(FilterValue::Str(location));
    }
    if let Some(holder) = query.assigned_to {
        where_sql.push_str(" AND assigned_to = ?");
        args.push(FilterValue::U64(holder));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        where_sql.push_str(" AND (name LIKE ? OR serial_number LIKE ?)");
        args.push(FilterValue::Like(format!("%{search}%")));
        args.push(FilterValue::Like(format!("%{search}%")));
    }

    let count_sql = format!("SELECT COUNT(*) FROM assets{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
            FilterValue::Like(s) => count_q.bind(s.as_str()),
        };
    }
    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_failure("Failed to count assets"))?;

    let data_sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets{} ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, Asset>(&data_sql);
    for arg in &args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(*v),
            FilterValue::Str(s) => data_q.bind(*s),
            FilterValue::Like(s) => data_q.bind(s.as_str()),
        };
    }
    let data = data_q
        .bind(per_page as u64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to fetch assets"))?;

    Ok(HttpResponse::Ok().json(AssetListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Only stock on the shelf can be handed over; a holder is never replaced silently.
fn ensure_assignable(asset: &Asset) -> Result<(), ApiError> {
    match (asset.status.as_str(), asset.assigned_to) {
        ("available", None) => Ok(()),
        (_, Some(holder)) => Err(ApiError::conflict(format!(
            "Asset is already held by employee {holder}, return it first"
        ))),
        (status, None) => Err(ApiError::conflict(format!("Asset is {status} and cannot be assigned"))),
    }
}

async fn fetch_asset(pool: &MySqlPool, asset_id: u64) -> Result<Asset, ApiError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?");
    sqlx::query_as::<_, Asset>(&sql)
        .bind(asset_id)
        .fetch_optional(pool)
        .await
        .map_err(db_failure("Failed to fetch asset"))?
        .ok_or_else(|| ApiError::not_found("Asset not found"))
}

#[utoipa::path(
    get,
    path = "/api/assets/{asset_id}",
    params(("asset_id" = u64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset found", body = Asset),
        (status = 404, description = "Asset not found")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn get_asset(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let asset = fetch_asset(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(asset))
}

#[utoipa::path(
    put,
    path = "/api/assets/{asset_id}",
    params(("asset_id" = u64, Path, description = "Asset ID")),
    request_body(content = Object, description = "Any editable asset column"),
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 400, description = "Empty body, non-editable field or unknown status"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Serial number already registered")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn update_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();

    if let Some(status) = body.get("status") {
        let known = status.as_str().is_some_and(|s| ASSET_STATUSES.contains(&s));
        if !known {
            return Err(ApiError::bad_request("Unknown asset status").into());
        }
    }

    let update = build_update_sql("assets", &body, UPDATABLE_COLUMNS, "id", asset_id)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(map_write_error("Failed to update asset"))?;

    let asset = fetch_asset(pool.get_ref(), asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

#[utoipa::path(
    put,
    path = "/api/assets/{asset_id}/assign",
    params(("asset_id" = u64, Path, description = "Asset ID")),
    request_body = AssignAsset,
    responses(
        (status = 200, description = "Asset handed over", body = Asset),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Asset or employee not found"),
        (status = 409, description = "Asset is held, retired or under maintenance")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn assign_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignAsset>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();

    if crate::api::employee::fetch_employee(pool.get_ref(), payload.employee_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Employee not found").into());
    }

    let res = sqlx::query(
        "UPDATE assets SET assigned_to = ?, status = 'in_use' WHERE id = ? AND status = 'available'",
    )
    .bind(payload.employee_id)
    .bind(asset_id)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to assign asset"))?;

    if res.rows_affected() == 0 {
        let current = fetch_asset(pool.get_ref(), asset_id).await?;
        ensure_assignable(&current)?;
        return Err(ApiError::conflict("Asset changed while assigning, reload and retry").into());
    }

    info!(asset_id, employee_id = payload.employee_id, "Asset assigned");
    let asset = fetch_asset(pool.get_ref(), asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

#[utoipa::path(
    put,
    path = "/api/assets/{asset_id}/return",
    params(("asset_id" = u64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset back in stock", body = Asset),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Asset not found")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn return_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();

    sqlx::query("UPDATE assets SET assigned_to = NULL, status = 'available' WHERE id = ?")
        .bind(asset_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to return asset"))?;

    let asset = fetch_asset(pool.get_ref(), asset_id).await?;
    Ok(HttpResponse::Ok().json(asset))
}

#[utoipa::path(
    delete,
    path = "/api/assets/{asset_id}",
    params(("asset_id" = u64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset removed", body = Object, example = json!({"message": "Asset removed"})),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Asset not found")
    ),
    tag = "Asset",
    security(("bearer_auth" = []))
)]
pub async fn delete_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let res = sqlx::query("DELETE FROM assets WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete asset"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Asset not found").into());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Asset removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{ResponseError, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn blank_name_and_category_are_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/assets", web::post().to(create_asset));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/assets")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "name": " ", "category": "" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["fields"].as_array().map(Vec::len), Some(2));
    }

    #[actix_web::test]
    async fn unknown_status_cannot_be_set() {
        let app = test_app!(|cfg| {
            cfg.route("/api/assets/{id}", web::put().to(update_asset));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/assets/7")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "status": "lost" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn holder_changes_only_through_assign() {
        let app = test_app!(|cfg| {
            cfg.route("/api/assets/{id}", web::put().to(update_asset));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/assets/7")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "assigned_to": 12 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_assign() {
        let app = test_app!(|cfg| {
            cfg.route("/api/assets/{id}/assign", web::put().to(assign_asset));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/assets/7/assign")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({ "employee_id": 12 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    fn asset(status: &str, assigned_to: Option<u64>) -> Asset {
        Asset {
            id: 7,
            name: "Pulse oximeter".into(),
            category: "devices".into(),
            serial_number: Some("PX-100".into()),
            location: None,
            status: status.into(),
            assigned_to,
            purchase_date: None,
            notes: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn only_available_unheld_assets_can_be_assigned() {
        assert!(ensure_assignable(&asset("available", None)).is_ok());

        for (status, holder) in [
            ("in_use", Some(12)),
            ("retired", None),
            ("maintenance", None),
            ("available", Some(12)),
        ] {
            let err = ensure_assignable(&asset(status, holder)).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::CONFLICT, "{status}");
        }
    }

    #[actix_web::test]
    async fn unknown_status_filter_is_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/assets", web::get().to(list_assets));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/assets?status=lost")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

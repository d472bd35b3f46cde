use crate::{
    auth::{auth::AuthUser, password::hash_national_id},
    db::is_duplicate,
    error::{ApiError, FieldError, db_failure},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        role::Role,
    },
    utils::db_utils::{build_update_sql, execute_update, paginate},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const EMPLOYEE_STATUSES: &[&str] = &["active", "inactive"];

/// Columns HR may change through `PUT /employee/{id}`.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "full_name",
    "job_title",
    "department",
    "phone",
    "email",
    "role",
    "hire_date",
    "annual_balance",
    "casual_balance",
    "status",
    "national_id_hash",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-014")]
    pub employee_code: String,
    #[schema(example = "Ahmed Fathy")]
    pub full_name: String,
    #[schema(example = "29001011234567")]
    pub national_id: String,
    #[schema(example = "Lab Technician")]
    pub job_title: Option<String>,
    #[schema(example = "Laboratory")]
    pub department: Option<String>,
    #[schema(example = "+201001234567")]
    pub phone: Option<String>,
    #[schema(example = "ahmed@center.example", format = "email")]
    pub email: Option<String>,
    /// 1 admin, 2 hr, 3 employee (default)
    #[schema(example = 3)]
    pub role: Option<u8>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 21)]
    pub annual_balance: Option<i32>,
    #[schema(example = 7)]
    pub casual_balance: Option<i32>,
}

impl CreateEmployee {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if self.employee_code.trim().is_empty() {
            errors.push(FieldError::missing("employee_code"));
        }
        if self.full_name.trim().is_empty() {
            errors.push(FieldError::missing("full_name"));
        }
        if crate::auth::password::normalize_national_id(&self.national_id).is_empty() {
            errors.push(FieldError::missing("national_id"));
        }
        if let Some(role) = self.role {
            if Role::from_id(role).is_none() {
                errors.push(FieldError::invalid("role", "role must be 1, 2 or 3"));
            }
        }
        if self.annual_balance.is_some_and(|b| b < 0) {
            errors.push(FieldError::invalid("annual_balance", "cannot be negative"));
        }
        if self.casual_balance.is_some_and(|b| b < 0) {
            errors.push(FieldError::invalid("casual_balance", "cannot be negative"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub role: Option<u8>,
    /// Search by name, code or job title
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

pub async fn fetch_employee(pool: &MySqlPool, id: u64) -> Result<Option<Employee>, ApiError> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = id, "Failed to fetch employee");
            ApiError::Internal
        })
}

/// Ids of every active employee, used for broadcast messages.
pub async fn active_employee_ids(pool: &MySqlPool) -> Result<Vec<u64>, ApiError> {
    sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE status = 'active'")
        .fetch_all(pool)
        .await
        .map_err(db_failure("Failed to list active employees"))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created", "id": 14
        })),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Employee code already exists")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    payload.validate()?;

    // only admins may create other admins
    let role = payload.role.unwrap_or(Role::Employee.id());
    if role == Role::Admin.id() {
        auth.require_admin()?;
    }

    let hashed = hash_national_id(&payload.national_id).map_err(|e| {
        error!(error = %e, "Failed to hash national id");
        ApiError::Internal
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, full_name, national_id_hash, job_title, department, phone, email,
             role, hire_date, annual_balance, casual_balance)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.full_name.trim())
    .bind(&hashed)
    .bind(&payload.job_title)
    .bind(&payload.department)
    .bind(&payload.phone)
    .bind(&payload.email)
    .bind(role)
    .bind(payload.hire_date)
    .bind(payload.annual_balance.unwrap_or(21))
    .bind(payload.casual_balance.unwrap_or(7))
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(employee_id = res.last_insert_id(), by = auth.employee_id, "Employee created");
            Ok(HttpResponse::Created().json(json!({
                "message": "Employee created",
                "id": res.last_insert_id()
            })))
        }
        Err(e) if is_duplicate(&e) => Err(ApiError::conflict("Employee code already exists").into()),
        Err(e) => {
            error!(error = %e, "Failed to create employee");
            Err(ApiError::Internal.into())
        }
    }
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<Value> = Vec::new();

    if let Some(department) = &query.department {
        conditions.push("department = ?");
        bindings.push(department.clone().into());
    }

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone().into());
    }

    if let Some(role) = query.role {
        conditions.push("role = ?");
        bindings.push(role.into());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(full_name LIKE ? OR employee_code LIKE ? OR job_title LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone().into());
        bindings.push(like.clone().into());
        bindings.push(like.into());
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            Value::Number(n) => count_query.bind(n.as_u64()),
            other => count_query.bind(other.as_str().map(str::to_string)),
        };
    }

    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_failure("Failed to count employees"))?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {} ORDER BY full_name ASC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = match b {
            Value::Number(n) => data_query.bind(n.as_u64()),
            other => data_query.bind(other.as_str().map(str::to_string)),
        };
    }

    let employees = data_query
        .bind(per_page as u64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to fetch employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    match fetch_employee(pool.get_ref(), employee_id).await? {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Err(ApiError::not_found("Employee not found").into()),
    }
}

/// Turn the client payload into column values: `national_id` becomes its hash,
/// enum-like columns are checked, and the hash column itself cannot be set directly.
fn prepare_update(mut body: Value) -> Result<Value, ApiError> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.contains_key("national_id_hash") {
        return Err(ApiError::bad_request("Field 'national_id_hash' cannot be updated"));
    }

    if let Some(status) = obj.get("status") {
        if !status.as_str().is_some_and(|s| EMPLOYEE_STATUSES.contains(&s)) {
            return Err(ApiError::Validation(vec![FieldError::invalid(
                "status",
                "status must be active or inactive",
            )]));
        }
    }

    if let Some(role) = obj.get("role") {
        let valid = role
            .as_u64()
            .and_then(|r| u8::try_from(r).ok())
            .and_then(Role::from_id)
            .is_some();
        if !valid {
            return Err(ApiError::Validation(vec![FieldError::invalid(
                "role",
                "role must be 1, 2 or 3",
            )]));
        }
    }

    if let Some(national_id) = obj.remove("national_id") {
        let raw = national_id.as_str().unwrap_or_default();
        if crate::auth::password::normalize_national_id(raw).is_empty() {
            return Err(ApiError::Validation(vec![FieldError::missing("national_id")]));
        }
        let hashed = hash_national_id(raw).map_err(|e| {
            error!(error = %e, "Failed to hash national id");
            ApiError::Internal
        })?;
        obj.insert("national_id_hash".to_string(), Value::String(hashed));
    }

    Ok(body)
}

/// Only an admin may edit an admin's row or grant the admin role.
fn ensure_may_edit(auth: &AuthUser, target_role: Option<Role>, body: &Value) -> Result<(), ApiError> {
    let grants_admin = body.get("role").and_then(Value::as_u64) == Some(Role::Admin.id() as u64);
    if grants_admin || target_role == Some(Role::Admin) {
        auth.require_admin()?;
    }
    Ok(())
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of the employee fields"),
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({
            "message": "Employee updated"
        })),
        (status = 400, description = "Empty payload or field not updatable"),
        (status = 403, description = "HR editing an admin account or granting admin"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let body = prepare_update(body.into_inner())?;
    ensure_may_edit(&auth, None, &body)?;
    if auth.role != Role::Admin {
        let target = fetch_employee(pool.get_ref(), employee_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;
        ensure_may_edit(&auth, Role::from_id(target.role), &body)?;
    }

    let update = build_update_sql("employees", &body, UPDATABLE_COLUMNS, "id", employee_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) if is_duplicate(&e) => {
            return Err(ApiError::conflict("Employee code already exists").into());
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to update employee");
            return Err(ApiError::Internal.into());
        }
    };

    // MySQL reports 0 affected rows when values are unchanged, so confirm existence
    if affected == 0 && fetch_employee(pool.get_ref(), employee_id).await?.is_none() {
        return Err(ApiError::not_found("Employee not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated" })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    if employee_id == auth.employee_id {
        return Err(ApiError::bad_request("You cannot delete your own account").into());
    }

    let res = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete employee"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn employees_cannot_list_staff() {
        let app = test_app!(|cfg| {
            cfg.route("/api/employee", web::get().to(list_employees));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/employee")
            .insert_header(bearer(7, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn employee_cannot_read_colleague_profile() {
        let app = test_app!(|cfg| {
            cfg.route("/api/employee/{id}", web::get().to(get_employee));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/employee/8")
            .insert_header(bearer(7, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn create_reports_missing_fields() {
        let app = test_app!(|cfg| {
            cfg.route("/api/employee", web::post().to(create_employee));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/employee")
            .insert_header(bearer(1, Role::Hr))
            .set_json(json!({
                "employee_code": " ",
                "full_name": "Ali",
                "national_id": "--",
                "hire_date": "2026-01-01"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        let fields: Vec<_> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["employee_code", "national_id"]);
    }

    #[actix_web::test]
    async fn hr_cannot_promote_to_admin() {
        let app = test_app!(|cfg| {
            cfg.route("/api/employee/{id}", web::put().to(update_employee));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/employee/9")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "role": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            employee_id: 2,
            employee_code: "EMP-002".into(),
            role,
        }
    }

    #[test]
    fn hr_cannot_edit_an_admin_account() {
        let hr = caller(Role::Hr);
        for body in [
            json!({"national_id": "29001011234567"}),
            json!({"status": "inactive"}),
            json!({"role": 3}),
        ] {
            let err = ensure_may_edit(&hr, Some(Role::Admin), &body).unwrap_err();
            assert!(matches!(err, ApiError::Forbidden(_)), "{body}");
        }
        assert!(ensure_may_edit(&hr, Some(Role::Employee), &json!({"status": "inactive"})).is_ok());
        assert!(ensure_may_edit(&hr, Some(Role::Hr), &json!({"role": 3})).is_ok());
    }

    #[test]
    fn admins_edit_anyone() {
        let admin = caller(Role::Admin);
        assert!(ensure_may_edit(&admin, Some(Role::Admin), &json!({"status": "inactive"})).is_ok());
        assert!(ensure_may_edit(&admin, Some(Role::Employee), &json!({"role": 1})).is_ok());
    }

    #[test]
    fn national_id_is_hashed_before_update() {
        let prepared = prepare_update(json!({"national_id": "290-0101"})).unwrap();
        assert!(prepared.get("national_id").is_none());
        assert!(
            prepared["national_id_hash"]
                .as_str()
                .unwrap()
                .starts_with("$argon2")
        );
    }

    #[test]
    fn hash_column_and_bad_enums_are_refused() {
        assert!(prepare_update(json!({"national_id_hash": "x"})).is_err());
        assert!(prepare_update(json!({"status": "fired"})).is_err());
        assert!(prepare_update(json!({"role": 9})).is_err());
        assert!(prepare_update(json!({"status": "inactive", "role": 2})).is_ok());
    }
}

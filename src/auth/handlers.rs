use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_national_id,
    },
    config::Config,
    error::{ApiError, db_failure},
    models::{Claims, LoginReqDto, LoginRow, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a fresh access/refresh pair and persist the refresh jti.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    employee_id: u64,
    employee_code: &str,
    role: u8,
) -> Result<TokenPair, ApiError> {
    let access_token = generate_access_token(
        employee_id,
        employee_code.to_string(),
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to sign access token");
        ApiError::Internal
    })?;

    let (refresh_token, refresh_claims): (String, Claims) = generate_refresh_token(
        employee_id,
        employee_code.to_string(),
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to sign refresh token");
        ApiError::Internal
    })?;

    debug!(employee_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (employee_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(employee_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(db_failure("Failed to store refresh token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Login with employee code and national ID
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Missing employee code or national ID"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(employee_code = %payload.employee_code)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    let code = payload.employee_code.trim();
    if code.is_empty() || payload.national_id.trim().is_empty() {
        info!("Validation failed: empty employee code or national id");
        return Err(ApiError::bad_request("Employee code and national ID are required").into());
    }

    let row = sqlx::query_as::<_, LoginRow>(
        r#"
        SELECT id, employee_code, national_id_hash, role, status
        FROM employees
        WHERE employee_code = ?
        "#,
    )
    .bind(code)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_failure("Database error while fetching employee"))?;

    let row = match row {
        Some(r) => r,
        None => {
            info!("Invalid credentials: employee not found");
            return Err(ApiError::unauthorized("Invalid credentials").into());
        }
    };

    if row.status != "active" {
        info!(employee_id = row.id, "Login refused: inactive employee");
        return Err(ApiError::unauthorized("Invalid credentials").into());
    }

    if let Err(e) = verify_national_id(&payload.national_id, &row.national_id_hash) {
        info!(error = %e, "Invalid credentials: national id mismatch");
        return Err(ApiError::unauthorized("Invalid credentials").into());
    }

    let tokens = issue_tokens(pool.get_ref(), &config, row.id, &row.employee_code, row.role).await?;

    info!(employee_id = row.id, "Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let token = bearer_token(&req).ok_or_else(|| ApiError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Refresh token required").into());
    }

    // revoking only succeeds once per jti, so a replayed token loses the race
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to revoke refresh token"))?;

    if revoked.rows_affected() == 0 {
        return Err(ApiError::unauthorized("Refresh token revoked or unknown").into());
    }

    // role may have changed since the token was issued
    let current = sqlx::query_as::<_, (u8, String)>(
        "SELECT role, status FROM employees WHERE id = ?",
    )
    .bind(claims.employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_failure("Failed to load employee for refresh"))?;

    let role = match current {
        Some((role, status)) if status == "active" => role,
        _ => return Err(ApiError::unauthorized("Employee inactive or removed").into()),
    };

    let tokens = issue_tokens(pool.get_ref(), &config, claims.employee_id, &claims.sub, role).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token (idempotent)
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Own employee profile", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Employee removed")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let employee = crate::api::employee::fetch_employee(pool.get_ref(), auth.employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test, web::Data};

    #[actix_web::test]
    async fn login_requires_both_fields() {
        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(crate::db::lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .route("/auth/login", web::post().to(login)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({"employee_code": "EMP-1", "national_id": "  "}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn refresh_rejects_access_tokens() {
        let config = Config::for_tests();
        let access =
            generate_access_token(1, "EMP-1".into(), 3, &config.jwt_secret, 60).unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(crate::db::lazy_pool()))
                .app_data(Data::new(config))
                .route("/auth/refresh", web::post().to(refresh_token)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/auth/refresh")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn logout_without_token_is_no_content() {
        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(crate::db::lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .route("/auth/logout", web::post().to(logout)),
        )
        .await;

        let req = actix_test::TestRequest::post().uri("/auth/logout").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}

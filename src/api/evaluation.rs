use crate::{
    auth::auth::AuthUser,
    db::{is_duplicate, is_missing_reference},
    domain::evaluation_grade::{Grade, Scores, valid_period},
    error::{ApiError, FieldError, db_failure},
    model::evaluation::{EVALUATION_COLUMNS, Evaluation},
    utils::change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed},
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateEvaluation {
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = "2026-03")]
    pub period: String,
    #[schema(example = 18)]
    pub attendance: u8,
    #[schema(example = 17)]
    pub performance: u8,
    #[schema(example = 19)]
    pub behavior: u8,
    #[schema(example = 16)]
    pub teamwork: u8,
    #[schema(example = 20)]
    pub appearance: u8,
    #[schema(example = "Reliable on night shifts")]
    pub notes: Option<String>,
}

impl CreateEvaluation {
    fn scores(&self) -> Scores {
        Scores {
            attendance: self.attendance,
            performance: self.performance,
            behavior: self.behavior,
            teamwork: self.teamwork,
            appearance: self.appearance,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EvaluationQuery {
    /// Whose evaluations to list; defaults to the caller
    pub employee_id: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/evaluations",
    request_body = CreateEvaluation,
    responses(
        (status = 201, description = "Evaluation recorded", body = Object, example = json!({
            "message": "Evaluation recorded", "id": 4, "total": 90, "grade": "excellent", "grade_label": "ممتاز"
        })),
        (status = 400, description = "Score out of range or malformed period"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee already evaluated for this period")
    ),
    tag = "Evaluation",
    security(("bearer_auth" = []))
)]
pub async fn create_evaluation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateEvaluation>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if !valid_period(&payload.period) {
        return Err(ApiError::Validation(vec![FieldError::invalid(
            "period",
            "period must be YYYY-MM",
        )])
        .into());
    }
    let scores = payload.scores();
    scores.validate()?;

    let total = scores.total();
    let grade = Grade::from_total(total);

    let res = sqlx::query(
        r#"
        INSERT INTO evaluations
            (employee_id, evaluator_id, period, attendance_score, performance_score,
             behavior_score, teamwork_score, appearance_score, total, grade, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(auth.employee_id)
    .bind(&payload.period)
    .bind(scores.attendance)
    .bind(scores.performance)
    .bind(scores.behavior)
    .bind(scores.teamwork)
    .bind(scores.appearance)
    .bind(total)
    .bind(grade.to_string())
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await;

    match res {
        Ok(r) => {
            let id = r.last_insert_id();
            info!(id, employee_id = payload.employee_id, period = %payload.period, total, "Evaluation recorded");
            feed.publish(ChangeEvent::new(
                "evaluations",
                ChangeAction::Insert,
                id,
                Audience::Employees(vec![payload.employee_id]),
            ));
            Ok(HttpResponse::Created().json(json!({
                "message": "Evaluation recorded",
                "id": id,
                "total": total,
                "grade": grade,
                "grade_label": grade.arabic_label()
            })))
        }
        Err(e) if is_duplicate(&e) => {
            Err(ApiError::conflict("Employee already evaluated for this period").into())
        }
        Err(e) if is_missing_reference(&e) => Err(ApiError::not_found("Employee not found").into()),
        Err(e) => {
            error!(error = %e, employee_id = payload.employee_id, "Failed to record evaluation");
            Err(ApiError::Internal.into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/evaluations",
    params(EvaluationQuery),
    responses(
        (status = 200, description = "Evaluations, newest period first", body = [Evaluation]),
        (status = 403, description = "Another employee's evaluations")
    ),
    tag = "Evaluation",
    security(("bearer_auth" = []))
)]
pub async fn list_evaluations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EvaluationQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = query.employee_id.unwrap_or(auth.employee_id);
    auth.require_self_or_hr(employee_id)?;

    let sql = format!(
        "SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE employee_id = ? ORDER BY period DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, Evaluation>(&sql)
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to list evaluations"))?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/evaluations/{evaluation_id}",
    params(("evaluation_id" = u64, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Evaluation found", body = Evaluation),
        (status = 403, description = "Another employee's evaluation"),
        (status = 404, description = "Evaluation not found")
    ),
    tag = "Evaluation",
    security(("bearer_auth" = []))
)]
pub async fn get_evaluation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let sql = format!("SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE id = ?");
    let evaluation = sqlx::query_as::<_, Evaluation>(&sql)
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_failure("Failed to fetch evaluation"))?
        .ok_or_else(|| ApiError::not_found("Evaluation not found"))?;

    auth.require_self_or_hr(evaluation.employee_id)?;
    Ok(HttpResponse::Ok().json(evaluation))
}

#[utoipa::path(
    delete,
    path = "/api/evaluations/{evaluation_id}",
    params(("evaluation_id" = u64, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Evaluation deleted", body = Object, example = json!({"message": "Evaluation deleted"})),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Evaluation not found")
    ),
    tag = "Evaluation",
    security(("bearer_auth" = []))
)]
pub async fn delete_evaluation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let evaluation_id = path.into_inner();

    let res = sqlx::query("DELETE FROM evaluations WHERE id = ?")
        .bind(evaluation_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete evaluation"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Evaluation not found").into());
    }

    info!(evaluation_id, by = auth.employee_id, "Evaluation deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Evaluation deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};
    use serde_json::Value;

    fn form(period: &str, attendance: u8) -> Value {
        json!({
            "employee_id": 12,
            "period": period,
            "attendance": attendance,
            "performance": 10,
            "behavior": 10,
            "teamwork": 10,
            "appearance": 10
        })
    }

    #[actix_web::test]
    async fn only_hr_records_evaluations() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evaluations", web::post().to(create_evaluation));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/evaluations")
            .insert_header(bearer(12, Role::Employee))
            .set_json(form("2026-03", 10))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn score_above_twenty_names_the_criterion() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evaluations", web::post().to(create_evaluation));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/evaluations")
            .insert_header(bearer(2, Role::Hr))
            .set_json(form("2026-03", 21))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["fields"][0]["field"], "attendance");
    }

    #[actix_web::test]
    async fn malformed_period_is_rejected() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evaluations", web::post().to(create_evaluation));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/evaluations")
            .insert_header(bearer(2, Role::Hr))
            .set_json(form("03/2026", 10))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_list_a_colleague() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evaluations", web::get().to(list_evaluations));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/evaluations?employee_id=99")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn delete_is_admin_only() {
        let app = test_app!(|cfg| {
            cfg.route("/api/evaluations/{id}", web::delete().to(delete_evaluation));
        });

        let req = actix_test::TestRequest::delete()
            .uri("/api/evaluations/4")
            .insert_header(bearer(2, Role::Hr))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

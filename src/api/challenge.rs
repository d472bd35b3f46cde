use crate::{
    auth::auth::AuthUser,
    config::Config,
    db::is_duplicate,
    domain::quiz::{QuizOutcome, deadline, grade, validate_challenge},
    error::{ApiError, db_failure},
    model::challenge::{DailyChallenge, TrainingLog},
    utils::month::{current_month, month_range},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlPool, types::Json};
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const CHALLENGE_COLUMNS: &str =
    "id, challenge_date, question, options, correct_index, time_limit_seconds, points";
const LOG_COLUMNS: &str = "id, employee_id, challenge_id, started_at, answered_at, \
     selected_index, outcome, points_awarded";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChallenge {
    #[schema(value_type = String, format = "date", example = "2026-03-05")]
    pub challenge_date: NaiveDate,
    #[schema(example = "Normal adult resting heart rate?")]
    pub question: String,
    #[schema(example = json!(["40-50", "60-100", "110-130"]))]
    pub options: Vec<String>,
    #[schema(example = 1)]
    pub correct_index: u8,
    #[schema(example = 30)]
    pub time_limit_seconds: Option<i32>,
    #[schema(example = 10)]
    pub points: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    #[schema(example = 1)]
    pub selected_index: u8,
}

/// Today's question as shown to a player; the answer stays on the server.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeAttempt {
    pub challenge_id: u64,
    pub question: String,
    pub options: Vec<String>,
    pub time_limit_seconds: i32,
    pub points: i32,
    #[schema(value_type = String, format = "date-time")]
    pub started_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub deadline: DateTime<Utc>,
    #[schema(example = "pending")]
    pub outcome: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaderboardRow {
    pub employee_id: u64,
    pub full_name: String,
    pub points: i64,
    pub wins: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// `YYYY-MM`, defaults to the current month
    pub month: Option<String>,
}

fn today(config: &Config) -> NaiveDate {
    Utc::now().with_timezone(&config.local_offset()).date_naive()
}

async fn challenge_for(pool: &MySqlPool, date: NaiveDate) -> Result<DailyChallenge, ApiError> {
    let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM ai_daily_challenges WHERE challenge_date = ?");
    sqlx::query_as::<_, DailyChallenge>(&sql)
        .bind(date)
        .fetch_optional(pool)
        .await
        .map_err(db_failure("Failed to load daily challenge"))?
        .ok_or_else(|| ApiError::not_found("No challenge today"))
}

async fn attempt_of(
    pool: &MySqlPool,
    employee_id: u64,
    challenge_id: u64,
) -> Result<Option<TrainingLog>, ApiError> {
    let sql = format!(
        "SELECT {LOG_COLUMNS} FROM training_logs WHERE employee_id = ? AND challenge_id = ?"
    );
    sqlx::query_as::<_, TrainingLog>(&sql)
        .bind(employee_id)
        .bind(challenge_id)
        .fetch_optional(pool)
        .await
        .map_err(db_failure("Failed to load training log"))
}

#[utoipa::path(
    post,
    path = "/api/challenges",
    request_body = CreateChallenge,
    responses(
        (status = 201, description = "Challenge scheduled", body = Object, example = json!({"message": "Challenge scheduled", "id": 6})),
        (status = 400, description = "Invalid question, options or limits"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "A challenge already exists for that date")
    ),
    tag = "Challenge",
    security(("bearer_auth" = []))
)]
pub async fn create_challenge(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateChallenge>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let time_limit = payload.time_limit_seconds.unwrap_or(30);
    let points = payload.points.unwrap_or(10);
    validate_challenge(
        &payload.question,
        &payload.options,
        payload.correct_index,
        time_limit,
        points,
    )?;

    let options: Vec<String> = payload.options.iter().map(|o| o.trim().to_string()).collect();

    let res = sqlx::query(
        r#"
        INSERT INTO ai_daily_challenges
            (challenge_date, question, options, correct_index, time_limit_seconds, points)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.challenge_date)
    .bind(payload.question.trim())
    .bind(Json(options))
    .bind(payload.correct_index)
    .bind(time_limit)
    .bind(points)
    .execute(pool.get_ref())
    .await;

    match res {
        Ok(r) => {
            let id = r.last_insert_id();
            info!(id, date = %payload.challenge_date, "Daily challenge scheduled");
            Ok(HttpResponse::Created().json(json!({ "message": "Challenge scheduled", "id": id })))
        }
        Err(e) if is_duplicate(&e) => {
            Err(ApiError::conflict("A challenge already exists for that date").into())
        }
        Err(e) => {
            error!(error = %e, "Failed to schedule challenge");
            Err(ApiError::Internal.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/challenges/today/start",
    responses(
        (status = 200, description = "Question and timer; starting again returns the same attempt", body = ChallengeAttempt),
        (status = 404, description = "No challenge today")
    ),
    tag = "Challenge",
    security(("bearer_auth" = []))
)]
pub async fn start_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let challenge = challenge_for(pool.get_ref(), today(&config)).await?;

    // one attempt per employee and challenge; a restart keeps the first timer
    sqlx::query(
        "INSERT IGNORE INTO training_logs (employee_id, challenge_id, started_at) VALUES (?, ?, ?)",
    )
    .bind(auth.employee_id)
    .bind(challenge.id)
    .bind(Utc::now())
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to start challenge"))?;

    let attempt = attempt_of(pool.get_ref(), auth.employee_id, challenge.id)
        .await?
        .ok_or(ApiError::Internal)?;

    debug!(
        employee_id = auth.employee_id,
        challenge_id = challenge.id,
        date = %challenge.challenge_date,
        "Challenge started"
    );

    Ok(HttpResponse::Ok().json(ChallengeAttempt {
        challenge_id: challenge.id,
        question: challenge.question,
        options: challenge.options.0,
        time_limit_seconds: challenge.time_limit_seconds,
        points: challenge.points,
        started_at: attempt.started_at,
        deadline: deadline(attempt.started_at, challenge.time_limit_seconds),
        outcome: attempt.outcome,
    }))
}

#[utoipa::path(
    post,
    path = "/api/challenges/today/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Graded answer", body = Object, example = json!({
            "outcome": "win", "points": 10, "late": false, "correct_index": 1
        })),
        (status = 400, description = "Challenge not started or option out of range"),
        (status = 404, description = "No challenge today"),
        (status = 409, description = "Already answered")
    ),
    tag = "Challenge",
    security(("bearer_auth" = []))
)]
pub async fn answer_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<AnswerRequest>,
) -> actix_web::Result<impl Responder> {
    let answered_at = Utc::now();
    let challenge = challenge_for(pool.get_ref(), today(&config)).await?;

    if payload.selected_index as usize >= challenge.options.0.len() {
        return Err(ApiError::bad_request("Selected option does not exist").into());
    }

    let attempt = attempt_of(pool.get_ref(), auth.employee_id, challenge.id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Start the challenge first"))?;

    if attempt.outcome != QuizOutcome::Pending.to_string() {
        return Err(ApiError::conflict("Challenge already answered").into());
    }

    let graded = grade(
        attempt.started_at,
        answered_at,
        challenge.time_limit_seconds,
        payload.selected_index,
        challenge.correct_index,
        challenge.points,
    );

    let res = sqlx::query(
        r#"
        UPDATE training_logs
        SET answered_at = ?, selected_index = ?, outcome = ?, points_awarded = ?
        WHERE id = ? AND outcome = 'pending'
        "#,
    )
    .bind(answered_at)
    .bind(payload.selected_index)
    .bind(graded.outcome.to_string())
    .bind(graded.points)
    .bind(attempt.id)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to record answer"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::conflict("Challenge already answered").into());
    }

    info!(
        employee_id = auth.employee_id,
        challenge_id = challenge.id,
        outcome = %graded.outcome,
        late = graded.late,
        "Challenge answered"
    );

    Ok(HttpResponse::Ok().json(json!({
        "outcome": graded.outcome.to_string(),
        "points": graded.points,
        "late": graded.late,
        "correct_index": challenge.correct_index
    })))
}

#[utoipa::path(
    get,
    path = "/api/challenges/leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Points per employee, highest first", body = [LeaderboardRow]),
        (status = 400, description = "Malformed month")
    ),
    tag = "Challenge",
    security(("bearer_auth" = []))
)]
pub async fn leaderboard(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<LeaderboardQuery>,
) -> actix_web::Result<impl Responder> {
    let month = query
        .month
        .clone()
        .unwrap_or_else(|| current_month(today(&config)));
    let (first, next) =
        month_range(&month).ok_or_else(|| ApiError::bad_request("month must be YYYY-MM"))?;

    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT t.employee_id,
               e.full_name,
               CAST(COALESCE(SUM(t.points_awarded), 0) AS SIGNED) AS points,
               CAST(COALESCE(SUM(t.outcome = 'win'), 0) AS SIGNED) AS wins
        FROM training_logs t
        JOIN ai_daily_challenges c ON c.id = t.challenge_id
        JOIN employees e ON e.id = t.employee_id
        WHERE c.challenge_date >= ? AND c.challenge_date < ?
        GROUP BY t.employee_id, e.full_name
        ORDER BY points DESC, wins DESC, e.full_name ASC
        LIMIT 50
        "#,
    )
    .bind(first)
    .bind(next)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_failure("Failed to build leaderboard"))?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};
    use serde_json::Value;

    #[actix_web::test]
    async fn one_option_is_not_a_question() {
        let app = test_app!(|cfg| {
            cfg.route("/api/challenges", web::post().to(create_challenge));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/challenges")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({
                "challenge_date": "2026-03-05",
                "question": "Pick one",
                "options": ["only"],
                "correct_index": 0
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["fields"][0]["field"], "options");
    }

    #[actix_web::test]
    async fn employees_cannot_author_challenges() {
        let app = test_app!(|cfg| {
            cfg.route("/api/challenges", web::post().to(create_challenge));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/challenges")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({
                "challenge_date": "2026-03-05",
                "question": "Q",
                "options": ["a", "b"],
                "correct_index": 0
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn leaderboard_month_is_validated() {
        let app = test_app!(|cfg| {
            cfg.route("/api/challenges/leaderboard", web::get().to(leaderboard));
        });

        let req = actix_test::TestRequest::get()
            .uri("/api/challenges/leaderboard?month=March")
            .insert_header(bearer(12, Role::Employee))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn answering_requires_a_token() {
        let app = test_app!(|cfg| {
            cfg.route("/api/challenges/today/answer", web::post().to(answer_today));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/challenges/today/answer")
            .set_json(json!({ "selected_index": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

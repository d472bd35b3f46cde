use crate::{
    auth::auth::AuthUser,
    error::{ApiError, FieldError, db_failure},
    model::news::{NEWS_COLUMNS, NewsPost},
    notify::push::{PushDispatcher, PushMessage},
    utils::{
        change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed},
        db_utils::{build_update_sql, execute_update, paginate},
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE_COLUMNS: &[&str] = &["title", "body", "image_url", "pinned"];

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNews {
    #[schema(example = "Vaccination campaign")]
    pub title: Option<String>,
    #[schema(example = "The flu vaccination campaign starts on Sunday.")]
    pub body: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NewsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn required_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/news",
    request_body = CreateNews,
    responses(
        (status = 201, description = "News published", body = Object, example = json!({"message": "News published", "id": 5})),
        (status = 400, description = "Title or body missing"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "News",
    security(("bearer_auth" = []))
)]
pub async fn create_news(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    push: web::Data<PushDispatcher>,
    payload: web::Json<CreateNews>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let title = required_text(&payload.title);
    let body = required_text(&payload.body);
    let (Some(title), Some(body)) = (title, body) else {
        let mut errors = Vec::new();
        if title.is_none() {
            errors.push(FieldError::missing("title"));
        }
        if body.is_none() {
            errors.push(FieldError::missing("body"));
        }
        return Err(ApiError::Validation(errors).into());
    };

    let res = sqlx::query(
        "INSERT INTO news_posts (author_id, title, body, image_url, pinned) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth.employee_id)
    .bind(title)
    .bind(body)
    .bind(&payload.image_url)
    .bind(payload.pinned)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to publish news"))?;

    let id = res.last_insert_id();
    info!(id, author = auth.employee_id, "News published");

    feed.publish(ChangeEvent::new(
        "news_posts",
        ChangeAction::Insert,
        id,
        Audience::Everyone,
    ));
    push.spawn_notify_everyone(
        pool.get_ref().clone(),
        PushMessage::new(title, body, Some("/news")),
    );

    Ok(HttpResponse::Created().json(json!({ "message": "News published", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/news",
    params(NewsQuery),
    responses((status = 200, description = "Pinned posts first, then newest", body = [NewsPost])),
    tag = "News",
    security(("bearer_auth" = []))
)]
pub async fn list_news(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NewsQuery>,
) -> actix_web::Result<impl Responder> {
    let (_, per_page, offset) = paginate(query.page, query.per_page, 20);

    let sql = format!(
        "SELECT {NEWS_COLUMNS} FROM news_posts ORDER BY pinned DESC, created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let posts = sqlx::query_as::<_, NewsPost>(&sql)
        .bind(per_page as u64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_failure("Failed to list news"))?;

    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    put,
    path = "/api/news/{news_id}",
    params(("news_id" = u64, Path, description = "News post ID")),
    request_body(content = Object, description = "Any of title, body, image_url, pinned"),
    responses(
        (status = 200, description = "News updated", body = Object, example = json!({"message": "News updated"})),
        (status = 400, description = "Empty body or non-editable field"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "News post not found")
    ),
    tag = "News",
    security(("bearer_auth" = []))
)]
pub async fn update_news(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let news_id = path.into_inner();

    let update = build_update_sql("news_posts", &body, UPDATABLE_COLUMNS, "id", news_id)?;
    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(db_failure("Failed to update news"))?;

    if affected == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_posts WHERE id = ?")
            .bind(news_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(db_failure("Failed to look up news"))?;
        if exists == 0 {
            return Err(ApiError::not_found("News post not found").into());
        }
    }

    feed.publish(ChangeEvent::new(
        "news_posts",
        ChangeAction::Update,
        news_id,
        Audience::Everyone,
    ));
    Ok(HttpResponse::Ok().json(json!({ "message": "News updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/news/{news_id}",
    params(("news_id" = u64, Path, description = "News post ID")),
    responses(
        (status = 200, description = "News deleted", body = Object, example = json!({"message": "News deleted"})),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "News post not found")
    ),
    tag = "News",
    security(("bearer_auth" = []))
)]
pub async fn delete_news(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let news_id = path.into_inner();

    let res = sqlx::query("DELETE FROM news_posts WHERE id = ?")
        .bind(news_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete news"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("News post not found").into());
    }

    feed.publish(ChangeEvent::new(
        "news_posts",
        ChangeAction::Delete,
        news_id,
        Audience::Everyone,
    ));
    Ok(HttpResponse::Ok().json(json!({ "message": "News deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn title_and_body_are_required() {
        let app = test_app!(|cfg| {
            cfg.route("/api/news", web::post().to(create_news));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/news")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "title": "  " }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["fields"][0]["field"], "title");
        assert_eq!(body["fields"][1]["field"], "body");
    }

    #[actix_web::test]
    async fn employees_cannot_publish() {
        let app = test_app!(|cfg| {
            cfg.route("/api/news", web::post().to(create_news));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/news")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({ "title": "t", "body": "b" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn author_cannot_be_rewritten() {
        let app = test_app!(|cfg| {
            cfg.route("/api/news/{id}", web::put().to(update_news));
        });

        let req = actix_test::TestRequest::put()
            .uri("/api/news/5")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "author_id": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

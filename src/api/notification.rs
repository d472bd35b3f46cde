use crate::{
    auth::auth::AuthUser,
    error::{ApiError, FieldError, db_failure},
    notify::push::{PushDispatcher, PushMessage, PushTarget},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Deserialize, ToSchema)]
pub struct Subscribe {
    #[schema(example = "https://fcm.googleapis.com/fcm/send/abc123")]
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct Unsubscribe {
    pub endpoint: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DispatchRequest {
    #[serde(rename = "userId")]
    #[schema(example = 12)]
    pub user_id: Option<u64>,
    #[serde(rename = "userIds")]
    pub user_ids: Option<Vec<u64>>,
    pub subscriptions: Option<Vec<PushTarget>>,
    #[schema(example = "Staff meeting")]
    pub title: Option<String>,
    #[schema(example = "Meeting room B at 13:00")]
    pub body: Option<String>,
    #[schema(example = "/news")]
    pub url: Option<String>,
}

#[derive(Debug, PartialEq)]
enum DispatchTarget {
    Employees(Vec<u64>),
    Subscriptions(Vec<PushTarget>),
}

impl DispatchRequest {
    fn resolve(self) -> Result<(DispatchTarget, PushMessage), ApiError> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Validation(vec![FieldError::missing("title")]))?
            .to_string();

        let target = match (self.user_id, self.user_ids, self.subscriptions) {
            (Some(id), None, None) => DispatchTarget::Employees(vec![id]),
            (None, Some(ids), None) if !ids.is_empty() => DispatchTarget::Employees(ids),
            (None, None, Some(subs)) if !subs.is_empty() => DispatchTarget::Subscriptions(subs),
            _ => {
                return Err(ApiError::bad_request(
                    "Provide exactly one of userId, userIds or subscriptions",
                ));
            }
        };

        let message = PushMessage::new(title, self.body.unwrap_or_default(), self.url.as_deref());
        Ok((target, message))
    }
}

#[utoipa::path(
    post,
    path = "/api/notifications/subscribe",
    request_body = Subscribe,
    responses(
        (status = 200, description = "Subscription stored", body = Object, example = json!({"message": "Subscribed"})),
        (status = 400, description = "Endpoint or keys missing")
    ),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn subscribe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<Subscribe>,
) -> actix_web::Result<impl Responder> {
    let mut errors = Vec::new();
    if !payload.endpoint.starts_with("https://") {
        errors.push(FieldError::invalid("endpoint", "must be an https URL"));
    }
    if payload.keys.p256dh.trim().is_empty() {
        errors.push(FieldError::missing("keys.p256dh"));
    }
    if payload.keys.auth.trim().is_empty() {
        errors.push(FieldError::missing("keys.auth"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors).into());
    }

    // an endpoint belongs to one browser, so it moves with whoever logged in last
    sqlx::query(
        r#"
        INSERT INTO push_subscriptions (employee_id, endpoint, p256dh, auth)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            employee_id = VALUES(employee_id),
            p256dh = VALUES(p256dh),
            auth = VALUES(auth)
        "#,
    )
    .bind(auth.employee_id)
    .bind(&payload.endpoint)
    .bind(&payload.keys.p256dh)
    .bind(&payload.keys.auth)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to store push subscription"))?;

    info!(employee_id = auth.employee_id, "Push subscription stored");
    Ok(HttpResponse::Ok().json(json!({ "message": "Subscribed" })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/subscribe",
    request_body = Unsubscribe,
    responses((status = 204, description = "Subscription removed (or was never there)")),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn unsubscribe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<Unsubscribe>,
) -> actix_web::Result<impl Responder> {
    sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ? AND employee_id = ?")
        .bind(&payload.endpoint)
        .bind(auth.employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to remove push subscription"))?;

    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/notifications/dispatch",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Delivery report", body = FanOutReport),
        (status = 400, description = "Missing title or not exactly one target form"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn dispatch(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    push: web::Data<PushDispatcher>,
    payload: web::Json<DispatchRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (target, message) = payload.into_inner().resolve()?;

    let report = match target {
        DispatchTarget::Employees(ids) => push.notify_employees(pool.get_ref(), &ids, &message).await,
        DispatchTarget::Subscriptions(subs) => push.dispatch(pool.get_ref(), &subs, &message).await,
    }
    .map_err(|e| {
        error!(error = %e, "Push dispatch failed");
        ApiError::Internal
    })?;

    info!(
        by = auth.employee_id,
        delivered = report.delivered,
        failed = report.failed,
        removed = report.removed.len(),
        "Push dispatched"
    );
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};

    fn titled() -> DispatchRequest {
        DispatchRequest {
            title: Some("Heads up".into()),
            ..Default::default()
        }
    }

    #[test]
    fn single_user_becomes_a_one_element_list() {
        let req = DispatchRequest {
            user_id: Some(12),
            ..titled()
        };
        let (target, message) = req.resolve().unwrap();
        assert_eq!(target, DispatchTarget::Employees(vec![12]));
        assert_eq!(message.title, "Heads up");
        assert_eq!(message.body, "");
    }

    #[test]
    fn two_target_forms_are_ambiguous() {
        let req = DispatchRequest {
            user_id: Some(12),
            user_ids: Some(vec![13]),
            ..titled()
        };
        assert!(matches!(req.resolve(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn no_target_or_empty_list_is_rejected() {
        assert!(matches!(titled().resolve(), Err(ApiError::BadRequest(_))));

        let empty = DispatchRequest {
            user_ids: Some(vec![]),
            ..titled()
        };
        assert!(matches!(empty.resolve(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn title_is_required() {
        let req = DispatchRequest {
            user_id: Some(12),
            title: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(req.resolve(), Err(ApiError::Validation(_))));
    }

    #[actix_web::test]
    async fn camel_case_fields_are_accepted() {
        let app = test_app!(|cfg| {
            cfg.route("/api/notifications/dispatch", web::post().to(dispatch));
        });

        // userId and userIds together: parsed, then refused as ambiguous
        let req = actix_test::TestRequest::post()
            .uri("/api/notifications/dispatch")
            .insert_header(bearer(2, Role::Hr))
            .set_json(json!({ "userId": 12, "userIds": [13], "title": "x" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_dispatch() {
        let app = test_app!(|cfg| {
            cfg.route("/api/notifications/dispatch", web::post().to(dispatch));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/notifications/dispatch")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({ "userId": 12, "title": "x" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn plain_http_endpoints_are_refused() {
        let app = test_app!(|cfg| {
            cfg.route("/api/notifications/subscribe", web::post().to(subscribe));
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/notifications/subscribe")
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({
                "endpoint": "http://push.example/abc",
                "keys": { "p256dh": "k", "auth": "a" }
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

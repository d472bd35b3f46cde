use crate::{
    api::employee::active_employee_ids,
    auth::auth::AuthUser,
    error::{ApiError, FieldError, db_failure},
    model::message::{MESSAGE_COLUMNS, Message},
    notify::push::{PushDispatcher, PushMessage},
    utils::{
        change_feed::{Audience, ChangeAction, ChangeEvent, ChangeFeed},
        db_utils::paginate,
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SendMessage {
    #[schema(example = json!([12, 15]))]
    pub recipient_ids: Option<Vec<u64>>,
    /// Send to every active employee (HR/Admin only)
    #[serde(default)]
    pub broadcast: bool,
    #[schema(example = "Shift swap")]
    pub subject: Option<String>,
    #[schema(example = "Please confirm Thursday's evening shift.")]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MessagePage {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageListResponse {
    pub data: Vec<Message>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Who a message goes to, once the form has been checked.
#[derive(Debug, PartialEq, Eq)]
enum Recipients {
    Listed(Vec<u64>),
    Everyone,
}

impl SendMessage {
    fn validate(&self, auth: &AuthUser) -> Result<(Recipients, String), ApiError> {
        let body = self.body.as_deref().map(str::trim).unwrap_or_default();
        let listed = self.recipient_ids.as_ref().filter(|ids| !ids.is_empty());

        let mut errors = Vec::new();
        if body.is_empty() {
            errors.push(FieldError::missing("body"));
        }
        if listed.is_none() && !self.broadcast {
            errors.push(FieldError::missing("recipient_ids"));
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let recipients = if self.broadcast {
            if !auth.is_hr_or_admin() {
                return Err(ApiError::forbidden("Only HR can broadcast messages"));
            }
            Recipients::Everyone
        } else {
            let mut ids = listed.cloned().unwrap_or_default();
            ids.sort_unstable();
            ids.dedup();
            Recipients::Listed(ids)
        };

        Ok((recipients, body.to_string()))
    }
}

/// Requested ids that are not active employees, in request order.
fn unknown_recipients(requested: &[u64], active: &[u64]) -> Vec<u64> {
    requested
        .iter()
        .copied()
        .filter(|id| !active.contains(id))
        .collect()
}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessage,
    responses(
        (status = 201, description = "Message sent", body = Object, example = json!({
            "message": "Message sent", "recipients": 2
        })),
        (status = 400, description = "Missing body, or recipients that are not active employees"),
        (status = 403, description = "Broadcast is HR/Admin only")
    ),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn send_message(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    push: web::Data<PushDispatcher>,
    payload: web::Json<SendMessage>,
) -> actix_web::Result<impl Responder> {
    let (recipients, body) = payload.validate(&auth)?;
    let subject = payload
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let active = active_employee_ids(pool.get_ref()).await?;
    let recipient_ids = match recipients {
        Recipients::Listed(ids) => {
            let unknown = unknown_recipients(&ids, &active);
            if !unknown.is_empty() {
                return Err(ApiError::bad_request(format!(
                    "Unknown or inactive recipients: {unknown:?}"
                ))
                .into());
            }
            ids
        }
        Recipients::Everyone => active
            .into_iter()
            .filter(|id| *id != auth.employee_id)
            .collect(),
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(db_failure("Failed to start message transaction"))?;

    let mut inserted = Vec::with_capacity(recipient_ids.len());
    for recipient in &recipient_ids {
        let res = sqlx::query(
            "INSERT INTO messages (sender_id, recipient_id, subject, body) VALUES (?, ?, ?, ?)",
        )
        .bind(auth.employee_id)
        .bind(recipient)
        .bind(&subject)
        .bind(&body)
        .execute(&mut *tx)
        .await
        .map_err(db_failure("Failed to insert message"))?;
        inserted.push((res.last_insert_id(), *recipient));
    }

    tx.commit()
        .await
        .map_err(db_failure("Failed to commit messages"))?;

    for (id, recipient) in &inserted {
        feed.publish(ChangeEvent::new(
            "messages",
            ChangeAction::Insert,
            *id,
            Audience::Employees(vec![*recipient]),
        ));
    }

    let title = subject.clone().unwrap_or_else(|| "رسالة جديدة".to_string());
    push.spawn_notify(
        pool.get_ref().clone(),
        recipient_ids.clone(),
        PushMessage::new(title, body, Some("/messages")),
    );

    info!(sender = auth.employee_id, recipients = inserted.len(), "Message sent");

    Ok(HttpResponse::Created().json(json!({
        "message": "Message sent",
        "recipients": inserted.len()
    })))
}

async fn message_page(
    pool: &MySqlPool,
    column: &'static str,
    employee_id: u64,
    query: &MessagePage,
) -> Result<MessageListResponse, ApiError> {
    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let count_sql = format!("SELECT COUNT(*) FROM messages WHERE {column} = ?");
    let total = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(employee_id)
        .fetch_one(pool)
        .await
        .map_err(db_failure("Failed to count messages"))?;

    let data_sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {column} = ? \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = sqlx::query_as::<_, Message>(&data_sql)
        .bind(employee_id)
        .bind(per_page as u64)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(db_failure("Failed to fetch messages"))?;

    Ok(MessageListResponse {
        data,
        page,
        per_page,
        total,
    })
}

#[utoipa::path(
    get,
    path = "/api/messages/inbox",
    params(MessagePage),
    responses((status = 200, description = "Messages received by the caller", body = MessageListResponse)),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn inbox(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MessagePage>,
) -> actix_web::Result<impl Responder> {
    let page = message_page(pool.get_ref(), "recipient_id", auth.employee_id, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/messages/sent",
    params(MessagePage),
    responses((status = 200, description = "Messages sent by the caller", body = MessageListResponse)),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn sent(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MessagePage>,
) -> actix_web::Result<impl Responder> {
    let page = message_page(pool.get_ref(), "sender_id", auth.employee_id, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    responses((status = 200, description = "Unread messages in the caller's inbox", body = Object, example = json!({"unread": 3}))),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn unread_count(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let unread = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND is_read = 0",
    )
    .bind(auth.employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_failure("Failed to count unread messages"))?;

    Ok(HttpResponse::Ok().json(json!({ "unread": unread })))
}

#[utoipa::path(
    put,
    path = "/api/messages/{message_id}/read",
    params(("message_id" = u64, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Marked as read", body = Object, example = json!({"message": "Marked as read"})),
        (status = 404, description = "No such message in the caller's inbox")
    ),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let message_id = path.into_inner();

    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages WHERE id = ? AND recipient_id = ?",
    )
    .bind(message_id)
    .bind(auth.employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_failure("Failed to look up message"))?;

    if found == 0 {
        return Err(ApiError::not_found("Message not found").into());
    }

    sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
        .bind(message_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to mark message read"))?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Marked as read" })))
}

#[utoipa::path(
    delete,
    path = "/api/messages/{message_id}",
    params(("message_id" = u64, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message deleted", body = Object, example = json!({"message": "Message deleted"})),
        (status = 404, description = "Not found, or the caller is neither sender nor recipient")
    ),
    tag = "Message",
    security(("bearer_auth" = []))
)]
pub async fn delete_message(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let message_id = path.into_inner();

    let res = sqlx::query("DELETE FROM messages WHERE id = ? AND (sender_id = ? OR recipient_id = ?)")
        .bind(message_id)
        .bind(auth.employee_id)
        .bind(auth.employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_failure("Failed to delete message"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found").into());
    }

    feed.publish(ChangeEvent::new(
        "messages",
        ChangeAction::Delete,
        message_id,
        Audience::Employees(vec![auth.employee_id]),
    ));
    Ok(HttpResponse::Ok().json(json!({ "message": "Message deleted" })))
}

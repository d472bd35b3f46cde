use crate::{
    auth::auth::AuthUser,
    utils::change_feed::{ChangeEvent, ChangeFeed},
};
use actix_web::{HttpResponse, web, web::Bytes};
use futures::{Stream, StreamExt, stream};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{debug, warn};

/// Frames for one subscriber: a greeting comment, then every event it may see.
fn event_stream(
    rx: Receiver<ChangeEvent>,
    employee_id: u64,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    let hello = stream::once(async { Ok::<_, actix_web::Error>(Bytes::from_static(b": connected\n\n")) });

    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.visible_to(employee_id) => {
                    return Some((Ok::<_, actix_web::Error>(Bytes::from(event.to_sse_frame())), rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(employee_id, skipped, "Change feed subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    hello.chain(events)
}

/// Live change notifications as Server-Sent Events
#[utoipa::path(
    get,
    path = "/api/events",
    responses(
        (status = 200, description = "text/event-stream of `{table, action, row_id}` frames", body = String, content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Events"
)]
pub async fn events(auth: AuthUser, feed: web::Data<ChangeFeed>) -> HttpResponse {
    debug!(employee_id = auth.employee_id, "Change feed subscriber connected");

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(event_stream(feed.subscribe(), auth.employee_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_app;
    use crate::utils::change_feed::{Audience, ChangeAction};
    use actix_web::{http::StatusCode, test as actix_test};

    fn frame(item: Option<Result<Bytes, actix_web::Error>>) -> String {
        let bytes = item.expect("stream ended").expect("frame");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[actix_web::test]
    async fn only_visible_events_reach_the_subscriber() {
        let feed = ChangeFeed::new(8);
        let mut frames = Box::pin(event_stream(feed.subscribe(), 12));

        feed.publish(ChangeEvent::new(
            "messages",
            ChangeAction::Insert,
            1,
            Audience::Employees(vec![15]),
        ));
        feed.publish(ChangeEvent::new(
            "messages",
            ChangeAction::Insert,
            2,
            Audience::Employees(vec![12]),
        ));
        feed.publish(ChangeEvent::new(
            "news_posts",
            ChangeAction::Insert,
            3,
            Audience::Everyone,
        ));

        assert_eq!(frame(frames.next().await), ": connected\n\n");

        let second = frame(frames.next().await);
        assert!(second.starts_with("event: messages\n"));
        assert!(second.contains(r#""row_id":2"#));

        let third = frame(frames.next().await);
        assert!(third.starts_with("event: news_posts\n"));
    }

    #[actix_web::test]
    async fn stream_ends_when_the_feed_is_dropped() {
        let feed = ChangeFeed::new(8);
        let mut frames = Box::pin(event_stream(feed.subscribe(), 12));
        drop(feed);

        frame(frames.next().await);
        assert!(frames.next().await.is_none());
    }

    #[actix_web::test]
    async fn subscribing_requires_a_token() {
        let app = test_app!(|cfg| {
            cfg.route("/api/events", web::get().to(events));
        });

        let req = actix_test::TestRequest::get().uri("/api/events").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

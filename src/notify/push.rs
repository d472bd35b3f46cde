//! Push-notification fan-out.
//!
//! Subscriptions are browser push endpoints stored per employee. Delivery is
//! delegated to a push gateway over HTTP; a 404 or 410 from the gateway means
//! the browser dropped the subscription, and its row is deleted.

use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PushTarget {
    #[schema(example = "https://fcm.googleapis.com/fcm/send/abc123")]
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PushMessage {
    #[schema(example = "New message")]
    pub title: String,
    #[schema(example = "You have a new internal message")]
    pub body: String,
    #[schema(example = "/messages")]
    pub url: Option<String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>, url: Option<&str>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: url.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The endpoint is gone (HTTP 404/410) and should be forgotten.
    Stale,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => DeliveryOutcome::Delivered,
            404 | 410 => DeliveryOutcome::Stale,
            other => DeliveryOutcome::Failed(format!("gateway answered {other}")),
        }
    }
}

pub trait PushSender: Send + Sync {
    fn send<'a>(
        &'a self,
        target: &'a PushTarget,
        message: &'a PushMessage,
    ) -> BoxFuture<'a, DeliveryOutcome>;
}

/// Posts each message to the configured push gateway.
pub struct GatewaySender {
    client: reqwest::Client,
    url: String,
}

impl GatewaySender {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl PushSender for GatewaySender {
    fn send<'a>(
        &'a self,
        target: &'a PushTarget,
        message: &'a PushMessage,
    ) -> BoxFuture<'a, DeliveryOutcome> {
        Box::pin(async move {
            let body = json!({
                "subscription": {
                    "endpoint": target.endpoint,
                    "keys": { "p256dh": target.p256dh, "auth": target.auth }
                },
                "payload": message,
            });

            match self.client.post(&self.url).json(&body).send().await {
                Ok(resp) => DeliveryOutcome::from_status(resp.status().as_u16()),
                Err(e) => DeliveryOutcome::Failed(e.to_string()),
            }
        })
    }
}

/// Used when no gateway is configured: every send fails softly.
pub struct DisabledSender;

impl PushSender for DisabledSender {
    fn send<'a>(
        &'a self,
        _target: &'a PushTarget,
        _message: &'a PushMessage,
    ) -> BoxFuture<'a, DeliveryOutcome> {
        Box::pin(async { DeliveryOutcome::Failed("push gateway not configured".to_string()) })
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
    /// Endpoints removed because the gateway reported them gone.
    pub removed: Vec<String>,
}

/// Deliver `message` to every target concurrently.
pub async fn fan_out(
    sender: &dyn PushSender,
    targets: &[PushTarget],
    message: &PushMessage,
) -> FanOutReport {
    let outcomes = join_all(targets.iter().map(|t| sender.send(t, message))).await;

    let mut report = FanOutReport::default();
    for (target, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            DeliveryOutcome::Delivered => report.delivered += 1,
            DeliveryOutcome::Stale => {
                report.failed += 1;
                report.removed.push(target.endpoint.clone());
            }
            DeliveryOutcome::Failed(reason) => {
                debug!(endpoint = %target.endpoint, %reason, "Push delivery failed");
                report.failed += 1;
            }
        }
    }
    report
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[derive(Clone)]
pub struct PushDispatcher {
    sender: Arc<dyn PushSender>,
}

impl PushDispatcher {
    pub fn new(sender: Arc<dyn PushSender>) -> Self {
        Self { sender }
    }

    pub fn from_gateway(url: Option<String>) -> Self {
        match url {
            Some(url) => Self::new(Arc::new(GatewaySender::new(url))),
            None => {
                warn!("PUSH_GATEWAY_URL not set, push notifications disabled");
                Self::new(Arc::new(DisabledSender))
            }
        }
    }

    pub async fn targets_for(
        pool: &MySqlPool,
        employee_ids: &[u64],
    ) -> Result<Vec<PushTarget>, sqlx::Error> {
        if employee_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT endpoint, p256dh, auth FROM push_subscriptions WHERE employee_id IN ({})",
            placeholders(employee_ids.len())
        );
        let mut q = sqlx::query_as::<_, PushTarget>(&sql);
        for id in employee_ids {
            q = q.bind(*id);
        }
        q.fetch_all(pool).await
    }

    pub async fn all_targets(pool: &MySqlPool) -> Result<Vec<PushTarget>, sqlx::Error> {
        sqlx::query_as::<_, PushTarget>("SELECT endpoint, p256dh, auth FROM push_subscriptions")
            .fetch_all(pool)
            .await
    }

    /// Fan out, then forget endpoints the gateway reported gone.
    pub async fn dispatch(
        &self,
        pool: &MySqlPool,
        targets: &[PushTarget],
        message: &PushMessage,
    ) -> Result<FanOutReport, sqlx::Error> {
        let report = fan_out(self.sender.as_ref(), targets, message).await;

        if !report.removed.is_empty() {
            let sql = format!(
                "DELETE FROM push_subscriptions WHERE endpoint IN ({})",
                placeholders(report.removed.len())
            );
            let mut q = sqlx::query(&sql);
            for endpoint in &report.removed {
                q = q.bind(endpoint);
            }
            let deleted = q.execute(pool).await?.rows_affected();
            info!(deleted, "Removed stale push subscriptions");
        }

        Ok(report)
    }

    pub async fn notify_employees(
        &self,
        pool: &MySqlPool,
        employee_ids: &[u64],
        message: &PushMessage,
    ) -> Result<FanOutReport, sqlx::Error> {
        let targets = Self::targets_for(pool, employee_ids).await?;
        self.dispatch(pool, &targets, message).await
    }

    pub async fn notify_everyone(
        &self,
        pool: &MySqlPool,
        message: &PushMessage,
    ) -> Result<FanOutReport, sqlx::Error> {
        let targets = Self::all_targets(pool).await?;
        self.dispatch(pool, &targets, message).await
    }

    /// Fire-and-forget notification from a request handler.
    pub fn spawn_notify(&self, pool: MySqlPool, employee_ids: Vec<u64>, message: PushMessage) {
        let dispatcher = self.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) = dispatcher.notify_employees(&pool, &employee_ids, &message).await {
                warn!(error = %e, "Background push notification failed");
            }
        });
    }

    pub fn spawn_notify_everyone(&self, pool: MySqlPool, message: PushMessage) {
        let dispatcher = self.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) = dispatcher.notify_everyone(&pool, &message).await {
                warn!(error = %e, "Background broadcast notification failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Answers with a fixed status per endpoint.
    struct ScriptedSender(HashMap<String, u16>);

    impl PushSender for ScriptedSender {
        fn send<'a>(
            &'a self,
            target: &'a PushTarget,
            _message: &'a PushMessage,
        ) -> BoxFuture<'a, DeliveryOutcome> {
            let status = self.0.get(&target.endpoint).copied().unwrap_or(500);
            Box::pin(async move { DeliveryOutcome::from_status(status) })
        }
    }

    fn target(endpoint: &str) -> PushTarget {
        PushTarget {
            endpoint: endpoint.to_string(),
            p256dh: "key".to_string(),
            auth: "auth".to_string(),
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(DeliveryOutcome::from_status(201), DeliveryOutcome::Delivered);
        assert_eq!(DeliveryOutcome::from_status(404), DeliveryOutcome::Stale);
        assert_eq!(DeliveryOutcome::from_status(410), DeliveryOutcome::Stale);
        assert!(matches!(DeliveryOutcome::from_status(429), DeliveryOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn only_gone_endpoints_are_removed() {
        let sender = ScriptedSender(HashMap::from([
            ("https://push/a".to_string(), 201),
            ("https://push/b".to_string(), 410),
            ("https://push/c".to_string(), 503),
            ("https://push/d".to_string(), 404),
        ]));
        let targets: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|s| target(&format!("https://push/{s}")))
            .collect();

        let report = fan_out(&sender, &targets, &PushMessage::new("t", "b", None)).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.removed, vec!["https://push/b", "https://push/d"]);
    }

    #[tokio::test]
    async fn disabled_sender_never_removes() {
        let report = fan_out(
            &DisabledSender,
            &[target("https://push/x")],
            &PushMessage::new("t", "b", Some("/news")),
        )
        .await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
        assert!(report.removed.is_empty());
    }
}

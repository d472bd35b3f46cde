use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Employees(Vec<u64>),
}

/// A row change announced to connected clients.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub action: ChangeAction,
    pub row_id: u64,
    #[serde(skip)]
    pub audience: Audience,
}

impl ChangeEvent {
    pub fn new(table: &'static str, action: ChangeAction, row_id: u64, audience: Audience) -> Self {
        Self {
            table,
            action,
            row_id,
            audience,
        }
    }

    pub fn visible_to(&self, employee_id: u64) -> bool {
        match &self.audience {
            Audience::Everyone => true,
            Audience::Employees(ids) => ids.contains(&employee_id),
        }
    }

    /// Server-Sent Events frame: `event:` is the table name, `data:` the JSON body.
    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.table, data)
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_filtering() {
        let everyone = ChangeEvent::new("news_posts", ChangeAction::Insert, 1, Audience::Everyone);
        let direct = ChangeEvent::new(
            "messages",
            ChangeAction::Insert,
            2,
            Audience::Employees(vec![10, 11]),
        );
        assert!(everyone.visible_to(42));
        assert!(direct.visible_to(11));
        assert!(!direct.visible_to(12));
    }

    #[test]
    fn sse_frame_shape() {
        let ev = ChangeEvent::new("live_matches", ChangeAction::Update, 5, Audience::Everyone);
        assert_eq!(
            ev.to_sse_frame(),
            "event: live_matches\ndata: {\"table\":\"live_matches\",\"action\":\"update\",\"row_id\":5}\n\n"
        );
    }

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        feed.publish(ChangeEvent::new("messages", ChangeAction::Insert, 1, Audience::Everyone));
        feed.publish(ChangeEvent::new("messages", ChangeAction::Update, 1, Audience::Everyone));
        assert_eq!(rx.recv().await.unwrap().action, ChangeAction::Insert);
        assert_eq!(rx.recv().await.unwrap().action, ChangeAction::Update);
    }
}

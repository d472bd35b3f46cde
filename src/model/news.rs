use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const NEWS_COLUMNS: &str = "id, author_id, title, body, image_url, pinned, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct NewsPost {
    #[schema(example = 5)]
    pub id: u64,
    #[schema(example = 2)]
    pub author_id: u64,
    #[schema(example = "Vaccination campaign")]
    pub title: String,
    #[schema(example = "The flu vaccination campaign starts on Sunday.")]
    pub body: String,
    pub image_url: Option<String>,
    pub pinned: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

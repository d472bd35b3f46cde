use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const ASSET_COLUMNS: &str = "id, name, category, serial_number, location, status, \
     assigned_to, purchase_date, notes, created_at";

pub const ASSET_STATUSES: &[&str] = &["available", "in_use", "maintenance", "retired"];

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Asset {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "ECG monitor")]
    pub name: String,
    #[schema(example = "medical_device")]
    pub category: String,
    #[schema(example = "ECG-2231-77")]
    pub serial_number: Option<String>,
    #[schema(example = "ER room 2")]
    pub location: Option<String>,
    #[schema(example = "available")]
    pub status: String,
    pub assigned_to: Option<u64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

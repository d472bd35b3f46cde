use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns selected whenever an `Employee` is loaded. The national ID hash never leaves the table.
pub const EMPLOYEE_COLUMNS: &str = "id, employee_code, full_name, job_title, department, phone, \
     email, role, hire_date, annual_balance, casual_balance, status, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "full_name": "Mona Adel",
        "job_title": "Staff Nurse",
        "department": "ICU",
        "phone": "+201001234567",
        "email": "mona.adel@center.example",
        "role": 3,
        "hire_date": "2024-01-01",
        "annual_balance": 21,
        "casual_balance": 7,
        "status": "active",
        "created_at": "2024-01-01T08:00:00Z"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "Mona Adel")]
    pub full_name: String,

    #[schema(example = "Staff Nurse", nullable = true)]
    pub job_title: Option<String>,

    #[schema(example = "ICU", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "+201001234567", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "mona.adel@center.example", nullable = true)]
    pub email: Option<String>,

    /// 1 admin, 2 hr, 3 employee
    #[schema(example = 3)]
    pub role: u8,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    #[schema(example = 21)]
    pub annual_balance: i32,

    #[schema(example = 7)]
    pub casual_balance: i32,

    #[schema(example = "active")]
    pub status: String,

    #[schema(example = "2024-01-01T08:00:00Z", value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

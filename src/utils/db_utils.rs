use crate::error::ApiError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Null,
}

/// SQL update container
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> Result<SqlValue, ApiError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
                SqlValue::Time(t)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(ApiError::bad_request("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
    })
}

/// Build a dynamic `UPDATE` from a JSON object. Only columns listed in
/// `allowed` may appear; anything else is rejected before SQL is built.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!(
            "Field '{unknown}' cannot be updated"
        )));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);
    for value in obj.values() {
        values.push(to_sql_value(value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// Execute the update, returning affected rows
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Page/per_page normalisation shared by list endpoints: page is 1-based, per_page is capped.
pub fn paginate(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    let offset = (page as u64 - 1) * per_page as u64;
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[&str] = &["full_name", "hire_date", "status"];

    #[test]
    fn builds_set_clause_and_trailing_id() {
        let update = build_update_sql(
            "employees",
            &json!({"full_name": "Sara", "hire_date": "2025-03-01"}),
            ALLOWED,
            "id",
            9,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET full_name = ?, hire_date = ? WHERE id = ?"
        );
        assert_eq!(update.values.len(), 3);
        assert_eq!(
            update.values[1],
            SqlValue::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert_eq!(update.values[2], SqlValue::U64(9));
    }

    #[test]
    fn rejects_columns_outside_whitelist() {
        let err = build_update_sql(
            "employees",
            &json!({"role = 1, status": "x"}),
            ALLOWED,
            "id",
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be updated"));
    }

    #[test]
    fn rejects_empty_and_non_objects() {
        assert!(build_update_sql("employees", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(
            build_update_sql("employees", &json!({"status": {"a": 1}}), ALLOWED, "id", 1).is_err()
        );
    }

    #[test]
    fn pagination_clamps() {
        assert_eq!(paginate(None, None, 20), (1, 20, 0));
        assert_eq!(paginate(Some(0), Some(500), 20), (1, 100, 0));
        assert_eq!(paginate(Some(3), Some(10), 20), (3, 10, 20));
    }
}

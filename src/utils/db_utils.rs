use serde_json::Value;
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool};

use crate::error::ApiError;
use crate::lateness::{Consequence, parse_schedule};
use crate::model::activity::ActivityKind;
use crate::utils::phone;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    Phone,
    Schedule,
}

/// Columns of `student_info` an admin may edit.
const STUDENT_INFO_COLUMNS: &[(&str, ColumnKind)] = &[
    ("grade", ColumnKind::Text),
    ("class_name", ColumnKind::Text),
    ("phone", ColumnKind::Phone),
    ("parent_phone", ColumnKind::Phone),
    ("address", ColumnKind::Text),
    ("scheduled_in_time", ColumnKind::Schedule),
    ("scheduled_out_time", ColumnKind::Schedule),
];

/// ===============================
/// Build a partial UPDATE of student_info
/// ===============================
pub fn build_student_info_update(payload: &Value, user_id: u64) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let kind = STUDENT_INFO_COLUMNS
            .iter()
            .find(|(column, _)| *column == key.as_str())
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ApiError::bad_request(format!("Field '{}' cannot be updated", key)))?;

        let bound = match (value, kind) {
            (Value::Null, _) => SqlValue::Null,
            (Value::String(s), ColumnKind::Schedule) => {
                let time = parse_schedule(s).ok_or_else(|| {
                    ApiError::bad_request(format!("Field '{}' must be HH:MM", key))
                })?;
                SqlValue::String(time.format("%H:%M").to_string())
            }
            // Stored digits-only, same as sign-up and student creation.
            (Value::String(s), ColumnKind::Phone) => {
                if !phone::is_valid(s) {
                    return Err(ApiError::bad_request(format!(
                        "Field '{}' must be a valid phone number",
                        key
                    )));
                }
                SqlValue::String(phone::normalize(s))
            }
            (Value::String(s), ColumnKind::Text) => SqlValue::String(s.trim().to_string()),
            _ => {
                return Err(ApiError::bad_request(format!(
                    "Field '{}' must be a string or null",
                    key
                )));
            }
        };

        columns.push(format!("{} = ?", key));
        values.push(bound);
    }

    let sql = format!(
        "UPDATE student_info SET {} WHERE user_id = ?",
        columns.join(", ")
    );

    // WHERE user_id = ?
    values.push(SqlValue::U64(user_id));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Appends an audit row.
pub async fn log_activity(
    conn: &mut MySqlConnection,
    user_id: u64,
    kind: ActivityKind,
    description: &str,
    metadata: Option<Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activities (user_id, kind, description, metadata)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_ref())
    .bind(description)
    .bind(metadata.map(Json))
    .execute(conn)
    .await?;

    Ok(())
}

/// Writes the warning and notification a lateness evaluation produced.
pub async fn append_consequence(
    conn: &mut MySqlConnection,
    user_id: u64,
    consequence: &Consequence,
) -> Result<(), sqlx::Error> {
    if consequence.is_empty() {
        return Ok(());
    }

    if let Some(warning) = &consequence.warning {
        sqlx::query(
            r#"
            INSERT INTO warnings (user_id, category, reason, count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(warning.category)
        .bind(&warning.reason)
        .bind(warning.tier.count())
        .execute(&mut *conn)
        .await?;
    }

    if let Some(notification) = &consequence.notification {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, kind)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_ref())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

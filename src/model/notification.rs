use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub message: String,
    #[schema(example = "LATE_WARNING")]
    pub kind: String,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    /// Set the first time the student, a parent or an admin acknowledges it
    #[schema(format = "date-time", value_type = Option<String>)]
    pub acknowledged_at: Option<NaiveDateTime>,
}

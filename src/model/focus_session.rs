use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct FocusSession {
    pub id: u64,
    pub user_id: u64,
    #[schema(format = "date-time", value_type = String)]
    pub started_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub ended_at: Option<NaiveDateTime>,
    pub duration_seconds: Option<u32>,
    /// Whatever the client attached when starting, e.g. the subject
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Json<Value>>,
}

/// Whole seconds between start and stop. A clock that went backwards counts as zero.
pub fn elapsed_seconds(started_at: NaiveDateTime, ended_at: NaiveDateTime) -> u32 {
    let seconds = (ended_at - started_at).num_seconds();
    u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
}

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Warning {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "CAUTION")]
    pub category: String,
    #[schema(example = "Late arrival by 12 minutes")]
    pub reason: String,
    #[schema(example = 1)]
    pub count: u8,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
}

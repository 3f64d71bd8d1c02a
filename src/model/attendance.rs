use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl AttendanceStatus {
    pub fn from_minutes_late(minutes_late: u32) -> Self {
        if minutes_late == 0 {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2025-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00", nullable = true)]
    pub scheduled_in_time: Option<String>,
    #[schema(example = "2025-03-10T09:45:00", format = "date-time", value_type = String)]
    pub check_in_time: NaiveDateTime,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(example = "LATE")]
    pub status: String,
    #[schema(example = 45)]
    pub late_minutes: u32,
}

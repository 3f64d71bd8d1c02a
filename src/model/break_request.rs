use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::lateness::LatenessContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakKind {
    Outing,
    Sleep,
}

impl BreakKind {
    pub fn return_context(self) -> LatenessContext {
        match self {
            BreakKind::Outing => LatenessContext::OutingReturn,
            BreakKind::Sleep => LatenessContext::SleepReturn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakStatus {
    Requested,
    Returned,
    LateReturn,
}

impl BreakStatus {
    pub fn from_minutes_late(minutes_late: u32) -> Self {
        if minutes_late == 0 {
            BreakStatus::Returned
        } else {
            BreakStatus::LateReturn
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BreakRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "OUTING")]
    pub kind: String,
    #[schema(example = "Convenience store")]
    pub reason: String,
    #[schema(format = "date-time", value_type = String)]
    pub start_time: NaiveDateTime,
    #[schema(format = "date-time", value_type = String)]
    pub expected_return: NaiveDateTime,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub actual_return: Option<NaiveDateTime>,
    #[schema(example = "REQUESTED")]
    pub status: String,
    pub late_minutes: u32,
}

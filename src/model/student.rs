use serde::Serialize;
use utoipa::ToSchema;

/// A student user joined with their `student_info` row.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Student {
    pub id: u64,
    pub login_id: String,
    pub name: String,
    pub student_no: String,
    pub grade: Option<String>,
    pub class_name: Option<String>,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
    pub scheduled_in_time: Option<String>,
    pub scheduled_out_time: Option<String>,
}

use crate::auth::auth::AuthUser;
use crate::error::{ApiError, is_duplicate_key};
use crate::lateness::{LatenessContext, evaluate, minutes_late, scheduled_at};
use crate::model::activity::ActivityKind;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::utils::db_utils::{append_consequence, log_activity};
use crate::utils::time;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const RECORD_COLUMNS: &str = r#"
    id, user_id, date, scheduled_in_time, check_in_time, check_out_time, status, late_minutes
"#;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    #[schema(example = "Check-in successful")]
    pub message: String,
    pub attendance: AttendanceRecord,
    #[schema(example = 45)]
    pub late_minutes: u32,
    #[schema(example = "LATE")]
    pub status: String,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthQuery {
    /// Calendar year, e.g. 2025
    pub year: Option<i32>,
    /// Month 1-12
    pub month: Option<u32>,
}

async fn find_record(
    conn: &mut MySqlConnection,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {} FROM attendances WHERE user_id = ? AND date = ?",
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(conn)
    .await
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    responses(
        (status = 200, description = "Checked in (or already checked in today)", body = CheckInResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;

    let now = time::now();
    let today = now.date();

    let schedule: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        "SELECT scheduled_in_time FROM student_info WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .flatten();

    let late_minutes = schedule
        .as_deref()
        .and_then(|s| scheduled_at(today, s))
        .map(|expected| minutes_late(expected, now))
        .unwrap_or(0);
    let status = AttendanceStatus::from_minutes_late(late_minutes);

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO attendances
            (user_id, date, scheduled_in_time, check_in_time, status, late_minutes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(today)
    .bind(schedule.as_deref())
    .bind(now)
    .bind(status.as_ref())
    .bind(late_minutes)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if !is_duplicate_key(&e) {
            return Err(e.into());
        }

        // Already checked in today: report the existing record unchanged.
        drop(tx);
        let mut conn = pool.acquire().await?;
        let existing = find_record(&mut conn, user_id, today)
            .await?
            .ok_or(ApiError::Internal)?;

        return Ok(HttpResponse::Ok().json(CheckInResponse {
            message: "Already checked in today".to_string(),
            late_minutes: existing.late_minutes,
            status: existing.status.clone(),
            attendance: existing,
        }));
    }

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::CheckIn,
        &format!("Checked in at {}", now.format("%H:%M")),
        Some(json!({ "lateMinutes": late_minutes, "status": status.as_ref() })),
    )
    .await?;

    let consequence = evaluate(LatenessContext::Arrival, late_minutes);
    append_consequence(&mut tx, user_id, &consequence).await?;

    let attendance = find_record(&mut tx, user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, login_id = %auth.login_id, late_minutes, status = %status, "Checked in");

    Ok(HttpResponse::Ok().json(CheckInResponse {
        message: "Check-in successful".to_string(),
        attendance,
        late_minutes,
        status: status.to_string(),
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "message": "Check-out successful",
            "data": {}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 404, description = "No check-in found for today"),
        (status = 409, description = "Already checked out today"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;

    let now = time::now();
    let today = now.date();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE attendances
        SET check_out_time = ?
        WHERE user_id = ?
        AND date = ?
        AND check_out_time IS NULL
        "#,
    )
    .bind(now)
    .bind(user_id)
    .bind(today)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return match find_record(&mut tx, user_id, today).await? {
            Some(_) => Err(ApiError::conflict("Already checked out today")),
            None => Err(ApiError::not_found("No check-in found for today")),
        };
    }

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::CheckOut,
        &format!("Checked out at {}", now.format("%H:%M")),
        None,
    )
    .await?;

    let data = find_record(&mut tx, user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, "Checked out");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Check-out successful",
        "data": data
    })))
}

/// Today's attendance for a user
#[utoipa::path(
    get,
    path = "/api/attendance/status/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Today's record, or NOT_CHECKED_IN", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let mut conn = pool.acquire().await?;
    match find_record(&mut conn, user_id, time::today()).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::Ok().json(json!({ "status": "NOT_CHECKED_IN" }))),
    }
}

/// Attendance records of one month
#[utoipa::path(
    get,
    path = "/api/attendance/monthly/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id"),
        MonthQuery
    ),
    responses(
        (status = 200, description = "Records ordered by date", body = [AttendanceRecord]),
        (status = 400, description = "Invalid year or month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn monthly(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let (year, month) = match (query.year, query.month) {
        (Some(year), Some(month)) => (year, month),
        _ => return Err(ApiError::bad_request("year and month are required")),
    };

    let (first, last) = time::month_bounds(year, month)
        .ok_or_else(|| ApiError::bad_request("Invalid year or month"))?;

    let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        SELECT {}
        FROM attendances
        WHERE user_id = ?
        AND date BETWEEN ? AND ?
        ORDER BY date ASC
        "#,
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(records))
}

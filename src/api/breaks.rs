use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::lateness::{evaluate, minutes_late};
use crate::model::activity::ActivityKind;
use crate::model::break_request::{BreakKind, BreakRequest, BreakStatus};
use crate::utils::db_utils::{append_consequence, log_activity};
use crate::utils::time;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use std::str::FromStr;
use tracing::info;
use utoipa::ToSchema;

const HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BreakRequestReq {
    #[serde(rename = "type")]
    #[schema(example = "OUTING")]
    pub kind: String,
    #[schema(example = "Convenience store")]
    pub reason: String,
    /// `HH:MM` (next occurrence) or a full date-time
    #[schema(example = "14:00")]
    pub expected_return_time: String,
}

async fn find_request(
    conn: &mut MySqlConnection,
    id: u64,
    user_id: u64,
) -> Result<Option<BreakRequest>, sqlx::Error> {
    sqlx::query_as::<_, BreakRequest>(
        r#"
        SELECT id, user_id, kind, reason, start_time, expected_return,
               actual_return, status, late_minutes
        FROM break_requests
        WHERE id = ?
        AND user_id = ?
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Request an outing or sleep break
#[utoipa::path(
    post,
    path = "/api/breaks/request",
    request_body = BreakRequestReq,
    responses(
        (status = 201, description = "Break requested", body = Object, example = json!({
            "message": "Break requested",
            "data": {}
        })),
        (status = 400, description = "Unknown type, empty reason or invalid return time"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Breaks"
)]
pub async fn request_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BreakRequestReq>,
) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;

    let kind = BreakKind::from_str(payload.kind.trim())
        .map_err(|_| ApiError::bad_request("type must be OUTING or SLEEP"))?;

    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }

    let now = time::now();
    let expected_return = time::parse_return_time(&payload.expected_return_time, now)
        .ok_or_else(|| ApiError::bad_request("Invalid expectedReturnTime"))?;
    if expected_return <= now {
        return Err(ApiError::bad_request("expectedReturnTime must be in the future"));
    }

    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO break_requests
            (user_id, kind, reason, start_time, expected_return, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_ref())
    .bind(reason)
    .bind(now)
    .bind(expected_return)
    .bind(BreakStatus::Requested.as_ref())
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::break_request(kind),
        &format!("{} requested until {}", kind, expected_return.format("%H:%M")),
        Some(json!({ "requestId": id, "reason": reason })),
    )
    .await?;

    let data = find_request(&mut tx, id, user_id)
        .await?
        .ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, login_id = %auth.login_id, request_id = id, kind = %kind, "Break requested");

    Ok(HttpResponse::Created().json(json!({
        "message": "Break requested",
        "data": data
    })))
}

/// Return from a break
#[utoipa::path(
    post,
    path = "/api/breaks/return/{request_id}",
    params(
        ("request_id" = u64, Path, description = "Break request id")
    ),
    responses(
        (status = 200, description = "Return recorded", body = Object, example = json!({
            "message": "Returned 10 minutes late",
            "data": {},
            "lateMinutes": 10
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 404, description = "Break request not found"),
        (status = 409, description = "Already returned")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Breaks"
)]
pub async fn return_from_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;
    let request_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let request = find_request(&mut tx, request_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Break request not found"))?;

    if request.status != BreakStatus::Requested.as_ref() {
        return Err(ApiError::conflict("Already returned from this break"));
    }

    let kind = BreakKind::from_str(&request.kind).map_err(|_| {
        tracing::error!(request_id, kind = %request.kind, "Unknown break kind in database");
        ApiError::Internal
    })?;

    let now = time::now();
    let late_minutes = minutes_late(request.expected_return, now);
    let status = BreakStatus::from_minutes_late(late_minutes);

    let result = sqlx::query(
        r#"
        UPDATE break_requests
        SET actual_return = ?, status = ?, late_minutes = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(now)
    .bind(status.as_ref())
    .bind(late_minutes)
    .bind(request_id)
    .bind(BreakStatus::Requested.as_ref())
    .execute(&mut *tx)
    .await?;

    // A concurrent return won the row.
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Already returned from this break"));
    }

    let consequence = evaluate(kind.return_context(), late_minutes);
    append_consequence(&mut tx, user_id, &consequence).await?;

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::BreakReturn,
        &format!("Returned from {} at {}", kind, now.format("%H:%M")),
        Some(json!({ "requestId": request_id, "lateMinutes": late_minutes })),
    )
    .await?;

    let data = find_request(&mut tx, request_id, user_id)
        .await?
        .ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, request_id, late_minutes, "Returned from break");

    let message = if late_minutes == 0 {
        "Returned on time".to_string()
    } else {
        format!("Returned {} minutes late", late_minutes)
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "data": data,
        "lateMinutes": late_minutes
    })))
}

/// Recent break requests of a user
#[utoipa::path(
    get,
    path = "/api/breaks/history/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Newest first", body = [BreakRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Breaks"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let requests = sqlx::query_as::<_, BreakRequest>(
        r#"
        SELECT id, user_id, kind, reason, start_time, expected_return,
               actual_return, status, late_minutes
        FROM break_requests
        WHERE user_id = ?
        ORDER BY start_time DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(requests))
}

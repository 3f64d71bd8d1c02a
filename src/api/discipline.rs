use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::notification::Notification;
use crate::model::warning::Warning;
use crate::utils::time;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::ToSchema;

const NOTIFICATION_LIMIT: u32 = 100;

const NOTIFICATION_COLUMNS: &str =
    "SELECT id, user_id, title, message, kind, created_at, acknowledged_at FROM notifications";

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarningSummary {
    pub data: Vec<Warning>,
    /// Sum of warning tiers
    #[schema(example = 3)]
    pub total_count: i64,
}

/// Warnings issued to a user
#[utoipa::path(
    get,
    path = "/api/warnings/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Warnings, newest first", body = WarningSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Discipline"
)]
pub async fn warnings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let data = sqlx::query_as::<_, Warning>(
        r#"
        SELECT id, user_id, category, reason, count, created_at
        FROM warnings
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool.get_ref())
    .await?;

    let total_count: i64 = sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(count), 0) AS SIGNED) FROM warnings WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(WarningSummary { data, total_count }))
}

/// Notifications addressed to a user
#[utoipa::path(
    get,
    path = "/api/notifications/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Newest first", body = [Notification]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Discipline"
)]
pub async fn notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let data = sqlx::query_as::<_, Notification>(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(user_id)
    .bind(NOTIFICATION_LIMIT)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(data))
}

async fn find_notification(conn: &mut MySqlConnection, id: u64) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!("{} WHERE id = ?", NOTIFICATION_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Acknowledge a notification
#[utoipa::path(
    post,
    path = "/api/notifications/{notification_id}/ack",
    params(
        ("notification_id" = u64, Path, description = "Notification id")
    ),
    responses(
        (status = 200, description = "Acknowledged; repeating keeps the first time", body = Notification),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Notification not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Discipline"
)]
pub async fn acknowledge_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let notification_id = path.into_inner();
    let mut conn = pool.acquire().await?;

    let notification = find_notification(&mut conn, notification_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    auth.require_access_to(notification.user_id)?;

    if notification.acknowledged_at.is_some() {
        return Ok(HttpResponse::Ok().json(notification));
    }

    sqlx::query(
        "UPDATE notifications SET acknowledged_at = ? WHERE id = ? AND acknowledged_at IS NULL",
    )
    .bind(time::now())
    .bind(notification_id)
    .execute(&mut *conn)
    .await?;

    let notification = find_notification(&mut conn, notification_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(notification_id, by = auth.user_id, "Notification acknowledged");

    Ok(HttpResponse::Ok().json(notification))
}

use crate::auth::auth::AuthUser;
use crate::error::{ApiError, is_duplicate_key};
use crate::model::activity::ActivityKind;
use crate::model::focus_session::{FocusSession, elapsed_seconds};
use crate::utils::db_utils::log_activity;
use crate::utils::time;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::ToSchema;

const HISTORY_LIMIT: u32 = 50;

const SESSION_COLUMNS: &str =
    "SELECT id, user_id, started_at, ended_at, duration_seconds, metadata FROM focus_sessions";

#[derive(Debug, Deserialize, ToSchema)]
pub struct FocusStartReq {
    /// Free-form details kept with the session
    #[schema(value_type = Option<Object>, example = json!({ "subject": "math" }))]
    pub meta: Option<Value>,
}

async fn find_session(conn: &mut MySqlConnection, id: u64) -> Result<Option<FocusSession>, sqlx::Error> {
    sqlx::query_as::<_, FocusSession>(&format!("{} WHERE id = ?", SESSION_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Start a focus session
#[utoipa::path(
    post,
    path = "/api/focus/start",
    request_body(content = FocusStartReq, description = "Optional"),
    responses(
        (status = 201, description = "Session started", body = Object, example = json!({
            "message": "Focus session started",
            "data": {}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 409, description = "A session is already running")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Focus"
)]
pub async fn start_focus(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: Option<web::Json<FocusStartReq>>,
) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;
    let meta = payload.and_then(|p| p.into_inner().meta);
    let now = time::now();

    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        "INSERT INTO focus_sessions (user_id, started_at, metadata) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(now)
    .bind(meta.map(Json))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            ApiError::conflict("A focus session is already running")
        } else {
            ApiError::from(e)
        }
    })?
    .last_insert_id();

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::FocusStart,
        &format!("Focus started at {}", now.format("%H:%M")),
        Some(json!({ "focusSessionId": id })),
    )
    .await?;

    let data = find_session(&mut tx, id).await?.ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, login_id = %auth.login_id, focus_session_id = id, "Focus session started");

    Ok(HttpResponse::Created().json(json!({
        "message": "Focus session started",
        "data": data
    })))
}

/// Stop the running focus session
#[utoipa::path(
    post,
    path = "/api/focus/stop",
    responses(
        (status = 200, description = "Session stopped", body = Object, example = json!({
            "message": "Focused for 50 minutes",
            "data": {},
            "durationSeconds": 3000
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 404, description = "No running session")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Focus"
)]
pub async fn stop_focus(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    auth.require_student()?;
    let user_id = auth.user_id;

    let mut tx = pool.begin().await?;

    let running = sqlx::query_as::<_, FocusSession>(&format!(
        "{} WHERE user_id = ? AND ended_at IS NULL FOR UPDATE",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("No running focus session"))?;

    let now = time::now();
    let duration_seconds = elapsed_seconds(running.started_at, now);

    let result = sqlx::query(
        r#"
        UPDATE focus_sessions
        SET ended_at = ?, duration_seconds = ?
        WHERE id = ?
        AND ended_at IS NULL
        "#,
    )
    .bind(now)
    .bind(duration_seconds)
    .bind(running.id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("No running focus session"));
    }

    log_activity(
        &mut tx,
        user_id,
        ActivityKind::FocusStop,
        &format!("Focus stopped after {} seconds", duration_seconds),
        Some(json!({ "focusSessionId": running.id, "durationSeconds": duration_seconds })),
    )
    .await?;

    let data = find_session(&mut tx, running.id).await?.ok_or(ApiError::Internal)?;

    tx.commit().await?;

    info!(user_id, focus_session_id = running.id, duration_seconds, "Focus session stopped");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Focused for {} minutes", duration_seconds / 60),
        "data": data,
        "durationSeconds": duration_seconds
    })))
}

/// Recent focus sessions of a user
#[utoipa::path(
    get,
    path = "/api/focus/history/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Newest first", body = [FocusSession]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Focus"
)]
pub async fn focus_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    let sessions = sqlx::query_as::<_, FocusSession>(&format!(
        "{} WHERE user_id = ? ORDER BY started_at DESC, id DESC LIMIT ?",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::test_support;
    use actix_web::{App, http::StatusCode, test};

    fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/start", web::post().to(start_focus))
            .route("/stop", web::post().to(stop_focus))
            .route("/history/{user_id}", web::get().to(focus_history));
    }

    #[actix_web::test]
    async fn only_students_run_sessions() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::config()))
                .app_data(web::Data::new(test_support::lazy_pool()))
                .configure(routes),
        )
        .await;

        for (uri, token) in [
            ("/start", test_support::bearer(1, Role::Admin, None)),
            ("/stop", test_support::bearer(2, Role::Parent, Some(5))),
        ] {
            let req = test::TestRequest::post()
                .uri(uri)
                .insert_header(("Authorization", token))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN, "{}", uri);
        }

        let req = test::TestRequest::get()
            .uri("/history/6")
            .insert_header(("Authorization", test_support::bearer(5, Role::Student, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn start_stop_records_duration() {
        let Some(pool) = test_support::db_pool().await else {
            return;
        };
        let student = test_support::create_student(&pool, None).await;
        let parent = test_support::create_user(&pool, Role::Parent, Some(student)).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::config()))
                .app_data(web::Data::new(pool.clone()))
                .configure(routes),
        )
        .await;
        let token = test_support::bearer(student, Role::Student, None);

        let stop = || {
            test::TestRequest::post()
                .uri("/stop")
                .insert_header(("Authorization", token.clone()))
                .to_request()
        };
        assert_eq!(test::call_service(&app, stop()).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/start")
            .insert_header(("Authorization", token.clone()))
            .set_json(json!({ "meta": { "subject": "math" } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["metadata"]["subject"], "math");
        assert!(body["data"]["ended_at"].is_null());

        // Starting again while one runs is refused; no body is fine.
        let req = test::TestRequest::post()
            .uri("/start")
            .insert_header(("Authorization", token.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        // Backdate the start so the duration is measurable.
        sqlx::query("UPDATE focus_sessions SET started_at = ? WHERE user_id = ? AND ended_at IS NULL")
            .bind(time::now() - chrono::Duration::minutes(25))
            .bind(student)
            .execute(&pool)
            .await
            .unwrap();

        let body: serde_json::Value = test::call_and_read_body_json(&app, stop()).await;
        let seconds = body["durationSeconds"].as_u64().unwrap();
        assert!((25 * 60..26 * 60).contains(&seconds), "{}", seconds);
        assert_eq!(body["data"]["duration_seconds"].as_u64(), Some(seconds));

        assert_eq!(test::call_service(&app, stop()).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&format!("/history/{}", student))
            .insert_header(("Authorization", test_support::bearer(parent, Role::Parent, Some(student))))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(test_support::count(&pool, "activities", student).await, 2);
    }
}

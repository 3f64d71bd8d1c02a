use crate::auth::auth::AuthUser;
use crate::auth::credentials::AccountKind;
use crate::auth::handlers::{insert_user_row, is_login_id_available, remember_login_id};
use crate::error::{ApiError, is_duplicate_key};
use crate::lateness::parse_schedule;
use crate::model::role::Role;
use crate::model::student::Student;
use crate::utils::db_utils::{build_student_info_update, execute_update};
use crate::utils::phone;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const STUDENT_SELECT: &str = r#"
    SELECT u.id, u.login_id, u.name, s.student_no, s.grade, s.class_name,
           s.phone, s.parent_phone, s.address,
           s.scheduled_in_time, s.scheduled_out_time
    FROM users u
    JOIN student_info s ON s.user_id = u.id
"#;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentReq {
    /// Also the login username; Hangul names map to a keyboard login id
    #[schema(example = "홍길동")]
    pub name: String,
    pub password: String,
    #[schema(example = "2025-0001")]
    pub student_no: String,
    pub grade: Option<String>,
    pub class_name: Option<String>,
    #[schema(example = "010-1234-5678")]
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "09:00")]
    pub scheduled_in_time: Option<String>,
    #[schema(example = "22:00")]
    pub scheduled_out_time: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyChildReq {
    #[schema(example = "홍길동")]
    pub name: String,
    #[schema(example = "010-1234-5678")]
    pub phone: String,
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn optional_phone(value: &Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match optional_text(value) {
        Some(raw) if phone::is_valid(&raw) => Ok(Some(phone::normalize(&raw))),
        Some(_) => Err(ApiError::bad_request(format!("Invalid {}", field))),
        None => Ok(None),
    }
}

fn optional_schedule(value: &Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match optional_text(value) {
        Some(raw) => parse_schedule(&raw)
            .map(|t| Some(t.format("%H:%M").to_string()))
            .ok_or_else(|| ApiError::bad_request(format!("{} must be HH:MM", field))),
        None => Ok(None),
    }
}

async fn find_student(pool: &MySqlPool, user_id: u64) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("{} WHERE u.id = ?", STUDENT_SELECT))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Register a student (admin)
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudentReq,
    responses(
        (status = 201, description = "Student registered", body = Student),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Login id or student number already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Students"
)]
pub async fn create_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateStudentReq>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let name = payload.name.trim();
    let student_no = payload.student_no.trim();
    if name.is_empty() || student_no.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("name, password and studentNo are required"));
    }

    let student_phone = optional_phone(&payload.phone, "phone")?;
    let parent_phone = optional_phone(&payload.parent_phone, "parentPhone")?;
    let scheduled_in = optional_schedule(&payload.scheduled_in_time, "scheduledInTime")?;
    let scheduled_out = optional_schedule(&payload.scheduled_out_time, "scheduledOutTime")?;

    let login_id = AccountKind::Student.login_id(name);
    if !is_login_id_available(&login_id, pool.get_ref()).await {
        return Err(ApiError::conflict("A student with this name already exists"));
    }

    let mut tx = pool.begin().await?;

    let user_id = insert_user_row(
        &mut tx,
        &login_id,
        &payload.password,
        name,
        Role::Student,
        student_phone.as_deref(),
        None,
    )
    .await?;

    sqlx::query(
        r#"
        INSERT INTO student_info
            (user_id, student_no, grade, class_name, phone, parent_phone,
             address, scheduled_in_time, scheduled_out_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(student_no)
    .bind(optional_text(&payload.grade))
    .bind(optional_text(&payload.class_name))
    .bind(&student_phone)
    .bind(&parent_phone)
    .bind(optional_text(&payload.address))
    .bind(&scheduled_in)
    .bind(&scheduled_out)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            ApiError::conflict("Student number already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    tx.commit().await?;

    remember_login_id(&login_id).await;

    info!(user_id, %login_id, admin_id = auth.user_id, "Student registered");

    let student = find_student(pool.get_ref(), user_id)
        .await?
        .ok_or(ApiError::Internal)?;

    Ok(HttpResponse::Created().json(student))
}

/// List students (admin)
#[utoipa::path(
    get,
    path = "/api/students",
    responses(
        (status = 200, description = "All students, newest first", body = [Student]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Students"
)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let students = sqlx::query_as::<_, Student>(&format!(
        "{} ORDER BY u.created_at DESC, u.id DESC",
        STUDENT_SELECT
    ))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(students))
}

/// Student detail
#[utoipa::path(
    get,
    path = "/api/students/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Students"
)]
pub async fn get_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_access_to(user_id)?;

    match find_student(pool.get_ref(), user_id).await? {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => Err(ApiError::not_found("Student not found")),
    }
}

/// Update student info (admin)
#[utoipa::path(
    put,
    path = "/api/students/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Student user id")
    ),
    request_body(
        content = Object,
        description = "Any of grade, class_name, phone, parent_phone, address, scheduled_in_time, scheduled_out_time",
        example = json!({ "scheduled_in_time": "08:30", "grade": "3" })
    ),
    responses(
        (status = 200, description = "Updated student", body = Student),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Student not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Students"
)]
pub async fn update_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    let update = build_student_info_update(&payload, user_id)?;
    execute_update(pool.get_ref(), update).await?;

    // rows_affected is 0 for unchanged values too, so existence is checked by reading back
    match find_student(pool.get_ref(), user_id).await? {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => Err(ApiError::not_found("Student not found")),
    }
}

/// Find a student by name and phone before parent sign-up
#[utoipa::path(
    post,
    path = "/auth/verify-child",
    request_body = VerifyChildReq,
    responses(
        (status = 200, description = "Student found", body = Object, example = json!({
            "ok": true,
            "studentId": 12,
            "message": "Student verified",
            "student": { "name": "홍길동", "grade": "2" }
        })),
        (status = 400, description = "Missing name or phone"),
        (status = 404, description = "No matching student")
    ),
    tag = "Auth"
)]
pub async fn verify_child(
    pool: web::Data<MySqlPool>,
    payload: web::Json<VerifyChildReq>,
) -> Result<HttpResponse, ApiError> {
    let name = payload.name.trim();
    if name.chars().count() < 2 {
        return Err(ApiError::bad_request("Enter the student's full name"));
    }

    let phone = phone::normalize(&payload.phone);
    if phone.is_empty() {
        return Err(ApiError::bad_request("Enter the student's phone number"));
    }

    let found = sqlx::query_as::<_, (u64, String, Option<String>)>(
        r#"
        SELECT u.id, u.name, s.grade
        FROM users u
        JOIN student_info s ON s.user_id = u.id
        WHERE u.name = ?
        AND u.role_id = ?
        AND (s.phone = ? OR u.phone = ?)
        LIMIT 1
        "#,
    )
    .bind(name)
    .bind(Role::Student.id())
    .bind(&phone)
    .bind(&phone)
    .fetch_optional(pool.get_ref())
    .await?;

    let Some((student_id, student_name, grade)) = found else {
        return Err(ApiError::not_found(
            "No student matches this name and phone. Register the student first.",
        ));
    };

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "studentId": student_id,
        "message": "Student verified",
        "student": {
            "name": student_name,
            "grade": grade
        }
    })))
}

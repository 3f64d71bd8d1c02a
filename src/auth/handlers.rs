use crate::{
    auth::{
        credentials::AccountKind,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, is_duplicate_key},
    model::{activity::ActivityKind, role::Role},
    models::{CheckUsernameReq, Claims, LoginReqDto, RegisterReq, TokenType},
    utils::{
        db_utils::log_activity, phone, username_cache, username_filter,
        verification_store::VerificationStore,
    },
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

const MIN_PASSWORD_LEN: usize = 8;

/// true  => login id AVAILABLE
/// false => login id TAKEN
pub async fn is_login_id_available(login_id: &str, pool: &MySqlPool) -> bool {
    let login_id = login_id.trim();

    // 1️⃣ Cuckoo filter: fast negative
    if !username_filter::might_exist(login_id) {
        return true;
    }

    // 2️⃣ Moka cache: fast positive
    if username_cache::is_taken(login_id).await {
        return false;
    }

    // 3️⃣ Database fallback
    match sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE login_id = ? LIMIT 1)",
    )
    .bind(login_id)
    .fetch_one(pool)
    .await
    {
        Ok(true) => {
            username_cache::mark_taken(login_id).await;
            false
        }
        Ok(false) => true,
        Err(e) => {
            // fail-safe: report taken
            error!(error = %e, "Login id lookup failed");
            false
        }
    }
}

/// Inserts a user row plus its SIGNUP activity on an open connection or
/// transaction. Duplicate login ids map to 409.
pub async fn insert_user_row(
    conn: &mut MySqlConnection,
    login_id: &str,
    password: &str,
    name: &str,
    role: Role,
    phone: Option<&str>,
    linked_user_id: Option<u64>,
) -> Result<u64, ApiError> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (login_id, password, name, role_id, phone, linked_user_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(login_id)
    .bind(hashed)
    .bind(name)
    .bind(role.id())
    .bind(phone)
    .bind(linked_user_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            ApiError::conflict("Username already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let user_id = result.last_insert_id();

    log_activity(
        conn,
        user_id,
        ActivityKind::Signup,
        &format!("{} ({:?}) registered", name, role),
        None,
    )
    .await?;

    Ok(user_id)
}

/// Records a freshly committed login id in the availability filter and cache.
pub async fn remember_login_id(login_id: &str) {
    username_filter::insert(login_id);
    username_cache::mark_taken(login_id).await;
}

async fn insert_user(
    pool: &MySqlPool,
    login_id: &str,
    password: &str,
    name: &str,
    role: Role,
    phone: Option<&str>,
    linked_user_id: Option<u64>,
) -> Result<u64, ApiError> {
    let mut tx = pool.begin().await?;
    let user_id =
        insert_user_row(&mut tx, login_id, password, name, role, phone, linked_user_id).await?;
    tx.commit().await?;

    remember_login_id(login_id).await;

    Ok(user_id)
}

#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub available: bool,
    #[schema(example = "ghdrlfehd@students.local")]
    pub login_id: String,
}

#[utoipa::path(
    post,
    path = "/auth/check-username",
    request_body = CheckUsernameReq,
    responses(
        (status = 200, description = "Availability of the derived login id", body = AvailabilityResponse),
        (status = 400, description = "Empty username")
    ),
    tag = "Auth"
)]
pub async fn check_username(
    payload: web::Json<CheckUsernameReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::bad_request("Username must not be empty"));
    }

    let login_id = payload.kind.login_id(&payload.username);
    let available = is_login_id_available(&login_id, pool.get_ref()).await;

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        available,
        login_id,
    }))
}

async fn register(
    kind: AccountKind,
    payload: RegisterReq,
    pool: &MySqlPool,
    store: &dyn VerificationStore,
) -> Result<HttpResponse, ApiError> {
    if !kind.self_registration() {
        return Err(ApiError::forbidden("Students are registered by an administrator"));
    }

    let username = payload.username.trim();
    let name = payload.name.trim();

    if username.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request("Username and name must not be empty"));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if !phone::is_valid(&payload.phone) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }
    let phone = phone::normalize(&payload.phone);

    let login_id = kind.login_id(username);
    if !is_login_id_available(&login_id, pool).await {
        return Err(ApiError::conflict("Username already taken"));
    }

    let linked_user_id = match (kind, payload.student_user_id) {
        (AccountKind::Parent, Some(student_id)) => {
            let is_student = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND role_id = ?)",
            )
            .bind(student_id)
            .bind(Role::Student.id())
            .fetch_one(pool)
            .await?;

            if !is_student {
                return Err(ApiError::bad_request("Linked student not found"));
            }
            Some(student_id)
        }
        (_, Some(_)) => {
            return Err(ApiError::bad_request("Only parents can link a student"));
        }
        (_, None) => None,
    };

    if !store.is_verified(&phone).await {
        return Err(ApiError::bad_request("Phone number has not been verified"));
    }

    let user_id = insert_user(
        pool,
        &login_id,
        &payload.password,
        name,
        kind.role(),
        Some(&phone),
        linked_user_id,
    )
    .await?;

    // Only a committed account uses up the verification.
    store.take_verified(&phone).await;

    info!(user_id, ?kind, "Account registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Registration complete",
        "userId": user_id
    })))
}

#[utoipa::path(
    post,
    path = "/auth/register/admin",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Admin registered", body = Object, example = json!({
            "success": true, "message": "Registration complete", "userId": 1
        })),
        (status = 400, description = "Validation failed or phone not verified"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
pub async fn register_admin(
    payload: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn VerificationStore>,
) -> Result<HttpResponse, ApiError> {
    register(AccountKind::Admin, payload.into_inner(), pool.get_ref(), store.get_ref()).await
}

#[utoipa::path(
    post,
    path = "/auth/register/parent",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Parent registered", body = Object, example = json!({
            "success": true, "message": "Registration complete", "userId": 2
        })),
        (status = 400, description = "Validation failed or phone not verified"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
pub async fn register_parent(
    payload: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn VerificationStore>,
) -> Result<HttpResponse, ApiError> {
    register(AccountKind::Parent, payload.into_inner(), pool.get_ref(), store.get_ref()).await
}

#[derive(Serialize, ToSchema)]
pub struct LoginUser {
    pub id: u64,
    pub name: String,
    #[schema(value_type = String, example = "student")]
    pub role: Role,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: LoginUser,
}

fn issue_tokens(
    user_id: u64,
    login_id: &str,
    role: u8,
    linked_user_id: Option<u64>,
    config: &Config,
) -> Result<(String, String, Claims), ApiError> {
    let to_internal = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, "Token generation failed");
        ApiError::Internal
    };

    let access_token = generate_access_token(
        user_id,
        login_id.to_string(),
        role,
        linked_user_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(to_internal)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        login_id.to_string(),
        role,
        linked_user_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(to_internal)?;

    Ok((access_token, refresh_token, refresh_claims))
}

async fn store_refresh_token(pool: &MySqlPool, user_id: u64, claims: &Claims) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username, kind = ?user.kind)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::bad_request("Username or password required"));
    }

    // 2️⃣ Resolve the account for this kind
    let db_user = match user.kind.find(pool.get_ref(), &user.username).await? {
        Some(found) => {
            debug!(user_id = found.id, "User found");
            found
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    // 4️⃣ Tokens
    let (access_token, refresh_token, refresh_claims) = issue_tokens(
        db_user.id,
        &db_user.login_id,
        db_user.role_id,
        db_user.linked_user_id,
        &config,
    )?;

    // 5️⃣ Store refresh token
    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims).await?;

    // 6️⃣ Bookkeeping (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    match pool.acquire().await {
        Ok(mut conn) => {
            if let Err(e) = log_activity(
                &mut conn,
                db_user.id,
                ActivityKind::Login,
                &format!("{} logged in", db_user.name),
                None,
            )
            .await
            {
                warn!(error = %e, "Failed to log login activity");
            }
        }
        Err(e) => warn!(error = %e, "Failed to log login activity"),
    }

    let role = Role::from_id(db_user.role_id).ok_or_else(|| {
        error!(role_id = db_user.role_id, "Stored user has an unknown role");
        ApiError::Internal
    })?;

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        user: LoginUser {
            id: db_user.id,
            name: db_user.name,
            role,
        },
    }))
}

fn bearer_claims(req: &HttpRequest, secret: &str) -> Option<Claims> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))?;

    verify_token(token, secret)
        .ok()
        .filter(|claims| claims.token_type == TokenType::Refresh)
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = Object, example = json!({
            "access_token": "eyJ...", "refresh_token": "eyJ..."
        })),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let claims = bearer_claims(&req, &config.jwt_secret)
        .ok_or_else(|| ApiError::unauthorized("Refresh token required"))?;

    // 🔥 revoke the presented token; only an unrevoked, unexpired one rotates
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ?
        AND revoked = FALSE
        AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        return Err(ApiError::unauthorized("Refresh token revoked or unknown"));
    }

    // Role and child link may have changed since the old pair was issued.
    let (login_id, role_id, linked_user_id) = sqlx::query_as::<_, (String, u8, Option<u64>)>(
        "SELECT login_id, role_id, linked_user_id FROM users WHERE id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    // 🔄 new pair
    let (access_token, new_refresh_token, new_claims) =
        issue_tokens(claims.user_id, &login_id, role_id, linked_user_id, &config)?;

    store_refresh_token(pool.get_ref(), claims.user_id, &new_claims).await?;

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    // only refresh tokens can logout; anything else is a no-op
    let Some(claims) = bearer_claims(&req, &config.jwt_secret) else {
        return HttpResponse::NoContent().finish();
    };

    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await;

    match revoked {
        Ok(_) => {
            if let Ok(mut conn) = pool.acquire().await {
                if let Err(e) = log_activity(
                    &mut conn,
                    claims.user_id,
                    ActivityKind::Logout,
                    "User logged out",
                    None,
                )
                .await
                {
                    warn!(error = %e, "Failed to log logout activity");
                }
            }
        }
        Err(e) => error!(error = %e, "Failed to revoke refresh token"),
    }

    // success even if the token didn't exist
    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::utils::verification_store::VerifyOutcome;
    use actix_web::{App, http::StatusCode, test};

    fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh_token))
            .route("/logout", web::post().to(logout))
            .route("/register/admin", web::post().to(register_admin))
            .route("/register/parent", web::post().to(register_parent));
    }

    #[actix_web::test]
    async fn tense_consonant_name_is_not_blocked_by_plain_one() {
        let plain = AccountKind::Student.login_id("가치확인");
        let tense = AccountKind::Student.login_id("까치확인");
        remember_login_id(&plain).await;

        // The filter rules the tense id out before any query runs.
        assert!(is_login_id_available(&tense, &test_support::lazy_pool()).await);
        assert!(!is_login_id_available(&plain, &test_support::lazy_pool()).await);
    }

    #[actix_web::test]
    async fn failed_insert_keeps_phone_verified() {
        let store = test_support::verification_store();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::config()))
                .app_data(web::Data::new(test_support::lazy_pool()))
                .app_data(store.clone())
                .configure(routes),
        )
        .await;

        store.issue("01077776666", "123456").await;
        assert_eq!(store.verify("01077776666", "123456").await, VerifyOutcome::Verified);

        // The pool cannot connect, so the insert fails after verification passed.
        let req = test::TestRequest::post()
            .uri("/register/admin")
            .set_json(json!({
                "username": format!("admin-{}", uuid::Uuid::new_v4().to_simple()),
                "password": "password123",
                "name": "Admin",
                "phone": "010-7777-6666"
            }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        assert!(store.is_verified("01077776666").await);
    }

    #[actix_web::test]
    async fn validation_happens_before_lookups() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::config()))
                .app_data(web::Data::new(test_support::lazy_pool()))
                .app_data(test_support::verification_store())
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": " ", "password": "x", "kind": "admin" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        for body in [
            json!({ "username": "admin01", "password": "short", "name": "Kim", "phone": "01012345678" }),
            json!({ "username": "admin01", "password": "long enough", "name": "Kim", "phone": "12345" }),
            json!({ "username": "admin01", "password": "long enough", "name": "Kim", "phone": "01012345678", "studentUserId": 3 }),
        ] {
            let req = test::TestRequest::post()
                .uri("/register/admin")
                .set_json(&body)
                .to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::BAD_REQUEST,
                "{}",
                body
            );
        }

        let req = test::TestRequest::post().uri("/refresh").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        // An access token is not a refresh token.
        let req = test::TestRequest::post()
            .uri("/refresh")
            .insert_header(("Authorization", test_support::bearer(1, Role::Admin, None)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post().uri("/logout").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn registration_requires_verified_phone_then_tokens_rotate() {
        let Some(pool) = test_support::db_pool().await else {
            return;
        };
        let store = test_support::verification_store();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::config()))
                .app_data(web::Data::new(pool.clone()))
                .app_data(store.clone())
                .configure(routes),
        )
        .await;

        let username = format!("parent-{}", uuid::Uuid::new_v4().to_simple());
        let register = || {
            test::TestRequest::post()
                .uri("/register/parent")
                .set_json(json!({
                    "username": username,
                    "password": "password123",
                    "name": "Parent",
                    "phone": "010-5555-0000"
                }))
                .to_request()
        };

        assert_eq!(test::call_service(&app, register()).await.status(), StatusCode::BAD_REQUEST);

        store.issue("01055550000", "123456").await;
        assert_eq!(store.verify("01055550000", "123456").await, VerifyOutcome::Verified);
        assert_eq!(test::call_service(&app, register()).await.status(), StatusCode::CREATED);

        // The verified mark is single-use and the login id is now taken.
        store.issue("01055550000", "654321").await;
        store.verify("01055550000", "654321").await;
        assert_eq!(test::call_service(&app, register()).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": username, "password": "wrong-password", "kind": "parent" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        // Right password, wrong kind.
        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": username, "password": "password123", "kind": "admin" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "username": username, "password": "password123", "kind": "parent" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["user"]["role"], "parent");
        let refresh = body["refresh_token"].as_str().unwrap().to_string();

        let rotate = |token: &str| {
            test::TestRequest::post()
                .uri("/refresh")
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .to_request()
        };
        // Linking a child after login shows up in the next rotated pair.
        let student_id = test_support::create_user(&pool, Role::Student, None).await;
        sqlx::query("UPDATE users SET linked_user_id = ? WHERE id = ?")
            .bind(student_id)
            .bind(body["user"]["id"].as_u64().unwrap())
            .execute(&pool)
            .await
            .unwrap();

        let resp = test::call_service(&app, rotate(&refresh)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let rotated: serde_json::Value = test::read_body_json(resp).await;
        let access = verify_token(rotated["access_token"].as_str().unwrap(), test_support::SECRET).unwrap();
        assert_eq!(access.linked_user_id, Some(student_id));
        assert_eq!(access.role, Role::Parent.id());

        assert_eq!(
            test::call_service(&app, rotate(&refresh)).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}

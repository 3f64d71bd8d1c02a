use crate::{
    api::{attendance, breaks, discipline, focus, students},
    auth::{handlers, middleware::auth_middleware, verification},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let sms_limiter = Arc::new(build_limiter(config.rate_sms_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/check-username")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::check_username)),
            )
            // /auth/register/{admin,parent}
            .service(
                web::scope("/register")
                    .wrap(register_limiter.clone())
                    .route("/admin", web::post().to(handlers::register_admin))
                    .route("/parent", web::post().to(handlers::register_parent)),
            )
            // /auth/sms/{send,verify}
            .service(
                web::scope("/sms")
                    .wrap(sms_limiter.clone())
                    .route("/send", web::post().to(verification::send_code))
                    .route("/verify", web::post().to(verification::verify_code)),
            )
            .service(
                web::resource("/verify-child")
                    .wrap(sms_limiter)
                    .route(web::post().to(students::verify_child)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .route("/checkin", web::post().to(attendance::check_in))
                    .route("/checkout", web::post().to(attendance::check_out))
                    .route("/status/{user_id}", web::get().to(attendance::today_status))
                    .route("/monthly/{user_id}", web::get().to(attendance::monthly)),
            )
            .service(
                web::scope("/breaks")
                    .route("/request", web::post().to(breaks::request_break))
                    .route("/return/{request_id}", web::post().to(breaks::return_from_break))
                    .route("/history/{user_id}", web::get().to(breaks::history)),
            )
            .service(
                web::scope("/focus")
                    .route("/start", web::post().to(focus::start_focus))
                    .route("/stop", web::post().to(focus::stop_focus))
                    .route("/history/{user_id}", web::get().to(focus::focus_history)),
            )
            .route("/warnings/{user_id}", web::get().to(discipline::warnings))
            .route("/notifications/{user_id}", web::get().to(discipline::notifications))
            .route(
                "/notifications/{notification_id}/ack",
                web::post().to(discipline::acknowledge_notification),
            )
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::post().to(students::create_student))
                            .route(web::get().to(students::list_students)),
                    )
                    // /students/{user_id}
                    .service(
                        web::resource("/{user_id}")
                            .route(web::get().to(students::get_student))
                            .route(web::put().to(students::update_student)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ rotates the pair; the old refresh token is revoked

use crate::api::attendance::CheckInResponse;
use crate::api::breaks::BreakRequestReq;
use crate::api::discipline::WarningSummary;
use crate::api::focus::FocusStartReq;
use crate::api::students::{CreateStudentReq, VerifyChildReq};
use crate::auth::credentials::AccountKind;
use crate::auth::handlers::{AvailabilityResponse, LoginResponse, LoginUser};
use crate::model::attendance::AttendanceRecord;
use crate::model::break_request::BreakRequest;
use crate::model::focus_session::FocusSession;
use crate::model::notification::Notification;
use crate::model::student::Student;
use crate::model::warning::Warning;
use crate::models::{CheckUsernameReq, LoginReqDto, RegisterReq, SendCodeReq, VerifyCodeReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Study Hall API",
        version = "1.0.0",
        description = r#"
## Study Hall Attendance & Supervision

Backend for a study hall: administrators register students, students check in
and out and take breaks, parents follow their child.

### 🔹 Key Features
- **Attendance**
  - Timestamped check-in/check-out against each student's scheduled time
- **Breaks**
  - Outing and sleep requests with expected return times
- **Focus**
  - Timed study sessions, one running at a time
- **Discipline**
  - Late arrivals and late outing returns issue cautions (1, or 2 at 30+ minutes)
  - Late sleep returns send a reminder notification
  - Notifications can be acknowledged by the student, a parent or an admin
- **Accounts**
  - Admin, parent and student logins; SMS phone verification for sign-up

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token.
Admins see every student, students themselves, parents their linked child.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::check_username,
        crate::auth::handlers::register_admin,
        crate::auth::handlers::register_parent,
        crate::auth::verification::send_code,
        crate::auth::verification::verify_code,
        crate::api::students::verify_child,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today_status,
        crate::api::attendance::monthly,

        crate::api::breaks::request_break,
        crate::api::breaks::return_from_break,
        crate::api::breaks::history,

        crate::api::discipline::warnings,
        crate::api::discipline::notifications,
        crate::api::discipline::acknowledge_notification,

        crate::api::focus::start_focus,
        crate::api::focus::stop_focus,
        crate::api::focus::focus_history,

        crate::api::students::create_student,
        crate::api::students::list_students,
        crate::api::students::get_student,
        crate::api::students::update_student
    ),
    components(
        schemas(
            AccountKind,
            LoginReqDto,
            LoginResponse,
            LoginUser,
            RegisterReq,
            CheckUsernameReq,
            AvailabilityResponse,
            SendCodeReq,
            VerifyCodeReq,
            VerifyChildReq,
            CheckInResponse,
            AttendanceRecord,
            BreakRequestReq,
            BreakRequest,
            FocusStartReq,
            FocusSession,
            WarningSummary,
            Warning,
            Notification,
            CreateStudentReq,
            Student
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, tokens, sign-up and phone verification"),
        (name = "Attendance", description = "Daily check-in and check-out"),
        (name = "Breaks", description = "Outing and sleep breaks"),
        (name = "Focus", description = "Focus sessions"),
        (name = "Discipline", description = "Warnings and notifications"),
        (name = "Students", description = "Student management"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

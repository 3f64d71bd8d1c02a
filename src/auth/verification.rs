use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::ApiError,
    models::{SendCodeReq, VerifyCodeReq},
    sms::SmsSender,
    utils::{
        phone,
        verification_store::{VerificationStore, VerifyOutcome, generate_code},
    },
};

/// Send a phone verification code
#[utoipa::path(
    post,
    path = "/auth/sms/send",
    request_body = SendCodeReq,
    responses(
        (status = 200, description = "Code sent", body = Object, example = json!({
            "success": true, "message": "Verification code sent", "expiresIn": 300
        })),
        (status = 400, description = "Invalid phone number"),
        (status = 500, description = "SMS delivery failed (production only)")
    ),
    tag = "Auth"
)]
pub async fn send_code(
    payload: web::Json<SendCodeReq>,
    store: web::Data<dyn VerificationStore>,
    sms: web::Data<dyn SmsSender>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    if !phone::is_valid(&payload.phone) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }

    let phone = phone::normalize(&payload.phone);
    let code = generate_code();
    store.issue(&phone, &code).await;

    let message = format!("[StudyHall] Verification code: {}", code);
    match sms.send(&phone, &message).await {
        Ok(()) => info!("Verification code sent"),
        Err(e) if config.environment.is_production() => {
            error!(error = %e, "Verification SMS failed");
            return Err(ApiError::Internal);
        }
        Err(e) => warn!(error = %e, environment = %config.environment, "Verification SMS failed, continuing"),
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Verification code sent",
        "expiresIn": config.otp_ttl_secs
    })))
}

/// Confirm a phone verification code
#[utoipa::path(
    post,
    path = "/auth/sms/verify",
    request_body = VerifyCodeReq,
    responses(
        (status = 200, description = "Phone verified", body = Object, example = json!({
            "success": true, "message": "Phone number verified"
        })),
        (status = 400, description = "Code expired, unknown or wrong")
    ),
    tag = "Auth"
)]
pub async fn verify_code(
    payload: web::Json<VerifyCodeReq>,
    store: web::Data<dyn VerificationStore>,
) -> Result<HttpResponse, ApiError> {
    if payload.code.trim().is_empty() {
        return Err(ApiError::bad_request("Verification code required"));
    }

    let phone = phone::normalize(&payload.phone);

    match store.verify(&phone, &payload.code).await {
        VerifyOutcome::Verified => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Phone number verified"
        }))),
        VerifyOutcome::Expired => Err(ApiError::bad_request(
            "Verification code expired or not found",
        )),
        VerifyOutcome::Mismatch => Err(ApiError::bad_request("Verification code does not match")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sms::DisabledSms;
    use crate::utils::verification_store::MokaVerificationStore;
    use actix_web::{App, http::StatusCode, test};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Captures messages instead of sending them.
    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send(&self, phone_number: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((phone_number.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn config(env: &str) -> Config {
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("mysql://localhost/studyhall".into()),
            "JWT_SECRET" => Some("secret".into()),
            "APP_ENV" => Some(env.into()),
            _ => None,
        })
        .unwrap()
    }

    fn store() -> Arc<dyn VerificationStore> {
        Arc::new(MokaVerificationStore::new(Duration::from_secs(300)))
    }

    #[actix_web::test]
    async fn sent_code_verifies_phone() {
        let sms = Arc::new(RecordingSms::default());
        let store = store();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config("development")))
                .app_data(web::Data::from(store.clone()))
                .app_data(web::Data::from(sms.clone() as Arc<dyn SmsSender>))
                .route("/send", web::post().to(send_code))
                .route("/verify", web::post().to(verify_code)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/send")
            .set_json(json!({ "phone": "010-1234-5678" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let (to, message) = sms.sent.lock().unwrap()[0].clone();
        assert_eq!(to, "01012345678");
        let code = message.rsplit(' ').next().unwrap().to_string();
        assert_eq!(code.len(), 6);

        let wrong = if code == "000000" { "111111" } else { "000000" };
        let req = test::TestRequest::post()
            .uri("/verify")
            .set_json(json!({ "phone": "01012345678", "code": wrong }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/verify")
            .set_json(json!({ "phone": "010 1234 5678", "code": code }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        assert!(store.take_verified("01012345678").await);
    }

    #[actix_web::test]
    async fn invalid_phone_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config("development")))
                .app_data(web::Data::from(store()))
                .app_data(web::Data::from(Arc::new(RecordingSms::default()) as Arc<dyn SmsSender>))
                .route("/send", web::post().to(send_code)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/send")
            .set_json(json!({ "phone": "02-123-4567" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid phone number");
    }

    #[actix_web::test]
    async fn delivery_failure_is_soft_outside_production() {
        for (env, expected) in [
            ("development", StatusCode::OK),
            ("production", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let app = test::init_service(
                App::new()
                    .app_data(web::Data::new(config(env)))
                    .app_data(web::Data::from(store()))
                    .app_data(web::Data::from(Arc::new(DisabledSms) as Arc<dyn SmsSender>))
                    .route("/send", web::post().to(send_code)),
            )
            .await;

            let req = test::TestRequest::post()
                .uri("/send")
                .set_json(json!({ "phone": "01012345678" }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected, "{}", env);
        }
    }
}

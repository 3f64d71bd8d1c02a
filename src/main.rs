use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use std::sync::Arc;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod lateness;
mod model;
mod models;
mod routes;
mod sms;
#[cfg(test)]
mod test_support;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::sms::{AligoClient, DisabledSms, SmsSender};
use crate::utils::username_cache;
use crate::utils::username_filter;
use crate::utils::verification_store::{MokaVerificationStore, VerificationStore};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health(config: Data<Config>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": config.environment.as_ref()
    }))
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
        .supports_credentials()
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }

    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

fn build_sms_sender(config: &Config) -> Arc<dyn SmsSender> {
    let Some(sms_config) = &config.sms else {
        warn!("Aligo credentials not configured, SMS delivery disabled");
        return Arc::new(DisabledSms);
    };

    // Aligo test mode accepts requests without delivering them.
    match AligoClient::new(sms_config, !config.environment.is_production()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build SMS client, SMS delivery disabled");
            Arc::new(DisabledSms)
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| std::io::Error::other(format!("{:#}", e)))?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let level = if config.environment.is_production() {
        tracing::Level::INFO
    } else {
        tracing::Level::DEBUG
    };

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(environment = %config.environment, "Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("{:#}", e)))?;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = username_filter::warmup_login_id_filter(&pool_for_filter_warmup, 100).await {
            error!(error = %e, "Failed to warm up login id filter");
        }
    });

    actix_web::rt::spawn(async move {
        // Last 30 days of sign-ups, in batches of 250
        if let Err(e) = username_cache::warmup_login_id_cache(&pool_for_cache_warmup, 30, 250).await {
            error!(error = %e, "Failed to warm up login id cache");
        }
    });

    let sms_sender = Data::from(build_sms_sender(&config));
    let verification_store: Arc<dyn VerificationStore> = Arc::new(MokaVerificationStore::new(
        Duration::from_secs(config.otp_ttl_secs),
    ));
    let verification_store = Data::from(verification_store);

    let server_addr = config.server_addr();
    let config_data = Data::new(config);
    let pool_data = Data::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(build_cors(&config_data.cors_origins))
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(sms_sender.clone())
            .app_data(verification_store.clone())
            .service(health)
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(server_addr)?
    .run()
    .await
}

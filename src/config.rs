use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Credentials for the Aligo SMS gateway. Absent when any key is missing.
#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub api_key: String,
    pub user_id: String,
    pub sender: String,
    pub endpoint: String,
    pub proxy_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub cors_origins: Vec<String>,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_sms_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub otp_ttl_secs: u64,
    pub sms: Option<SmsConfig>,
}

pub const DEFAULT_ALIGO_ENDPOINT: &str = "https://apis.aligo.in/send/";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{} must be set", key))
        };

        let sms = match (
            lookup("ALIGO_API_KEY"),
            lookup("ALIGO_USER_ID"),
            lookup("SMS_SENDER_PHONE"),
        ) {
            (Some(api_key), Some(user_id), Some(sender)) => Some(SmsConfig {
                api_key,
                user_id,
                sender,
                endpoint: lookup("ALIGO_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_ALIGO_ENDPOINT.to_string()),
                proxy_url: lookup("SMS_PROXY_URL").or_else(|| lookup("FIXIE_URL")),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            environment: parse_or(&lookup, "APP_ENV", Environment::Development)?,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or_default(),
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_sms_per_min: parse_or(&lookup, "RATE_SMS_PER_MIN", 10)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            otp_ttl_secs: parse_or(&lookup, "OTP_TTL_SECS", 300)?,
            sms,
        })
    }

    pub fn server_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "mysql://root@localhost/studyhall"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup_from(&BASE)).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.api_prefix, "/api");
        assert_eq!(cfg.otp_ttl_secs, 300);
        assert!(cfg.cors_origins.is_empty());
        assert!(cfg.sms.is_none());
    }

    #[test]
    fn missing_secret_fails() {
        let err = Config::from_lookup(lookup_from(&BASE[..1])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn recognized_options_are_read() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("CORS_ORIGINS", "http://localhost:3001, https://admin.example.com/ ,"),
            ("ALIGO_API_KEY", "k"),
            ("ALIGO_USER_ID", "u"),
            ("SMS_SENDER_PHONE", "0212345678"),
            ("FIXIE_URL", "http://proxy:80"),
        ]);
        let cfg = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.environment.is_production());
        assert_eq!(
            cfg.cors_origins,
            vec!["http://localhost:3001", "https://admin.example.com"]
        );
        let sms = cfg.sms.unwrap();
        assert_eq!(sms.endpoint, DEFAULT_ALIGO_ENDPOINT);
        assert_eq!(sms.proxy_url.as_deref(), Some("http://proxy:80"));
    }
}

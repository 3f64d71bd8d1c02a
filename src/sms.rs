use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Proxy, Url};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

use crate::config::SmsConfig;
use crate::utils::phone;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone_number: &str, message: &str) -> Result<()>;
}

/// Client for the Aligo `send` form API.
#[derive(Clone)]
pub struct AligoClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    user_id: String,
    sender: String,
    test_mode: bool,
}

impl fmt::Debug for AligoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AligoClient")
            .field("endpoint", &self.endpoint)
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct AligoResponse {
    // Aligo answers "1" or 1 depending on the endpoint version.
    result_code: Value,
    #[serde(default)]
    message: String,
}

impl AligoResponse {
    fn is_success(&self) -> bool {
        match &self.result_code {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        }
    }
}

impl AligoClient {
    /// `test_mode` asks the gateway to accept the message without delivering it.
    pub fn new(config: &SmsConfig, test_mode: bool) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).context("invalid Aligo endpoint URL")?;

        let mut builder = Client::builder().user_agent("studyhall/0.1");
        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(Proxy::all(proxy_url.as_str()).context("invalid SMS proxy URL")?);
        }
        let http = builder.build().context("failed to build SMS HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
            sender: config.sender.clone(),
            test_mode,
        })
    }

    pub fn build_request(&self, phone_number: &str, message: &str) -> Result<reqwest::Request> {
        let receiver = phone::normalize(phone_number);
        let form = [
            ("key", self.api_key.as_str()),
            ("user_id", self.user_id.as_str()),
            ("sender", self.sender.as_str()),
            ("receiver", receiver.as_str()),
            ("msg", message),
            ("testmode_yn", if self.test_mode { "Y" } else { "N" }),
        ];

        self.http
            .post(self.endpoint.clone())
            .form(&form)
            .build()
            .context("failed to build SMS request")
    }
}

#[async_trait]
impl SmsSender for AligoClient {
    async fn send(&self, phone_number: &str, message: &str) -> Result<()> {
        let request = self.build_request(phone_number, message)?;
        info!(test_mode = self.test_mode, "Sending SMS");

        let response = self
            .http
            .execute(request)
            .await
            .context("SMS gateway unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("SMS gateway returned HTTP {}", status);
        }

        let body: AligoResponse = response
            .json()
            .await
            .context("SMS gateway returned an unreadable body")?;

        if body.is_success() {
            info!("SMS sent");
            Ok(())
        } else {
            warn!(message = %body.message, "SMS gateway rejected message");
            Err(anyhow!("SMS gateway rejected message: {}", body.message))
        }
    }
}

/// Used when no gateway credentials are configured; every send fails.
pub struct DisabledSms;

#[async_trait]
impl SmsSender for DisabledSms {
    async fn send(&self, _phone_number: &str, _message: &str) -> Result<()> {
        Err(anyhow!("SMS gateway is not configured"))
    }
}

use crate::config::Settings;
use crate::notify::AlertSink;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let bot_token = settings.require_telegram_bot_token()?.to_string();
        let chat_id = settings.require_telegram_chat_id()?.to_string();
        let base_url =
            std::env::var("TELEGRAM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("TELEGRAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            base_url,
            bot_token,
            chat_id,
        })
    }
}

#[async_trait::async_trait]
impl AlertSink for TelegramNotifier {
    fn sink_name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        );

        let res = self
            .http
            .post(url)
            .json(&SendMessageRequest {
                chat_id: &self.chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await
            .context("telegram sendMessage request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("telegram HTTP {status}: {body}");
        }

        Ok(())
    }
}

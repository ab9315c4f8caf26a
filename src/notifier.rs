//! Outbound Notifications
//!
//! Delivers cycle outcomes via webhook (Discord-style embeds with a
//! Slack-compatible text fallback) and the Telegram Bot API. Delivery
//! is fire-and-forget: failures are logged as warnings and never
//! surface to the cycle that triggered them.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::types::PingResult;

/// Telegram Bot API sendMessage endpoint.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot{token}/sendMessage";

/// Discord embed colors.
const COLOR_GREEN: u32 = 5_763_719;
const COLOR_RED: u32 = 15_548_997;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends notifications about keep-alive status.
pub struct Notifier {
    webhook_url: Option<String>,
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    http: Client,
}

impl Notifier {
    /// Build a notifier from the configuration, or `None` when no
    /// channel is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.has_notifications() {
            return None;
        }
        Some(Self {
            webhook_url: config.webhook_url.clone(),
            telegram_bot_token: config.telegram_bot_token.clone(),
            telegram_chat_id: config.telegram_chat_id.clone(),
            http: Client::new(),
        })
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub fn has_telegram(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    /// Notify that every project pinged successfully.
    pub async fn send_success(&self, results: &[PingResult]) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if self.has_webhook() {
            self.send_webhook(build_success_payload(results, &timestamp))
                .await;
        }
        if self.has_telegram() {
            self.send_telegram(build_telegram_success_text(results, &timestamp))
                .await;
        }
    }

    /// Notify about failed projects. `failed_results` carries only
    /// the failures.
    pub async fn send_failure(&self, failed_results: &[PingResult]) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if self.has_webhook() {
            self.send_webhook(build_failure_payload(failed_results, &timestamp))
                .await;
        }
        if self.has_telegram() {
            self.send_telegram(build_telegram_failure_text(failed_results, &timestamp))
                .await;
        }
    }

    // ── Webhook delivery ──────────────────────────────────────────

    async fn send_webhook(&self, payload: Value) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let response = self
            .http
            .post(url)
            .json(&payload)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if matches!(resp.status().as_u16(), 200 | 204) => {
                debug!("Webhook notification sent successfully");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!("Webhook returned status {status}: {body}");
            }
            Err(e) => {
                warn!("Failed to send webhook notification: {e}");
            }
        }
    }

    // ── Telegram delivery ─────────────────────────────────────────

    async fn send_telegram(&self, text: String) {
        let (Some(token), Some(chat_id)) = (&self.telegram_bot_token, &self.telegram_chat_id)
        else {
            return;
        };

        let url = TELEGRAM_API_BASE.replace("{token}", token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                if status.as_u16() == 200 && body["ok"].as_bool().unwrap_or(false) {
                    debug!("Telegram notification sent successfully");
                } else {
                    let desc = body["description"].as_str().unwrap_or("Unknown error");
                    warn!(
                        "Telegram API error: {desc} (code: {})",
                        body["error_code"].as_i64().unwrap_or(0)
                    );
                }
            }
            Err(e) => {
                warn!("Failed to send Telegram notification: {e}");
            }
        }
    }
}

// ── Message builders ─────────────────────────────────────────────

fn success_lines(results: &[PingResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "\u{2705} {} ({:.0}ms)",
                r.project_name,
                r.response_time_ms.unwrap_or(0.0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn failure_lines(failed: &[PingResult]) -> String {
    failed
        .iter()
        .map(|r| format!("\u{274c} {}: {}", r.project_name, r.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discord embed payload with a Slack `text` fallback.
fn build_success_payload(results: &[PingResult], timestamp: &str) -> Value {
    json!({
        "embeds": [{
            "title": "\u{1f389} Supakeeper - All Projects Active",
            "description": format!(
                "Successfully pinged {} project(s):\n\n{}",
                results.len(),
                success_lines(results)
            ),
            "color": COLOR_GREEN,
            "footer": { "text": format!("Supakeeper | {timestamp}") },
        }],
        "text": format!(
            "\u{2705} Supakeeper: Successfully pinged {} project(s)",
            results.len()
        ),
    })
}

fn build_failure_payload(failed: &[PingResult], timestamp: &str) -> Value {
    json!({
        "embeds": [{
            "title": "\u{26a0}\u{fe0f} Supakeeper - Some Projects Failed",
            "description": format!(
                "Failed to ping {} project(s):\n\n{}",
                failed.len(),
                failure_lines(failed)
            ),
            "color": COLOR_RED,
            "footer": { "text": format!("Supakeeper | {timestamp}") },
        }],
        "text": format!(
            "\u{26a0}\u{fe0f} Supakeeper: Failed to ping {} project(s)",
            failed.len()
        ),
    })
}

fn build_telegram_success_text(results: &[PingResult], timestamp: &str) -> String {
    format!(
        "\u{1f389} *Supakeeper - All Projects Active*\n\n\
         Successfully pinged {} project(s):\n\n{}\n\n_{timestamp}_",
        results.len(),
        success_lines(results)
    )
}

fn build_telegram_failure_text(failed: &[PingResult], timestamp: &str) -> String {
    format!(
        "\u{26a0}\u{fe0f} *Supakeeper - Some Projects Failed*\n\n\
         Failed to ping {} project(s):\n\n{}\n\n_{timestamp}_",
        failed.len(),
        failure_lines(failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<PingResult> {
        vec![
            PingResult::ok("alpha", "Successfully queried table 'health'", 42.0),
            PingResult::failed("beta", "Failed after 3 attempts: timeout", Some(90000.0)),
        ]
    }

    #[test]
    fn test_from_config_requires_a_channel() {
        assert!(Notifier::from_config(&Config::default()).is_none());

        let cfg = Config {
            webhook_url: Some("https://hooks.example.com/x".to_string()),
            ..Config::default()
        };
        let notifier = Notifier::from_config(&cfg).unwrap();
        assert!(notifier.has_webhook());
        assert!(!notifier.has_telegram());
    }

    #[test]
    fn test_telegram_requires_token_and_chat_id() {
        let cfg = Config {
            telegram_bot_token: Some("token".to_string()),
            telegram_chat_id: Some("42".to_string()),
            ..Config::default()
        };
        let notifier = Notifier::from_config(&cfg).unwrap();
        assert!(notifier.has_telegram());
        assert!(!notifier.has_webhook());
    }

    #[test]
    fn test_failure_payload_carries_only_failures() {
        let failed: Vec<PingResult> = results().into_iter().filter(|r| !r.success).collect();
        let payload = build_failure_payload(&failed, "2026-01-01 00:00:00");

        let description = payload["embeds"][0]["description"].as_str().unwrap();
        assert!(description.contains("beta"));
        assert!(!description.contains("alpha"));
        assert!(description.contains("1 project(s)"));
        assert_eq!(payload["embeds"][0]["color"].as_u64(), Some(15548997));
    }

    #[test]
    fn test_success_payload_includes_timings() {
        let ok: Vec<PingResult> = results().into_iter().filter(|r| r.success).collect();
        let payload = build_success_payload(&ok, "2026-01-01 00:00:00");

        let description = payload["embeds"][0]["description"].as_str().unwrap();
        assert!(description.contains("alpha (42ms)"));
        assert_eq!(payload["embeds"][0]["color"].as_u64(), Some(5763719));
        assert!(payload["text"].as_str().unwrap().contains("1 project(s)"));
    }

    #[test]
    fn test_telegram_text_is_markdown() {
        let ok: Vec<PingResult> = results().into_iter().filter(|r| r.success).collect();
        let text = build_telegram_success_text(&ok, "2026-01-01 00:00:00");
        assert!(text.contains("*Supakeeper - All Projects Active*"));
        assert!(text.ends_with("_2026-01-01 00:00:00_"));
    }
}

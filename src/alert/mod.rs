//! Out-of-band alert delivery
//!
//! Alerts are fired by the threat detector after a confirmed detection
//! passes the cooldown gate. Delivery is a single best-effort attempt:
//! a failure is reported and the cooldown stands, so a misconfigured or
//! rate-limited channel cannot trigger a retry storm.

use crate::types::Detection;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::defaults::ALERT_HTTP_TIMEOUT_SECS;
use crate::config::AlertConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("alert endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("alert channel not configured: {0}")]
    NotConfigured(&'static str),
}

// ============================================================================
// Alerter Trait
// ============================================================================

/// Everything the alert channel needs to reach a human.
#[derive(Debug, Clone)]
pub struct AlertContext {
    /// Destination identity (emergency contact).
    pub to: String,
    /// Origin identity presented by the channel.
    pub from: String,
    /// Reference to the payload the channel delivers (e.g. a voice script URL).
    pub payload_url: String,
    /// The detection that triggered the alert.
    pub threat: Detection,
}

/// Trait abstracting the alert delivery mechanism.
///
/// Returns a channel-specific confirmation identifier on success.
#[async_trait]
pub trait Alerter: Send + Sync + 'static {
    async fn send_alert(&self, ctx: &AlertContext) -> Result<String, AlertError>;

    /// Human-readable channel name for logging.
    fn channel_name(&self) -> &'static str;
}

// ============================================================================
// HTTP Alerter (voice call REST API)
// ============================================================================

/// Places an outbound voice call through a REST telephony API.
pub struct HttpAlerter {
    client: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    sid: String,
}

impl HttpAlerter {
    pub fn new(cfg: &AlertConfig) -> Result<Self, AlertError> {
        let (account_sid, auth_token) = cfg.resolved_credentials();
        if account_sid.is_empty() {
            return Err(AlertError::NotConfigured("account_sid"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ALERT_HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        })
    }
}

#[async_trait]
impl Alerter for HttpAlerter {
    async fn send_alert(&self, ctx: &AlertContext) -> Result<String, AlertError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.endpoint, self.account_sid
        );
        debug!(to = %ctx.to, threat = %ctx.threat, "Placing alert call");

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", ctx.to.as_str()),
                ("From", ctx.from.as_str()),
                ("Url", ctx.payload_url.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AlertError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let call: CallResponse = resp.json().await?;
        Ok(call.sid)
    }

    fn channel_name(&self) -> &'static str {
        "voice-call"
    }
}

// ============================================================================
// Log Alerter (fallback channel)
// ============================================================================

/// Fallback channel for deployments without alert credentials: the alert
/// is written to the log and "delivery" always succeeds, so cooldown
/// bookkeeping behaves exactly as with a real channel.
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn send_alert(&self, ctx: &AlertContext) -> Result<String, AlertError> {
        tracing::warn!(threat = %ctx.threat, to = %ctx.to, "ALERT (log-only channel)");
        Ok(format!("log-{}", ctx.threat.label.to_lowercase()))
    }

    fn channel_name(&self) -> &'static str {
        "log-only"
    }
}

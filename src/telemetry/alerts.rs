//! Alert management for notifications
//!
//! Alerts are advisory: they are mirrored onto the event bus for the
//! dashboard and optionally pushed to an outbound webhook. They never
//! mutate agent state.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::TelemetryConfig;
use crate::network::event_bus::ColonyEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub timestamp: i64,
}

impl Alert {
    pub fn new(level: AlertLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Error, title, message)
    }

    pub fn critical(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Critical, title, message)
    }
}

pub struct AlertManager {
    enabled: bool,
    webhook_url: Option<String>,
    event_tx: broadcast::Sender<ColonyEvent>,
    http_client: reqwest::Client,
}

impl AlertManager {
    pub fn new(config: &TelemetryConfig, event_tx: broadcast::Sender<ColonyEvent>) -> Self {
        Self {
            enabled: config.enable_alerts,
            webhook_url: config.alert_webhook.clone(),
            event_tx,
            http_client: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Info => info!("[ALERT] {}: {}", alert.title, alert.message),
            AlertLevel::Warning => warn!("[ALERT] {}: {}", alert.title, alert.message),
            AlertLevel::Error => error!("[ALERT] {}: {}", alert.title, alert.message),
            AlertLevel::Critical => error!("[CRITICAL] {}: {}", alert.title, alert.message),
        }

        let _ = self.event_tx.send(ColonyEvent::Alert {
            level: alert.level.as_str().to_string(),
            title: alert.title.clone(),
            message: alert.message.clone(),
        });

        if !self.enabled {
            return;
        }

        if let Some(url) = &self.webhook_url {
            if let Err(e) = self.send_webhook(url, &alert).await {
                warn!("Failed to send webhook alert: {}", e);
            }
        }
    }

    async fn send_webhook(&self, url: &str, alert: &Alert) -> Result<()> {
        let payload = serde_json::json!({
            "level": alert.level.as_str(),
            "text": format!("*{}*\n{}", alert.title, alert.message),
            "timestamp": alert.timestamp,
        });

        self.http_client.post(url).json(&payload).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::event_bus::EventBus;

    #[tokio::test]
    async fn test_alert_mirrored_to_event_bus() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let config = TelemetryConfig {
            log_level: "info".to_string(),
            json_logs: false,
            log_file: None,
            metrics_port: 9090,
            enable_metrics: false,
            enable_alerts: false,
            alert_webhook: None,
        };
        let manager = AlertManager::new(&config, bus.sender());

        manager.send(Alert::warning("slow", "execution above budget")).await;

        match rx.recv().await.unwrap() {
            ColonyEvent::Alert { level, title, .. } => {
                assert_eq!(level, "warning");
                assert_eq!(title, "slow");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

//! Push payloads and the notifications rendered from them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NotificationConfig;

/// JSON body of a push message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub primary_key: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub options: NotificationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: u64,
    pub primary_key: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

/// A click on a shown notification, or on one of its actions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationClick {
    pub notification_id: String,
    #[serde(default)]
    pub action: Option<String>,
}

/// Render a push payload as a notification with `explore` and `close` actions.
pub fn build_notification(
    config: &NotificationConfig,
    payload: PushPayload,
    date_of_arrival: u64,
) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        title: payload.title,
        options: NotificationOptions {
            body: payload.body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                date_of_arrival,
                primary_key: payload.primary_key,
            },
            actions: vec![
                NotificationAction {
                    action: ACTION_EXPLORE.to_string(),
                    title: config.explore_title.clone(),
                    icon: config.explore_icon.clone(),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: config.close_title.clone(),
                    icon: config.close_icon.clone(),
                },
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parsing() {
        let payload: PushPayload = serde_json::from_str(
            r#"{"title": "Ny artikel", "body": "SEO i 2025", "primaryKey": 42}"#,
        )
        .unwrap();
        assert_eq!(payload.title, "Ny artikel");
        assert_eq!(payload.primary_key, serde_json::json!(42));
    }

    #[test]
    fn test_notification_shape() {
        let payload = PushPayload {
            title: "Ny artikel".to_string(),
            body: "Læs mere".to_string(),
            primary_key: serde_json::json!("a-1"),
        };
        let n = build_notification(&NotificationConfig::default(), payload, 1_700_000_000_000);

        assert_eq!(n.options.icon, "/static/images/icon-192x192.png");
        assert_eq!(n.options.badge, "/static/images/badge-72x72.png");
        assert_eq!(n.options.vibrate, vec![100, 50, 100]);
        let actions: Vec<_> = n.options.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["explore", "close"]);

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["options"]["data"]["primaryKey"], "a-1");
        assert_eq!(json["options"]["data"]["dateOfArrival"], 1_700_000_000_000u64);
    }
}

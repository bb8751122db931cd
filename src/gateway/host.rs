//! The environment hosting the gateway: clients, windows and notifications.

use async_trait::async_trait;
use tracing::info;

use crate::gateway::notify::Notification;

#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Install finished; take over without waiting for existing clients to go away.
    async fn skip_waiting(&self);

    /// Activation finished; start controlling already-open clients.
    async fn claim_clients(&self);

    async fn show_notification(&self, notification: Notification);

    async fn close_notification(&self, id: &str);

    async fn open_window(&self, url: &str);
}

/// Host for the standalone server: there are no windows, so every request is logged.
#[derive(Debug, Default)]
pub struct TracingHost;

#[async_trait]
impl ClientHost for TracingHost {
    async fn skip_waiting(&self) {
        info!("Skipping wait, taking over immediately");
    }

    async fn claim_clients(&self) {
        info!("Claimed clients");
    }

    async fn show_notification(&self, notification: Notification) {
        info!(
            id = %notification.id,
            title = %notification.title,
            actions = notification.options.actions.len(),
            "Showing notification"
        );
    }

    async fn close_notification(&self, id: &str) {
        info!(id, "Closed notification");
    }

    async fn open_window(&self, url: &str) {
        info!(url, "Opening window");
    }
}

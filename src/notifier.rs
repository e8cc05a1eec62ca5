//! Outbound user notifications.
//!
//! Template rendering and delivery belong to whatever implements [`Notifier`];
//! handlers only name a template and hand over the data.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub template: &'static str,
    pub data: Value,
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> BoxFuture<'static, AppResult<()>>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: Notification) -> BoxFuture<'static, AppResult<()>> {
        async move {
            tracing::info!(
                recipient = %notification.recipient,
                template = notification.template,
                data = %notification.data,
                "Notification dispatched"
            );
            Ok(())
        }
        .boxed()
    }
}

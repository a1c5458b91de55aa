//! Notification delivery (email/SMS) used by the EMAIL and SMS distributors.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use marketing_core::UserId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("notification send failed: {0}")]
pub struct NotificationError(pub String);

/// Backend that actually sends messages.
#[async_trait::async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send_email(
        &self,
        user_id: UserId,
        template_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError>;

    async fn send_sms(
        &self,
        user_id: UserId,
        template_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError>;
}

/// Facade over an optional client. Without a client every send is a logged no-op.
#[derive(Clone, Default)]
pub struct NotificationService {
    client: Option<Arc<dyn NotificationClient>>,
}

impl NotificationService {
    pub fn new(client: Arc<dyn NotificationClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub async fn send_email(
        &self,
        user_id: UserId,
        template_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        let Some(client) = &self.client else {
            warn!(user_id = %user_id, template_id, "notification client not configured; skipping email");
            return Ok(());
        };
        client.send_email(user_id, template_id, params).await?;
        info!(user_id = %user_id, template_id, "reward email sent");
        Ok(())
    }

    pub async fn send_sms(
        &self,
        user_id: UserId,
        template_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        let Some(client) = &self.client else {
            warn!(user_id = %user_id, template_id, "notification client not configured; skipping sms");
            return Ok(());
        };
        client.send_sms(user_id, template_id, params).await?;
        info!(user_id = %user_id, template_id, "reward sms sent");
        Ok(())
    }
}

impl core::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationService")
            .field("available", &self.is_available())
            .finish()
    }
}

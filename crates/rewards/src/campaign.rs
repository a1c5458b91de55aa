use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketing_core::{AppId, CampaignId, Entity, TenantId};

/// Campaign metadata, consulted read-only while issuing rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub name: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "active")]
    pub status: String,
}

fn active() -> String {
    "ACTIVE".to_string()
}

impl Campaign {
    pub fn new(id: CampaignId, tenant_id: TenantId, app_id: AppId, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id,
            app_id,
            name: name.into(),
            start_time: None,
            end_time: None,
            status: active(),
        }
    }
}

impl Entity for Campaign {
    type Id = CampaignId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

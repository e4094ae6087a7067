//! Ad placement selection and analytics.
//!
//! [`AdSelector`] consults the [`EntitlementGate`] before serving anything and
//! treats every storage problem on this path as a soft failure: selection
//! degrades to "no ad" and analytics writes are logged and dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entitlement::EntitlementGate;
use crate::store::{AdConfigStore, AnalyticsSink, StoreError};
use crate::types::{define_text_enum, DbId, Timestamp};

/// Display frequency assigned to configs created without one.
pub const DEFAULT_DISPLAY_FREQUENCY: i32 = 1;

define_text_enum! {
    /// Ad placement format.
    AdType {
        Banner = "BANNER",
        Interstitial = "INTERSTITIAL",
        Rewarded = "REWARDED",
        Native = "NATIVE",
    }
}

define_text_enum! {
    /// Tracked client-side ad interaction.
    AdAction {
        Impression = "IMPRESSION",
        Click = "CLICK",
        Close = "CLOSE",
        Error = "ERROR",
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// A configured (ad type, ad network) pairing.
#[derive(Debug, Clone, Serialize)]
pub struct AdConfig {
    pub id: DbId,
    pub ad_type: AdType,
    pub ad_network_id: String,
    pub is_active: bool,
    /// Advisory hint for the client; selection ignores it.
    pub display_frequency: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Upsert payload keyed on `(ad_type, ad_network_id)`.
///
/// Omitted fields keep their stored value on update and take the defaults
/// (`is_active = true`, `display_frequency = 1`) on insert.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertAdConfig {
    pub ad_type: AdType,
    #[validate(length(min = 1, max = 128))]
    pub ad_network_id: String,
    pub is_active: Option<bool>,
    #[validate(range(min = 1))]
    pub display_frequency: Option<i32>,
}

/// The ad handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdPlacement {
    pub config_id: DbId,
    pub ad_type: AdType,
    pub ad_network_id: String,
    pub display_frequency: i32,
}

impl From<AdConfig> for AdPlacement {
    fn from(config: AdConfig) -> Self {
        Self {
            config_id: config.id,
            ad_type: config.ad_type,
            ad_network_id: config.ad_network_id,
            display_frequency: config.display_frequency,
        }
    }
}

/// Input for one analytics fact.
#[derive(Debug, Clone)]
pub struct NewAdAnalyticsEvent {
    /// `None` for anonymous traffic.
    pub user_id: Option<DbId>,
    pub ad_type: AdType,
    pub action: AdAction,
    pub ad_network_id: String,
    pub timestamp: Timestamp,
}

/// A stored analytics fact.
#[derive(Debug, Clone, Serialize)]
pub struct AdAnalyticsEvent {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub ad_type: AdType,
    pub action: AdAction,
    pub ad_network_id: String,
    pub timestamp: Timestamp,
}

/// Event count for one `(ad_type, action)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsBucket {
    pub ad_type: AdType,
    pub action: AdAction,
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Picks ads for requests and records what clients report back.
#[derive(Clone)]
pub struct AdSelector {
    configs: Arc<dyn AdConfigStore>,
    analytics: Arc<dyn AnalyticsSink>,
    gate: EntitlementGate,
}

impl AdSelector {
    pub fn new(
        configs: Arc<dyn AdConfigStore>,
        analytics: Arc<dyn AnalyticsSink>,
        gate: EntitlementGate,
    ) -> Self {
        Self {
            configs,
            analytics,
            gate,
        }
    }

    /// Choose an ad of `ad_type` for the (optional) requesting user.
    ///
    /// Entitled users get `None` without touching the config table. Otherwise
    /// the most recently created active config wins.
    pub async fn select_ad(&self, ad_type: AdType, user_id: Option<DbId>) -> Option<AdPlacement> {
        if let Some(user_id) = user_id {
            if !self.gate.is_restricted(user_id).await {
                tracing::debug!(user_id, %ad_type, "Ad withheld for entitled user");
                return None;
            }
        }

        let configs = match self.configs.list_active(Some(ad_type)).await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::warn!(%ad_type, error = %e, "Ad config lookup failed, serving no ad");
                return None;
            }
        };

        let placement = configs.into_iter().next().map(AdPlacement::from);
        if placement.is_none() {
            tracing::debug!(%ad_type, "No active ad config");
        }
        placement
    }

    /// Append one analytics event. Never fails the caller.
    ///
    /// Returns the stored row, or `None` if the write was dropped.
    pub async fn record_event(
        &self,
        user_id: Option<DbId>,
        ad_type: AdType,
        action: AdAction,
        ad_network_id: &str,
    ) -> Option<AdAnalyticsEvent> {
        match action {
            AdAction::Error => {
                tracing::warn!(?user_id, %ad_type, ad_network_id, "Client reported ad error")
            }
            AdAction::Click => tracing::info!(?user_id, %ad_type, ad_network_id, "Ad clicked"),
            AdAction::Impression | AdAction::Close => {
                tracing::debug!(?user_id, %ad_type, %action, ad_network_id, "Ad event")
            }
        }

        let event = NewAdAnalyticsEvent {
            user_id,
            ad_type,
            action,
            ad_network_id: ad_network_id.to_string(),
            timestamp: chrono::Utc::now(),
        };

        match self.analytics.append(&event).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::error!(
                    %ad_type,
                    %action,
                    error = %e,
                    "Failed to record ad analytics event"
                );
                None
            }
        }
    }

    /// Event counts grouped by `(ad_type, action)` within an optional window.
    pub async fn aggregate_analytics(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<AnalyticsBucket>, StoreError> {
        self.analytics.aggregate(start, end).await
    }

    /// Active configs, newest first.
    pub async fn list_configs(&self, ad_type: Option<AdType>) -> Result<Vec<AdConfig>, StoreError> {
        self.configs.list_active(ad_type).await
    }

    pub async fn upsert_config(&self, input: &UpsertAdConfig) -> Result<AdConfig, StoreError> {
        let config = self.configs.upsert(input).await?;
        tracing::info!(
            config_id = config.id,
            ad_type = %config.ad_type,
            ad_network_id = %config.ad_network_id,
            is_active = config.is_active,
            "Ad config upserted"
        );
        Ok(config)
    }

    /// Deactivate a config. Returns `None` if it does not exist.
    pub async fn disable_config(&self, id: DbId) -> Result<Option<AdConfig>, StoreError> {
        let config = self.configs.disable(id).await?;
        if config.is_some() {
            tracing::info!(config_id = id, "Ad config disabled");
        }
        Ok(config)
    }
}

//! The `trigger_campaign` action: append the event's customer to an
//! existing campaign's contact list.
//!
//! Contacts are deduplicated by normalized phone number per campaign, so
//! a provider retrying webhook delivery does not inflate the list. No
//! credits are consumed here: the cost is attributed at actual send
//! time, outside this core.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{ActionDispatcher, DispatchResult, normalize_phone};
use crate::event::NormalizedEvent;
use crate::pipeline::types::AutomationRule;
use crate::store::traits::CampaignContact;

impl ActionDispatcher {
    pub(super) async fn trigger_campaign(
        &self,
        event: &NormalizedEvent,
        rule: &AutomationRule,
        simulate: bool,
    ) -> DispatchResult {
        let Some(phone) = event.customer.as_ref().and_then(|c| c.phone.as_deref()) else {
            return DispatchResult::failed("customer phone missing; cannot add to campaign");
        };

        let Some(campaign_id) = rule.action_config.get("campaign_id").and_then(|v| v.as_str())
        else {
            return DispatchResult::failed("campaign_id missing from action config");
        };

        let campaign = match self.db.get_campaign(campaign_id).await {
            Ok(Some(c)) if c.tenant_instance_id == event.tenant_instance_id => c,
            Ok(_) => return DispatchResult::failed(format!("campaign {campaign_id} not found")),
            Err(e) => return DispatchResult::failed(format!("campaign lookup failed: {e}")),
        };

        let to = normalize_phone(phone, &self.default_country_code);

        if simulate {
            return DispatchResult::ok(
                format!("[simulated] would add {to} to campaign {}", campaign.name),
                0,
            );
        }

        match self.db.campaign_has_phone(&campaign.id, &to).await {
            Ok(true) => {
                return DispatchResult::ok(
                    format!("{to} already in campaign {}", campaign.name),
                    0,
                );
            }
            Ok(false) => {}
            Err(e) => return DispatchResult::failed(format!("campaign lookup failed: {e}")),
        }

        let contact = CampaignContact {
            id: Uuid::new_v4().to_string(),
            campaign_id: campaign.id.clone(),
            phone: to.clone(),
            name: event.customer.as_ref().and_then(|c| c.name.clone()),
            created_at: Utc::now(),
        };
        match self.db.add_campaign_contact(&contact).await {
            Ok(()) => {
                info!(campaign_id = %campaign.id, to = %to, "Contact added to campaign");
                DispatchResult::ok(format!("{to} added to campaign {}", campaign.name), 0)
            }
            Err(e) => DispatchResult::failed(format!("failed to add campaign contact: {e}")),
        }
    }
}

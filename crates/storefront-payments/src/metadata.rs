//! Checkout Session Metadata
//!
//! Everything needed to reconcile a payment later travels in the processor
//! session's string metadata: who paid, for what, and which pending rows were
//! created for it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PaymentError, Result};

const KEY_KIND: &str = "checkout_type";
const KEY_USER: &str = "user_id";
const KEY_PRODUCTS: &str = "product_ids";
const KEY_PURCHASES: &str = "purchase_ids";
const KEY_PLAN: &str = "plan_id";
const KEY_SERVICE: &str = "service_id";
const KEY_SCHEDULED_AT: &str = "scheduled_at";
const KEY_NOTES: &str = "notes";

/// Processor metadata values are capped at 500 characters
const MAX_VALUE_LEN: usize = 500;

/// What a checkout session is paying for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutKind {
    Product,
    Cart,
    Subscription,
    Consultation,
}

impl CheckoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutKind::Product => "product",
            CheckoutKind::Cart => "cart",
            CheckoutKind::Subscription => "subscription",
            CheckoutKind::Consultation => "consultation",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "product" => Ok(CheckoutKind::Product),
            "cart" => Ok(CheckoutKind::Cart),
            "subscription" => Ok(CheckoutKind::Subscription),
            "consultation" => Ok(CheckoutKind::Consultation),
            other => Err(PaymentError::WebhookParse(format!("unknown checkout type '{other}'"))),
        }
    }

    /// Whether the session creates purchase rows
    pub fn is_purchase(&self) -> bool {
        matches!(self, CheckoutKind::Product | CheckoutKind::Cart)
    }
}

/// Typed view of a checkout session's metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub kind: CheckoutKind,
    pub user_id: Uuid,
    pub product_ids: Vec<Uuid>,
    pub purchase_ids: Vec<Uuid>,
    pub plan_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CheckoutMetadata {
    pub fn new(kind: CheckoutKind, user_id: Uuid) -> Self {
        Self {
            kind,
            user_id,
            product_ids: Vec::new(),
            purchase_ids: Vec::new(),
            plan_id: None,
            service_id: None,
            scheduled_at: None,
            notes: None,
        }
    }

    /// Encode as processor metadata
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(KEY_KIND.into(), self.kind.as_str().into());
        map.insert(KEY_USER.into(), self.user_id.to_string());
        if !self.product_ids.is_empty() {
            map.insert(KEY_PRODUCTS.into(), join_ids(&self.product_ids));
        }
        if !self.purchase_ids.is_empty() {
            map.insert(KEY_PURCHASES.into(), join_ids(&self.purchase_ids));
        }
        if let Some(plan_id) = self.plan_id {
            map.insert(KEY_PLAN.into(), plan_id.to_string());
        }
        if let Some(service_id) = self.service_id {
            map.insert(KEY_SERVICE.into(), service_id.to_string());
        }
        if let Some(at) = self.scheduled_at {
            map.insert(KEY_SCHEDULED_AT.into(), at.to_rfc3339());
        }
        if let Some(notes) = &self.notes {
            let truncated: String = notes.chars().take(MAX_VALUE_LEN).collect();
            map.insert(KEY_NOTES.into(), truncated);
        }
        map
    }

    /// Decode processor metadata. Sessions created before `checkout_type`
    /// existed are treated as product purchases.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let kind = match map.get(KEY_KIND) {
            Some(kind) => CheckoutKind::parse(kind)?,
            None if map.contains_key(KEY_PLAN) => CheckoutKind::Subscription,
            None => CheckoutKind::Product,
        };
        let user_id = map
            .get(KEY_USER)
            .ok_or_else(|| PaymentError::WebhookParse("metadata missing user_id".into()))
            .and_then(|s| parse_id(KEY_USER, s))?;

        let scheduled_at = map
            .get(KEY_SCHEDULED_AT)
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| PaymentError::WebhookParse(format!("bad scheduled_at: {e}")))
            })
            .transpose()?;

        Ok(Self {
            kind,
            user_id,
            product_ids: split_ids(KEY_PRODUCTS, map.get(KEY_PRODUCTS))?,
            purchase_ids: split_ids(KEY_PURCHASES, map.get(KEY_PURCHASES))?,
            plan_id: map.get(KEY_PLAN).map(|s| parse_id(KEY_PLAN, s)).transpose()?,
            service_id: map.get(KEY_SERVICE).map(|s| parse_id(KEY_SERVICE, s)).transpose()?,
            scheduled_at,
            notes: map.get(KEY_NOTES).cloned(),
        })
    }

    /// Check the encoded id lists fit processor limits
    pub fn check_limits(&self) -> Result<()> {
        for (key, ids) in [(KEY_PRODUCTS, &self.product_ids), (KEY_PURCHASES, &self.purchase_ids)] {
            if join_ids(ids).len() > MAX_VALUE_LEN {
                return Err(PaymentError::Shop(storefront_core::ShopError::Validation(format!(
                    "too many items in one checkout ({key})"
                ))));
            }
        }
        Ok(())
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

fn parse_id(key: &str, s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim())
        .map_err(|e| PaymentError::WebhookParse(format!("bad {key} '{s}': {e}")))
}

fn split_ids(key: &str, value: Option<&String>) -> Result<Vec<Uuid>> {
    value
        .map(|v| {
            v.split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_id(key, s))
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip() {
        let mut meta = CheckoutMetadata::new(CheckoutKind::Cart, Uuid::new_v4());
        meta.product_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        meta.purchase_ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        let decoded = CheckoutMetadata::from_map(&meta.to_map()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_missing_user_is_rejected() {
        let map = HashMap::from([(KEY_KIND.to_string(), "product".to_string())]);
        assert!(matches!(
            CheckoutMetadata::from_map(&map),
            Err(PaymentError::WebhookParse(_))
        ));
    }

    #[test]
    fn test_legacy_metadata_defaults_to_product() {
        let user = Uuid::new_v4();
        let map = HashMap::from([(KEY_USER.to_string(), user.to_string())]);
        let meta = CheckoutMetadata::from_map(&map).unwrap();
        assert_eq!(meta.kind, CheckoutKind::Product);
        assert!(meta.product_ids.is_empty());
    }

    #[test]
    fn test_item_limit() {
        let mut meta = CheckoutMetadata::new(CheckoutKind::Cart, Uuid::new_v4());
        meta.product_ids = (0..20).map(|_| Uuid::new_v4()).collect();
        assert!(meta.check_limits().is_err());
    }
}

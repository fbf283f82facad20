use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a purchase, driven by payment confirmation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's attempt at (or completion of) buying a single product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    /// Amount charged in USD
    pub amount: Decimal,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// New purchase awaiting payment confirmation
    pub fn pending(user_id: Uuid, product_id: Uuid, amount: Decimal, test_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            amount,
            status: PurchaseStatus::Pending,
            stripe_session_id: None,
            test_mode,
            created_at: now,
            updated_at: now,
        }
    }

    /// Purchase recorded directly as paid (webhook or verifier reconstruction)
    pub fn completed(
        user_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
        stripe_session_id: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        let mut purchase = Self::pending(user_id, product_id, amount, test_mode);
        purchase.status = PurchaseStatus::Completed;
        purchase.stripe_session_id = Some(stripe_session_id.into());
        purchase
    }

    pub fn is_pending(&self) -> bool {
        self.status == PurchaseStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }
}

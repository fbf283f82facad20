//! Purchase Verification
//!
//! Called after the customer returns from hosted checkout. The processor's
//! session is the source of truth; if it says paid and the webhook has not
//! landed yet, the purchase rows are completed (or rebuilt) here.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use storefront_core::model::{Purchase, PurchaseStatus};
use storefront_core::{PollPolicy, ShopError, Store, VerificationStatus};
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::{PaymentGateway, SessionSnapshot};
use crate::metadata::CheckoutMetadata;

const BUS_CAPACITY: usize = 256;

/// In-process broadcast of checkout session ids whose purchases have settled
#[derive(Clone)]
pub struct CompletionBus {
    sender: broadcast::Sender<String>,
}

impl Default for CompletionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Announce a settled session. Nobody listening is fine.
    pub fn publish(&self, session_id: &str) {
        let _ = self.sender.send(session_id.to_string());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

/// Reconciles a returning customer's checkout session
pub struct PurchaseVerifier<S: Store + ?Sized> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    bus: CompletionBus,
}

impl<S: Store + ?Sized> PurchaseVerifier<S> {
    pub fn new(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, bus: CompletionBus) -> Self {
        Self { store, gateway, bus }
    }

    /// One verification attempt for `session_id` on behalf of `user_id`
    pub async fn verify(&self, session_id: &str, user_id: Uuid) -> Result<VerificationStatus> {
        let session = self.gateway.retrieve_session(session_id).await?;

        if let Some(owner) = session.metadata.get("user_id") {
            if owner != &user_id.to_string() {
                tracing::warn!(session_id, user_id = %user_id, "Verification attempted by non-owner");
                return Err(ShopError::Forbidden("This checkout belongs to another account".into()).into());
            }
        }

        if !session.paid {
            return Ok(VerificationStatus::PendingPayment);
        }

        let meta = CheckoutMetadata::from_map(&session.metadata)?;
        if !meta.kind.is_purchase() {
            return Ok(VerificationStatus::Completed);
        }

        let rows = self.session_purchases(&session, &meta).await?;
        let live: Vec<&Purchase> = rows
            .iter()
            .filter(|p| p.status != PurchaseStatus::Failed)
            .collect();

        let status = if live.iter().any(|p| p.is_pending()) {
            for purchase in live.into_iter().filter(|p| p.is_pending()) {
                self.force_complete(purchase, session_id).await?;
            }
            VerificationStatus::Completed
        } else if !live.is_empty() {
            VerificationStatus::AlreadyCompleted
        } else {
            self.reconstruct(&session, &meta).await?
        };

        tracing::info!(session_id, user_id = %user_id, status = ?status, "Verified checkout session");
        if status.is_settled() {
            self.bus.publish(session_id);
        }
        Ok(status)
    }

    /// Verify repeatedly under `policy`, waking early when the webhook
    /// settles this session. The ceiling bounds total wall time, slow
    /// processor calls included. Returns `TimedOut` if payment never arrived.
    pub async fn wait_for_settlement(
        &self,
        session_id: &str,
        user_id: Uuid,
        policy: PollPolicy,
    ) -> Result<VerificationStatus> {
        let mut settled = self.bus.subscribe();
        let deadline = Instant::now() + policy.ceiling;
        let mut last = VerificationStatus::PendingPayment;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, self.verify(session_id, user_id)).await {
                Ok(status) => {
                    let status = status?;
                    if status.is_settled() {
                        return Ok(status);
                    }
                    last = status;
                }
                Err(_) => {
                    tracing::warn!(session_id, attempts, "Verification call outlived the polling ceiling");
                    break;
                }
            }

            let wake = Instant::now() + policy.interval;
            if wake >= deadline {
                break;
            }

            let sleep = tokio::time::sleep_until(wake);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = &mut sleep => break,
                    notice = settled.recv() => match notice {
                        Ok(id) if id == session_id => break,
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => {
                            (&mut sleep).await;
                            break;
                        }
                    },
                }
            }
        }

        tracing::info!(session_id, attempts, last = ?last, "Stopped waiting for settlement");
        Ok(match last {
            VerificationStatus::PendingPayment => VerificationStatus::TimedOut,
            other => other,
        })
    }

    async fn session_purchases(
        &self,
        session: &SessionSnapshot,
        meta: &CheckoutMetadata,
    ) -> Result<Vec<Purchase>> {
        let rows = self.store.list_purchases_by_session(&session.id).await?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        let mut fallback = Vec::new();
        for id in &meta.purchase_ids {
            if let Some(purchase) = self.store.get_purchase(*id).await? {
                if purchase.user_id == meta.user_id {
                    fallback.push(purchase);
                }
            }
        }
        Ok(fallback)
    }

    async fn force_complete(&self, purchase: &Purchase, session_id: &str) -> Result<()> {
        let owned_elsewhere = self
            .store
            .find_purchases(purchase.user_id, purchase.product_id)
            .await?
            .iter()
            .any(|p| p.id != purchase.id && p.is_completed());

        let mut updated = purchase.clone();
        updated.status = if owned_elsewhere {
            PurchaseStatus::Failed
        } else {
            PurchaseStatus::Completed
        };
        updated.stripe_session_id = Some(session_id.to_string());
        updated.updated_at = Utc::now();
        self.store.update_purchase(&updated).await?;

        tracing::info!(
            purchase_id = %updated.id,
            product_id = %updated.product_id,
            status = %updated.status,
            "Force-completed pending purchase"
        );
        Ok(())
    }

    async fn reconstruct(
        &self,
        session: &SessionSnapshot,
        meta: &CheckoutMetadata,
    ) -> Result<VerificationStatus> {
        let owned: HashSet<Uuid> = self
            .store
            .list_purchases_for_user(meta.user_id)
            .await?
            .into_iter()
            .filter(Purchase::is_completed)
            .map(|p| p.product_id)
            .collect();

        let mut rebuilt = 0usize;
        for (product_id, amount) in meta.product_ids.iter().zip(&session.line_item_amounts) {
            if owned.contains(product_id) {
                continue;
            }
            let purchase = Purchase::completed(meta.user_id, *product_id, *amount, &session.id, false);
            self.store.insert_purchase(&purchase).await?;
            rebuilt += 1;
        }

        if rebuilt == 0 {
            return Ok(VerificationStatus::NoPurchases);
        }
        tracing::warn!(session_id = %session.id, rebuilt, "Reconstructed purchases from paid session");
        Ok(VerificationStatus::Reconstructed)
    }
}

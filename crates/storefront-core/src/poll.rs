//! Purchase Verification Polling
//!
//! After the redirect back from hosted checkout, the purchase is confirmed by
//! repeatedly asking the verifier until it reports a settled status. The
//! policy is a fixed interval and a wall-clock ceiling, after which the
//! caller gives up and tells the user to check their dashboard.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one verification attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Processor has not marked the session paid yet
    PendingPayment,
    /// Pending purchases were completed by this call
    Completed,
    /// Everything was already completed (webhook got there first)
    AlreadyCompleted,
    /// Paid, no rows existed; rows were rebuilt from the session
    Reconstructed,
    /// Paid, but there is nothing to reconcile yet
    NoPurchases,
    /// Gave up waiting
    TimedOut,
}

impl VerificationStatus {
    /// Whether polling can stop
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Completed
                | VerificationStatus::AlreadyCompleted
                | VerificationStatus::Reconstructed
        )
    }
}

/// Interval between attempts and total wall-clock budget, including time
/// spent inside each attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            ceiling: Duration::from_secs(30),
        }
    }
}

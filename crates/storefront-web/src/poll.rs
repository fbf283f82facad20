//! Confirmation page polling
//!
//! The success page asks the server to verify the session every
//! [`POLL_INTERVAL_MS`] until it settles or [`MAX_ATTEMPTS`] run out, the
//! same 2 s / 30 s budget the server's `PollPolicy` uses for its own wait.

use crate::api::VerifyResponse;

pub const POLL_INTERVAL_MS: u64 = 2_000;
pub const MAX_ATTEMPTS: u32 = 15;

/// Shown on [`Step::GiveUp`]. The checkout may still be unpaid, so this
/// must not say otherwise.
pub const GIVE_UP_HEADING: &str = "Still confirming";
pub const GIVE_UP_MESSAGE: &str = "We haven't been able to confirm this checkout yet. \
    If you completed payment, it will appear in your dashboard within a few minutes.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Stop: purchase confirmed with this status
    Settled(String),
    /// Try again after the interval
    Retry,
    /// Out of attempts; point the customer at their dashboard
    GiveUp,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Poller {
    attempts: u32,
}

impl Poller {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one attempt's outcome. Errors count as attempts.
    pub fn record(&mut self, result: &Result<VerifyResponse, String>) -> Step {
        self.attempts += 1;
        if let Ok(response) = result {
            if response.settled {
                return Step::Settled(response.status.clone());
            }
        }
        if self.attempts >= MAX_ATTEMPTS {
            Step::GiveUp
        } else {
            Step::Retry
        }
    }
}

//! The inbound filter chain.
//!
//! Every received sync wrapper passes through the same ordered checks:
//! self-origin, replay, observational (`isActive = false`), and staleness.
//! The decision is pure so every branch is testable without a socket.

use crate::dedup::DedupTable;
use crate::identity::InstanceId;
use crate::protocol::MessageWrapper;

/// Outcome for one received wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Passes every filter; hand to Apply.
    Apply,
    /// Our own message looped back; dropped silently.
    SelfMessage,
    /// Message ID already seen inside the dedup window; dropped silently.
    Duplicate,
    /// Sender's window was unfocused; observational only.
    Inactive,
    /// Payload older than the cutoff; `age_ms` for the log line.
    Stale { age_ms: u64 },
    /// Payload timestamp did not parse.
    BadTimestamp,
}

/// Run the filter chain. A new message ID is recorded in the dedup table
/// even when a later check drops the message, so replays of a dropped
/// message stay silent.
pub fn evaluate(
    wrapper: &MessageWrapper,
    self_id: &InstanceId,
    dedup: &mut DedupTable,
    now_ms: u64,
    stale_cutoff_ms: u64,
) -> Verdict {
    if &wrapper.sender_id == self_id {
        return Verdict::SelfMessage;
    }

    if !dedup.insert(&wrapper.message_id, now_ms) {
        return Verdict::Duplicate;
    }

    if !wrapper.payload.is_active {
        return Verdict::Inactive;
    }

    match wrapper.payload.timestamp_ms() {
        None => Verdict::BadTimestamp,
        Some(sent_ms) => {
            let age_ms = (now_ms as i64).saturating_sub(sent_ms).max(0) as u64;
            if age_ms > stale_cutoff_ms {
                Verdict::Stale { age_ms }
            } else {
                Verdict::Apply
            }
        }
    }
}

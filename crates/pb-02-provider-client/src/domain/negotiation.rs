//! # Negotiation State Machine
//!
//! One instance per negotiation attempt:
//! `Idle -> Probing -> DemandCreated -> (OfferReceived | TimedOut | Rejected)`.
//! `Probing` may be skipped when the marketplace mount point is already known.

use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Probing,
    DemandCreated,
    OfferReceived,
    TimedOut,
    Rejected,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NegotiationState::OfferReceived | NegotiationState::TimedOut | NegotiationState::Rejected
        )
    }

    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, next),
            (Idle, Probing)
                | (Idle, DemandCreated)
                | (Probing, DemandCreated)
                | (DemandCreated, OfferReceived)
                | (DemandCreated, TimedOut)
                | (DemandCreated, Rejected)
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::Probing => "probing",
            NegotiationState::DemandCreated => "demand_created",
            NegotiationState::OfferReceived => "offer_received",
            NegotiationState::TimedOut => "timed_out",
            NegotiationState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A single negotiation attempt and the path it took.
#[derive(Debug, Clone)]
pub struct Negotiation {
    region: String,
    state: NegotiationState,
    history: Vec<NegotiationState>,
}

impl Negotiation {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: NegotiationState::Idle,
            history: vec![NegotiationState::Idle],
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn history(&self) -> &[NegotiationState] {
        &self.history
    }

    /// Move to `next`. Illegal moves are ignored and reported as false.
    pub fn advance(&mut self, next: NegotiationState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        debug!(region = %self.region, from = %self.state, to = %next, "Negotiation transition");
        self.state = next;
        self.history.push(next);
        true
    }
}

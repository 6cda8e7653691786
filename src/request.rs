//! Last-request-wins sequencing
//!
//! Parameter changes can outpace the fetches they trigger. The calling layer
//! takes a ticket before each fetch and only applies a result whose ticket is
//! still the newest one issued; anything older is stale and is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

/// Identifier of one fetch-and-compute run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    /// Rebuild a ticket from an id handed across the C boundary
    pub fn from_id(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing tickets and recognizes the newest one
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every ticket issued before it
    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `ticket` is still the newest request
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Hand back `result` only if `ticket` has not been superseded
    pub fn accept<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            debug!(
                "discarding stale result for request {} (latest is {})",
                ticket.0,
                self.latest.load(Ordering::Acquire)
            );
            None
        }
    }
}

//! Guards for work that completes later than it was started: identity-bound
//! request tickets, a keystroke debouncer and a latest-result filter.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::Identity;

/// Issued when asynchronous work starts; presented again when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    identity: Option<Identity>,
    generation: u64,
}

impl RequestTicket {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}

/// Tracks the active identity. Every switch invalidates outstanding tickets.
#[derive(Debug, Clone, Default)]
pub struct IdentityGate {
    current: Option<Identity>,
    generation: u64,
}

impl IdentityGate {
    #[must_use]
    pub fn new(current: Option<Identity>) -> Self {
        Self {
            current,
            generation: 0,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Returns true if the identity actually changed.
    pub fn switch_to(&mut self, identity: Option<Identity>) -> bool {
        if self.current == identity {
            return false;
        }
        self.current = identity;
        self.generation += 1;
        true
    }

    #[must_use]
    pub fn issue(&self) -> RequestTicket {
        RequestTicket {
            identity: self.current.clone(),
            generation: self.generation,
        }
    }

    #[must_use]
    pub fn accept(&self, ticket: &RequestTicket) -> bool {
        ticket.generation == self.generation && ticket.identity == self.current
    }

    /// `Some(result)` if the ticket is still current, else `None`.
    pub fn complete<T>(&self, ticket: &RequestTicket, result: T) -> Option<T> {
        if self.accept(ticket) {
            Some(result)
        } else {
            debug!(
                issued_for = ?ticket.identity.as_ref().map(Identity::as_str),
                "discarding completion for a previous identity"
            );
            None
        }
    }
}

/// Holds at most one pending input. Each new input restarts the wait.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn input(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the pending input once it has been quiet for the full delay.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= self.delay);
        if ready {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Numbers requests so only the most recently issued one may apply.
#[derive(Debug, Clone, Default)]
pub struct LatestOnly {
    latest: u64,
}

impl LatestOnly {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    #[must_use]
    pub fn accept(&self, request: u64) -> bool {
        request == self.latest
    }

    pub fn complete<T>(&self, request: u64, result: T) -> Option<T> {
        self.accept(request).then_some(result)
    }
}

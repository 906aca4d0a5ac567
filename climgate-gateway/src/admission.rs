//! Admission gate: bounds concurrent engine jobs and rejects, never queues.
//!
//! The gate is a single counter. Entering is a CAS loop that refuses once
//! `in_flight == capacity`; the returned [`AdmissionPermit`] gives the slot
//! back when dropped, so a request that finishes, fails, times out or is
//! cancelled by a client disconnect all release identically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::GatewayError, state::AppState};

/// Bounded concurrency limiter.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    in_flight: AtomicUsize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` concurrent holders.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, in_flight: AtomicUsize::new(0) }
    }

    /// Take a slot, or fail immediately if none is free.
    ///
    /// # Errors
    /// Returns [`GatewayError::Busy`] when `capacity` permits are outstanding.
    pub fn try_enter(self: &Arc<Self>) -> Result<AdmissionPermit, GatewayError> {
        loop {
            let current = self.in_flight.load(Ordering::Acquire);
            if current >= self.capacity {
                return Err(GatewayError::Busy);
            }
            if self
                .in_flight
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(AdmissionPermit { gate: Arc::clone(self) });
            }
        }
    }

    /// Returns `true` if at least one slot is free.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.in_flight() < self.capacity
    }

    /// Slots currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Maximum concurrent holders.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held gate slot, released on drop.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Middleware holding a permit for the whole request, or answering 503.
pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let _permit = match state.gate.try_enter() {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(
                in_flight = state.gate.in_flight(),
                capacity = state.gate.capacity(),
                path = request.uri().path(),
                "admission refused"
            );
            return e.into_response();
        }
    };
    next.run(request).await
}

//! Tolerated-failure policy.
//!
//! Notifications, audit writes, status-history rows, POS bookkeeping, and stock
//! reservation on accept must never fail the transition that triggered them. Every
//! such call goes through [`BestEffort`], which logs the failure with enough context
//! for manual reconciliation and counts it.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct BestEffort {
    tolerated: AtomicU64,
}

impl BestEffort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Awaits `call`; on error logs and counts it, returning `None`.
    pub async fn run<T, E, F>(
        &self,
        order_id: Uuid,
        transition: &'static str,
        collaborator: &'static str,
        call: F,
    ) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match call.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.tolerate(order_id, transition, collaborator, &err);
                None
            }
        }
    }

    /// Records a failure that was already caught by the caller.
    pub fn tolerate(&self, order_id: Uuid, transition: &'static str, collaborator: &'static str, err: &dyn Display) {
        self.tolerated.fetch_add(1, Ordering::Relaxed);
        warn!(
            order_id = %order_id,
            transition,
            collaborator,
            error = %err,
            "Tolerated side-effect failure"
        );
    }

    /// Number of failures swallowed since start.
    pub fn tolerated_failures(&self) -> u64 {
        self.tolerated.load(Ordering::Relaxed)
    }
}

//! Delta coalescing for burst absorption.
//!
//! High event rates would otherwise trigger one recompute-and-render pass per
//! delta. The coalescer buffers row deltas for a short window and keeps only
//! the last delta per order - deltas carry full row state, so the collapsed
//! batch produces exactly the state sequential application would have. This
//! is a cost optimization, never a correctness relaxation.
//!
//! Control deltas (snapshot rebuilds, degradation) flush immediately: a
//! rebuild must never wait behind a render budget.

use std::collections::HashMap;

use crate::orders::OrderId;

use super::events::OrderDelta;

/// Whether a pushed delta can wait for the window or must flush now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Buffer until the debounce window elapses
    Defer,
    /// Drain the buffer immediately
    Immediate,
}

/// Coalesces a burst of deltas into one application pass per window.
#[derive(Debug, Default)]
pub struct DeltaCoalescer {
    // Last row delta per order; row deltas for distinct orders commute.
    pending: HashMap<OrderId, OrderDelta>,
    control: Option<OrderDelta>,
}

impl DeltaCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one delta, deciding whether the caller should flush now.
    pub fn push(&mut self, delta: OrderDelta) -> FlushDecision {
        match delta {
            OrderDelta::Snapshot(_) => {
                // The snapshot supersedes every buffered row delta.
                self.pending.clear();
                self.control = Some(delta);
                FlushDecision::Immediate
            }
            OrderDelta::Degraded => {
                self.control = Some(delta);
                FlushDecision::Immediate
            }
            OrderDelta::Upsert(ref order) => {
                self.pending.insert(order.id.clone(), delta);
                FlushDecision::Defer
            }
            OrderDelta::Remove(ref id) => {
                self.pending.insert(id.clone(), delta);
                FlushDecision::Defer
            }
        }
    }

    /// Drain the buffered batch. Row deltas first, control delta last.
    pub fn drain(&mut self) -> Vec<OrderDelta> {
        let mut batch: Vec<OrderDelta> = self.pending.drain().map(|(_, d)| d).collect();
        if let Some(control) = self.control.take() {
            batch.push(control);
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.control.is_none()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.control.is_some())
    }
}

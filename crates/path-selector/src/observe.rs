//! Structured selection progress events.
//!
//! Selectors report each driver iteration to an injectable observer instead
//! of a process-global sink, so embedders can record traces, feed dashboards,
//! or stay silent. The default observer forwards to `tracing`.

use serde::Serialize;
use tracing::debug;

/// One driver iteration of a selection strategy.
#[derive(Debug, Clone, Serialize)]
pub struct IterationEvent {
    /// Which strategy produced the event ("iterative", "sa", ...).
    pub selector: &'static str,
    pub iteration: usize,
    /// Target or current per-class path budget.
    pub k: usize,
    pub objective: Option<f64>,
    /// Objective improvement over the previous accepted state.
    pub delta: Option<f64>,
    pub temperature: Option<f64>,
    pub accepted: Option<bool>,
}

pub trait SelectionObserver {
    fn on_iteration(&mut self, event: &IterationEvent);
}

/// Forwards every event to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SelectionObserver for TracingObserver {
    fn on_iteration(&mut self, event: &IterationEvent) {
        debug!(
            "{} iter={} k={} obj={:?} delta={:?} t={:?} accepted={:?}",
            event.selector,
            event.iteration,
            event.k,
            event.objective,
            event.delta,
            event.temperature,
            event.accepted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<IterationEvent>,
    }

    impl SelectionObserver for Recorder {
        fn on_iteration(&mut self, event: &IterationEvent) {
            self.events.push(event.clone());
        }
    }

    #[test]
    fn test_recorder_collects_events() {
        let mut rec = Recorder::default();
        rec.on_iteration(&IterationEvent {
            selector: "sa",
            iteration: 1,
            k: 5,
            objective: Some(2.0),
            delta: Some(0.5),
            temperature: Some(0.6336),
            accepted: Some(true),
        });
        assert_eq!(rec.events.len(), 1);
        assert_eq!(rec.events[0].selector, "sa");
    }
}

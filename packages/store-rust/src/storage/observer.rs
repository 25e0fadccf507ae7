//! Availability observers and error sinks.
//!
//! Defines [`AvailabilityObserver`] for reacting to store connectivity
//! changes, [`CompositeAvailabilityObserver`] which fans notifications out to
//! every registered observer, and [`ErrorSink`] for centralized error events.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::StoreError;

/// Observer for store availability changes.
///
/// `true` means the store is reachable again, `false` means the wrapper
/// entered degraded mode. Called from the connection manager's task, so
/// implementations should return quickly.
///
/// Used as `Arc<dyn AvailabilityObserver>`.
pub trait AvailabilityObserver: Send + Sync {
    /// Called once per availability flip.
    fn on_availability_change(&self, available: bool);
}

/// Composite observer that fans out to multiple observers.
///
/// Observers can be registered while the wrapper is running.
#[derive(Default)]
pub struct CompositeAvailabilityObserver {
    observers: RwLock<Vec<Arc<dyn AvailabilityObserver>>>,
}

impl CompositeAvailabilityObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn AvailabilityObserver>>) -> Self {
        Self {
            observers: RwLock::new(observers),
        }
    }

    /// Adds an observer after construction.
    pub fn add(&self, observer: Arc<dyn AvailabilityObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl AvailabilityObserver for CompositeAvailabilityObserver {
    fn on_availability_change(&self, available: bool) {
        // Clone the list so an observer may register another without deadlocking.
        let observers = self.observers.read().clone();
        for observer in &observers {
            observer.on_availability_change(available);
        }
    }
}

/// Reason attached to store-dependent features while the store is down.
pub const STORE_UNAVAILABLE_REASON: &str =
    "This feature uses the database, however the database seems unavailable at the moment";

/// Availability observer that enables and disables named store-dependent
/// features.
///
/// A command dispatcher registers the features that need the store, asks
/// [`disabled_reason`](Self::disabled_reason) before running one, and
/// replies with the reason instead while the store is down. The gate
/// remembers the last availability it saw, so a feature registered during an
/// outage starts disabled.
#[derive(Debug)]
pub struct FeatureGate {
    state: RwLock<GateState>,
}

#[derive(Debug)]
struct GateState {
    available: bool,
    features: BTreeMap<String, Option<String>>,
}

impl GateState {
    fn reason(&self) -> Option<String> {
        (!self.available).then(|| STORE_UNAVAILABLE_REASON.to_string())
    }
}

impl FeatureGate {
    /// Creates a gate that assumes the store is unavailable until told
    /// otherwise, matching a wrapper that has not connected yet.
    #[must_use]
    pub fn new() -> Self {
        Self::with_availability(false)
    }

    /// Creates a gate seeded with the current availability, for attaching to
    /// a wrapper that is already running.
    #[must_use]
    pub fn with_availability(available: bool) -> Self {
        Self {
            state: RwLock::new(GateState {
                available,
                features: BTreeMap::new(),
            }),
        }
    }

    /// Registers a store-dependent feature, enabled only if the store is
    /// currently available.
    pub fn register(&self, feature: impl Into<String>) {
        let mut state = self.state.write();
        let reason = state.reason();
        state.features.entry(feature.into()).or_insert(reason);
    }

    /// Why the feature is disabled, or `None` if it may run.
    ///
    /// Unregistered features never depend on the store and are always enabled.
    #[must_use]
    pub fn disabled_reason(&self, feature: &str) -> Option<String> {
        self.state.read().features.get(feature).cloned().flatten()
    }

    /// Whether the feature may run now.
    #[must_use]
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.disabled_reason(feature).is_none()
    }
}

impl Default for FeatureGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityObserver for FeatureGate {
    fn on_availability_change(&self, available: bool) {
        let mut state = self.state.write();
        state.available = available;
        let reason = state.reason();
        for slot in state.features.values_mut() {
            slot.clone_from(&reason);
        }
    }
}

/// Receiver of error events for centralized visibility.
///
/// The wrapper reports store-level failures here in addition to returning
/// them to the caller. `context` names what the wrapper was doing.
pub trait ErrorSink: Send + Sync {
    fn on_error(&self, error: &StoreError, context: Option<&str>);
}

/// Default sink: logs every error event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn on_error(&self, error: &StoreError, context: Option<&str>) {
        tracing::error!(context = context.unwrap_or("none"), "{error}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Test observer that records every notification.
    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<bool>>,
    }

    impl AvailabilityObserver for RecordingObserver {
        fn on_availability_change(&self, available: bool) {
            self.seen.lock().push(available);
        }
    }

    #[test]
    fn empty_composite_does_not_panic() {
        let composite = CompositeAvailabilityObserver::default();
        assert!(composite.is_empty());
        composite.on_availability_change(false);
        composite.on_availability_change(true);
    }

    #[test]
    fn multiple_observers_all_receive_notifications() {
        let obs1 = Arc::new(RecordingObserver::default());
        let obs2 = Arc::new(RecordingObserver::default());
        let composite = CompositeAvailabilityObserver::new(vec![
            Arc::clone(&obs1) as Arc<dyn AvailabilityObserver>,
            Arc::clone(&obs2) as Arc<dyn AvailabilityObserver>,
        ]);

        composite.on_availability_change(false);
        composite.on_availability_change(true);

        assert_eq!(*obs1.seen.lock(), vec![false, true]);
        assert_eq!(*obs2.seen.lock(), vec![false, true]);
    }

    #[test]
    fn add_observer_after_construction() {
        let composite = CompositeAvailabilityObserver::default();
        let observer = Arc::new(RecordingObserver::default());

        composite.on_availability_change(false);
        composite.add(Arc::clone(&observer) as Arc<dyn AvailabilityObserver>);
        composite.on_availability_change(true);

        assert_eq!(*observer.seen.lock(), vec![true]);
        assert_eq!(composite.len(), 1);
    }

    #[test]
    fn feature_gate_disables_and_reenables_registered_features() {
        let gate = FeatureGate::with_availability(true);
        gate.register("prefix");
        gate.register("blacklist");

        gate.on_availability_change(false);
        assert_eq!(
            gate.disabled_reason("prefix").as_deref(),
            Some(STORE_UNAVAILABLE_REASON)
        );
        assert!(!gate.is_enabled("blacklist"));
        // Features that never needed the store are unaffected.
        assert!(gate.is_enabled("ping"));

        gate.on_availability_change(true);
        assert!(gate.is_enabled("prefix"));
        assert!(gate.is_enabled("blacklist"));
    }

    #[test]
    fn feature_registered_during_outage_starts_disabled() {
        let gate = FeatureGate::new();
        gate.register("prefix");
        assert_eq!(
            gate.disabled_reason("prefix").as_deref(),
            Some(STORE_UNAVAILABLE_REASON)
        );

        gate.on_availability_change(true);
        gate.register("blacklist");
        assert!(gate.is_enabled("prefix"));
        assert!(gate.is_enabled("blacklist"));

        gate.on_availability_change(false);
        gate.register("stats");
        assert!(!gate.is_enabled("stats"));
    }

    #[test]
    fn tracing_sink_accepts_errors_without_context() {
        struct CountingSink(AtomicUsize);
        impl ErrorSink for CountingSink {
            fn on_error(&self, _: &StoreError, _: Option<&str>) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let err = StoreError::Validation("x".to_string());
        TracingErrorSink.on_error(&err, None);
        TracingErrorSink.on_error(&err, Some("get guild 1"));

        let counting = CountingSink(AtomicUsize::new(0));
        counting.on_error(&err, None);
        assert_eq!(counting.0.load(Ordering::Relaxed), 1);
    }

    /// Verifies `Arc<dyn AvailabilityObserver>` compiles (object safety).
    #[test]
    fn availability_observer_is_object_safe() {
        fn _assert_object_safe(_: &Arc<dyn AvailabilityObserver>) {}
    }

    /// Verifies `Arc<dyn ErrorSink>` compiles (object safety).
    #[test]
    fn error_sink_is_object_safe() {
        fn _assert_object_safe(_: &Arc<dyn ErrorSink>) {}
    }
}

//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! cells and effects. It owns the dependency table and propagates writes.
//!
//! # How It Works
//!
//! 1. Effects and computed cells register with the runtime when created.
//!
//! 2. When one of them reads a source inside its tracking context, the
//!    runtime records the edge `source -> subscriber`.
//!
//! 3. When a source changes, the runtime:
//!    a. Marks every dependent computed cell dirty and follows its own
//!       dependents transitively
//!    b. Collects every reachable effect exactly once
//!    c. Runs the collected effects synchronously, before the write returns
//!
//! Collecting before running means an effect that depends on a signal both
//! directly and through a computed cell still runs once per write.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this computation as potentially needing update.
    ///
    /// Returns the source ID whose dependents must be marked in turn, if this
    /// computation is itself readable and just went from clean to dirty.
    fn mark_maybe_dirty(&self) -> Option<SourceId>;

    /// Schedule this computation for execution (effects only).
    fn schedule(&self);

    /// Check if this computation is an effect (eager) or computed cell (lazy).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered computation.
///
/// Dropping this handle unregisters the computation from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

type Registry = HashMap<SubscriberId, Weak<dyn Reactive>>;

#[derive(Default)]
struct Dependencies {
    /// Subscribers of each source, in subscription order.
    subscribers: HashMap<SourceId, IndexSet<SubscriberId>>,
    /// Sources read by each subscriber, for cheap clearing.
    sources: HashMap<SubscriberId, SmallVec<[SourceId; 4]>>,
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
static DEPENDENCIES: OnceLock<RwLock<Dependencies>> = OnceLock::new();

fn get_registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn get_dependencies() -> &'static RwLock<Dependencies> {
    DEPENDENCIES.get_or_init(|| RwLock::new(Dependencies::default()))
}

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();

        get_registry().write().insert(id, Arc::downgrade(&reactive));

        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        get_registry().write().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source_id: SourceId, subscriber_id: SubscriberId) {
        let mut deps = get_dependencies().write();

        let inserted = deps
            .subscribers
            .entry(source_id)
            .or_default()
            .insert(subscriber_id);

        if inserted {
            deps.sources.entry(subscriber_id).or_default().push(source_id);
        }
    }

    /// Remove all dependencies for a subscriber.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let mut deps = get_dependencies().write();

        let Some(sources) = deps.sources.remove(&subscriber_id) else {
            return;
        };

        for source in sources {
            if let Some(subs) = deps.subscribers.get_mut(&source) {
                subs.shift_remove(&subscriber_id);
                if subs.is_empty() {
                    deps.subscribers.remove(&source);
                }
            }
        }
    }

    /// Number of subscribers currently depending on a source.
    pub fn subscriber_count(source_id: SourceId) -> usize {
        get_dependencies()
            .read()
            .subscribers
            .get(&source_id)
            .map_or(0, IndexSet::len)
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify_signal_change(source_id: SourceId) {
        let mut effects_to_run: IndexMap<SubscriberId, Arc<dyn Reactive>> = IndexMap::new();
        Self::collect(source_id, &mut effects_to_run);

        if effects_to_run.is_empty() {
            return;
        }

        tracing::trace!(source = source_id.raw(), effects = effects_to_run.len(), "propagating write");

        for (_, effect) in effects_to_run {
            effect.schedule();
        }
    }

    fn collect(source_id: SourceId, effects: &mut IndexMap<SubscriberId, Arc<dyn Reactive>>) {
        let subscriber_ids: Vec<SubscriberId> = {
            let deps = get_dependencies().read();
            match deps.subscribers.get(&source_id) {
                Some(subs) => subs.iter().copied().collect(),
                None => return,
            }
        };

        let reactives: Vec<Arc<dyn Reactive>> = {
            let registry = get_registry().read();
            subscriber_ids
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        // No lock is held past this point: marking a computed cell re-enters
        // `collect` for its own dependents.
        for reactive in reactives {
            if let Some(derived) = reactive.mark_maybe_dirty() {
                Self::collect(derived, effects);
            }

            if reactive.is_eager() {
                effects.entry(reactive.subscriber_id()).or_insert(reactive);
            }
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Record a read of `source_id` by the currently running computation.
    pub(crate) fn track_read(source_id: SourceId) {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(source_id);
            Self::add_dependency(source_id, subscriber_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct MockReactive {
        id: SubscriberId,
        dirty: AtomicBool,
        scheduled: AtomicI32,
        eager: bool,
    }

    impl MockReactive {
        fn new(eager: bool) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                dirty: AtomicBool::new(false),
                scheduled: AtomicI32::new(0),
                eager,
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn mark_maybe_dirty(&self) -> Option<SourceId> {
            self.dirty.store(true, Ordering::SeqCst);
            None
        }

        fn schedule(&self) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }

        fn is_eager(&self) -> bool {
            self.eager
        }
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new(false);
        let id = reactive.id;

        let handle = Runtime::register(reactive);
        assert!(get_registry().read().contains_key(&id));

        drop(handle);
        assert!(!get_registry().read().contains_key(&id));
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let memo = MockReactive::new(false);
        let effect = MockReactive::new(true);

        let _memo_handle = Runtime::register(memo.clone());
        let _effect_handle = Runtime::register(effect.clone());

        let source = SourceId::next();
        Runtime::add_dependency(source, memo.id);
        Runtime::add_dependency(source, effect.id);

        Runtime::notify_signal_change(source);

        assert!(memo.dirty.load(Ordering::SeqCst));
        assert!(effect.dirty.load(Ordering::SeqCst));

        // Only the eager one is scheduled
        assert_eq!(memo.scheduled.load(Ordering::SeqCst), 0);
        assert_eq!(effect.scheduled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_dependencies_schedule_once() {
        let effect = MockReactive::new(true);
        let _handle = Runtime::register(effect.clone());

        let source = SourceId::next();
        Runtime::add_dependency(source, effect.id);
        Runtime::add_dependency(source, effect.id);
        assert_eq!(Runtime::subscriber_count(source), 1);

        Runtime::notify_signal_change(source);
        assert_eq!(effect.scheduled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runtime_clears_dependencies() {
        let reactive = MockReactive::new(false);
        let id = reactive.id;
        let _handle = Runtime::register(reactive.clone());

        let source = SourceId::next();
        Runtime::add_dependency(source, id);
        assert_eq!(Runtime::subscriber_count(source), 1);

        Runtime::clear_dependencies(id);
        assert_eq!(Runtime::subscriber_count(source), 0);
    }
}

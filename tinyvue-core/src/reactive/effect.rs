//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime re-runs the effect
//!    synchronously, inside the write that caused the change.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! Every DOM binding in a render pass is one effect. Disposing the effect is
//! the only way to stop it; a disposed effect never runs again.
//!
//! An effect whose body fails is fail-fast: the first run's error is returned
//! to the creator, a later run's error aborts that run and is logged.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};

type EffectResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type EffectFn = dyn Fn() -> EffectResult + Send + Sync;

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<EffectFn>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
    dependency_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) -> EffectResult {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }

        // A write to one of our own dependencies while we run would re-enter
        // us; the current run already observes the new value.
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        Runtime::clear_dependencies(self.subscriber_id);

        let result = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let result = (self.run)();
            self.dependency_count
                .store(ReactiveContext::get_dependencies().len(), Ordering::SeqCst);
            result
        };

        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        result
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) -> Option<SourceId> {
        None
    }

    fn schedule(&self) {
        if let Err(err) = self.execute() {
            tracing::error!(effect = self.subscriber_id.raw(), error = %err, "effect re-run failed");
        }
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use tinyvue_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let c = count.clone();
/// let effect = Effect::new(move || println!("Count is: {}", c.get()));
///
/// count.set(5); // prints "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(Box::new(move || -> EffectResult {
            run();
            Ok(())
        }));
        effect.inner.execute().ok();
        effect
    }

    /// Create an effect whose body can fail.
    ///
    /// The first run happens immediately and its error, if any, is returned.
    /// The effect is disposed in that case.
    pub fn try_new<F, E>(run: F) -> Result<Self, E>
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let failure: Arc<parking_lot::Mutex<Option<E>>> = Arc::new(parking_lot::Mutex::new(None));
        let slot = failure.clone();
        let first_run = Arc::new(AtomicBool::new(true));
        let is_first = first_run.clone();

        let effect = Self::build(Box::new(move || -> EffectResult {
            match run() {
                Ok(()) => Ok(()),
                Err(err) if is_first.load(Ordering::SeqCst) => {
                    *slot.lock() = Some(err);
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        }));

        effect.inner.execute().ok();
        first_run.store(false, Ordering::SeqCst);

        // Later failures are reported by `schedule`.
        if let Some(err) = failure.lock().take() {
            effect.dispose();
            return Err(err);
        }
        Ok(effect)
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(Box::new(move || -> EffectResult {
            run();
            Ok(())
        }))
    }

    fn build(run: Box<EffectFn>) -> Self {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run,
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            dependency_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function now.
    pub fn execute(&self) {
        self.inner.schedule();
    }

    /// Schedule the effect to re-run.
    ///
    /// Runs synchronously; there is no batching queue.
    pub fn schedule(&self) {
        self.inner.schedule();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        Runtime::clear_dependencies(self.inner.subscriber_id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id.raw())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicI32;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_signal_changes() {
        let signal = Signal::new(1);
        let seen = Arc::new(AtomicI32::new(0));

        let s = signal.clone();
        let seen_clone = seen.clone();
        let effect = Effect::new(move || {
            seen_clone.store(s.get(), Ordering::SeqCst);
        });

        signal.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let s = signal.clone();
        let run_count_clone = run_count.clone();
        let effect = Effect::new(move || {
            s.get();
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        effect.schedule();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let signal = Signal::new(0);
        let s = signal.clone();
        let effect = Effect::new(move || {
            let v = s.get();
            if v < 10 {
                s.set(v + 1);
            }
        });

        assert_eq!(signal.get_untracked(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropping_all_handles_stops_effect() {
        let signal = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let s = signal.clone();
        let c = run_count.clone();
        let effect = Effect::new(move || {
            s.get();
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(effect);

        signal.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_new_returns_first_error() {
        let result = Effect::try_new(|| Err(Boom));
        assert!(result.is_err());
    }

    #[test]
    fn try_new_logs_later_errors() {
        let signal = Signal::new(0);
        let s = signal.clone();
        let effect = Effect::try_new(move || if s.get() > 0 { Err(Boom) } else { Ok(()) })
            .expect("first run succeeds");

        signal.set(1);
        assert_eq!(effect.run_count(), 2);
        assert!(!effect.is_disposed());
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());
        assert_eq!(effect2.run_count(), 1);

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}

//! Reactive Primitives
//!
//! This module implements the signal layer the rest of the framework sits on:
//! signals, computed cells (memos), and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal registers
//! that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived, read-only value that caches its result and
//! re-evaluates lazily after one of its dependencies changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Every live DOM binding is an effect.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies and a process-wide runtime table for the edges.
//! Propagation is synchronous: a write returns after every dependent effect
//! has re-run. There is no batching.

mod context;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;

pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use memo::{computed, Memo, MemoState};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::{SourceId, SubscriberId};

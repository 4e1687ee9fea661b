//! Document Tree
//!
//! An in-memory document tree with the subset of the browser DOM the
//! directive engine drives: elements with attributes, inline style and a
//! `value` property, text and comment nodes, fragments, shadow roots, event
//! listeners and HTML fragment parsing/serialization. Deferred callback
//! queues stand in for animation frames and idle periods.

mod event;
mod html;
mod node;
mod scheduler;

pub use event::{Event, Listener, SYNTHETIC_MARKER};
pub use html::{decode_entities, parse_fragment};
pub use node::{CustomElement, Node, NodeType, WeakNode};
pub use scheduler::{
    flush, next_tick, pending, request_animation_frame, request_idle_callback, run_animation_frame,
    run_idle_callbacks,
};

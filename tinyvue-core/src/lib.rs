//! tinyVue Core
//!
//! This crate provides the runtime for tinyVue, a minimal reactive component
//! framework driven by Vue-style template directives. It implements:
//!
//! - Reactive primitives (signals, computed cells, effects)
//! - Reactive objects with transparent signal unwrapping
//! - A small expression language evaluated against reactive bindings
//! - A directive engine binding templates to an in-memory document tree
//! - A component host with explicit definition contexts
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `value`: The dynamic value model shared by bindings and expressions
//! - `proxy`: Reactive objects (auto-signal-backed mappings and sequences)
//! - `expr`: Expression lexer, parser and evaluator
//! - `dom`: Document tree, events, HTML parsing and deferred callbacks
//! - `render`: Directive engine and `render_template`
//! - `component`: Component registry, instances and definition context
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use tinyvue_core::{reactive, render_template, TemplateRefs, Value};
//!
//! let data = reactive([Value::object([
//!     ("items", Value::array([Value::from("a"), Value::from("b")])),
//!     ("open", Value::from(true)),
//! ])]);
//!
//! let view = render_template(
//!     r#"<ul v-show="open"><li v-for="item in items">{{ item }}</li></ul>"#,
//!     &data,
//!     &TemplateRefs::new(),
//!     Arc::new(HashSet::new()),
//! )
//! .unwrap()
//! .unwrap();
//!
//! assert_eq!(view.element().inner_html(), "<!----><li>a</li><li>b</li><li>{{ item }}</li>");
//!
//! // The list template leaves on the next animation frame.
//! tinyvue_core::dom::run_animation_frame();
//! assert_eq!(view.element().inner_html(), "<!----><li>a</li><li>b</li>");
//!
//! data.set("open", Value::from(false));
//! assert_eq!(view.element().style_property("display").as_deref(), Some("none"));
//! ```

pub mod component;
pub mod dom;
pub mod error;
pub mod expr;
pub mod proxy;
pub mod reactive;
pub mod render;
pub mod value;

pub use component::{ComponentContext, ComponentFactory, ComponentRegistry, Definition, Emitter};
pub use dom::{Event, Node};
pub use error::{ContextError, EvalError, ParseError, RenderError};
pub use expr::{evaluate_expression, Evaluator, Expression};
pub use proxy::{reactive, ReactiveObject, Slot};
pub use reactive::{computed, untracked, Effect, Memo, Signal};
pub use render::{render_template, CustomComponents, Disposer, RenderResult, TemplateRefs};
pub use value::{Function, Value};

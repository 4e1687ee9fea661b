//! Component Host
//!
//! Binds component definitions to elements. A definition is a closure run
//! once per element with an explicit [`ComponentContext`]; it typically
//! reads its props, sets up state and calls [`ComponentContext::render`].
//!
//! # How Components Work
//!
//! 1. [`ComponentRegistry::define`] records the definition under a tag name
//!    and returns a [`ComponentFactory`].
//!
//! 2. An element of a defined tag gets a component instance attached the
//!    first time the registry sees it (the factory, a parent template, or
//!    [`ComponentRegistry::connect`]).
//!
//! 3. Initialization runs the definition with the collected props. It
//!    happens once; later calls are no-ops. A parent template initializes
//!    its nested components synchronously with their props, while a plain
//!    `connect` defers to the next idle period with empty props.
//!
//! 4. Disposing the parent render pass, or `disconnect`, disposes the
//!    component's own render result.
//!
//! ```rust
//! use indexmap::IndexMap;
//! use tinyvue_core::{ComponentRegistry, Value};
//!
//! let registry = ComponentRegistry::new();
//! let greeting = registry.define("x-greeting", |ctx| {
//!     ctx.render("<p>Hello {{ who }}</p>", Value::object([("who", Value::from("there"))]))
//! });
//!
//! let element = greeting.create(IndexMap::new()).unwrap();
//! let shadow = element.shadow_root().unwrap();
//! assert_eq!(shadow.inner_html(), "<p>Hello there</p>");
//! ```

mod context;
mod instance;
mod registry;

pub use context::{ComponentContext, Emitter};
pub use registry::{ComponentFactory, ComponentRegistry, Definition};

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Directive Engine and Render Orchestrator
//!
//! [`render_template`] parses a template string into a detached tree, walks
//! it once attaching a live binding per directive, and hands back the first
//! element together with the template refs and a dispose handle.
//!
//! # How Rendering Works
//!
//! 1. The template is parsed into a scratch container element.
//!
//! 2. The engine walks the container depth-first over a snapshot of each
//!    child list. Text nodes with `{{ }}` get one effect each; elements have
//!    their attributes scanned in reverse order, each directive attaching an
//!    effect (or a listener) and then being stripped from the element.
//!
//! 3. `v-for` elements are handed to the list binding and their subtree is
//!    not walked: each rendered item walks its own clone.
//!
//! 4. Every effect's disposer lands in one flat list owned by the
//!    [`RenderResult`]. Disposing it stops every binding of the pass,
//!    including current list items and nested components.
//!
//! Effects run synchronously. An expression failing on the first run fails
//! the render; a failure on a later re-run aborts that re-run and is logged.

mod directives;
mod engine;
mod list;
mod refs;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dom::Node;
use crate::error::RenderError;
use crate::proxy::ReactiveObject;
use crate::reactive::Effect;

pub use refs::TemplateRefs;

use engine::Engine;

/// Tears down one live binding. Runs at most once.
pub struct Disposer(Box<dyn FnOnce() + Send + Sync>);

impl Disposer {
    pub fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self(Box::new(dispose))
    }

    /// Dispose `effect` when run. The disposer keeps the effect alive.
    pub fn effect(effect: Effect) -> Self {
        Self::new(move || effect.dispose())
    }

    pub fn dispose(self) {
        (self.0)()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer")
    }
}

/// The set of tag names rendered as nested custom components.
pub trait CustomComponents: Send + Sync {
    fn contains(&self, tag: &str) -> bool;

    /// Attach component behaviour to a freshly parsed element of a
    /// registered tag. Sets that only know names leave elements as they are.
    fn upgrade(&self, _element: &Node) {}
}

impl CustomComponents for HashSet<String> {
    fn contains(&self, tag: &str) -> bool {
        HashSet::contains(self, tag)
    }
}

/// A live-bound subtree.
pub struct RenderResult {
    element: Node,
    refs: TemplateRefs,
    disposers: Mutex<Vec<Disposer>>,
    disposed: AtomicBool,
}

impl RenderResult {
    /// The template's first element, detached from the scratch container.
    pub fn element(&self) -> &Node {
        &self.element
    }

    pub fn refs(&self) -> &TemplateRefs {
        &self.refs
    }

    /// Stop every binding created by the render pass. Idempotent.
    ///
    /// Nodes stay where they are; they simply stop updating.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let disposers = std::mem::take(&mut *self.disposers.lock());
        tracing::debug!(bindings = disposers.len(), "disposing render result");
        for disposer in disposers {
            disposer.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderResult")
            .field("element", &self.element)
            .field("bindings", &self.disposers.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Render `template` against `bindings`.
///
/// Returns `Ok(None)` when the template holds no element (empty or text
/// only). `refs` receives every `ref="..."` element; `components` decides
/// which tags are nested custom components.
///
/// # Example
///
/// ```rust
/// use std::collections::HashSet;
/// use std::sync::Arc;
/// use tinyvue_core::{reactive, render_template, TemplateRefs, Value};
///
/// let data = reactive([Value::object([("name", Value::from("World"))])]);
/// let result = render_template(
///     "<p>Hello {{ name }}</p>",
///     &data,
///     &TemplateRefs::new(),
///     Arc::new(HashSet::new()),
/// )
/// .unwrap()
/// .unwrap();
///
/// assert_eq!(result.element().outer_html(), "<p>Hello World</p>");
/// data.set("name", "Rust".into());
/// assert_eq!(result.element().text_content(), "Hello Rust");
/// ```
pub fn render_template(
    template: &str,
    bindings: &ReactiveObject,
    refs: &TemplateRefs,
    components: Arc<dyn CustomComponents>,
) -> Result<Option<RenderResult>, RenderError> {
    let container = Node::element("div");
    container.set_inner_html(template)?;

    let engine = Engine::new(bindings.clone(), refs.clone(), components);
    let disposers = engine.render_children(&container)?;

    let Some(element) = container.first_element_child() else {
        tracing::debug!("template produced no element");
        for disposer in disposers {
            disposer.dispose();
        }
        return Ok(None);
    };
    element.remove();

    tracing::debug!(
        root = ?element,
        bindings = disposers.len(),
        "rendered template"
    );

    Ok(Some(RenderResult {
        element,
        refs: refs.clone(),
        disposers: Mutex::new(disposers),
        disposed: AtomicBool::new(false),
    }))
}

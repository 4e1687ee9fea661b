//! The explicit definition context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dom::{Event, Node, WeakNode};
use crate::error::{ContextError, EvalError, RenderError};
use crate::proxy::{reactive, ReactiveObject};
use crate::reactive::Signal;
use crate::render::{render_template, CustomComponents, RenderResult, TemplateRefs};
use crate::value::Value;

/// Handle passed to a component definition.
///
/// The helpers only work while the definition call is running. A clone kept
/// past that point fails with [`ContextError::OutsideDefinition`].
#[derive(Clone)]
pub struct ComponentContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    component: String,
    host: WeakNode,
    props: ReactiveObject,
    refs: TemplateRefs,
    components: Arc<dyn CustomComponents>,
    active: AtomicBool,
    rendered: Mutex<Option<RenderResult>>,
    has_rendered: AtomicBool,
}

impl ComponentContext {
    pub(crate) fn open(
        component: &str,
        host: &Node,
        props: ReactiveObject,
        refs: TemplateRefs,
        components: Arc<dyn CustomComponents>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                component: component.to_string(),
                host: host.downgrade(),
                props,
                refs,
                components,
                active: AtomicBool::new(true),
                rendered: Mutex::new(None),
                has_rendered: AtomicBool::new(false),
            }),
        }
    }

    /// End the definition call and hand back what it rendered.
    pub(crate) fn close(&self) -> Option<RenderResult> {
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.rendered.lock().take()
    }

    fn ensure_active(&self, helper: &'static str) -> Result<(), ContextError> {
        if self.inner.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ContextError::OutsideDefinition { helper })
        }
    }

    pub fn component_name(&self) -> &str {
        &self.inner.component
    }

    /// Render `template` into the host's shadow root.
    ///
    /// The template sees `bindings` layered with the component's props;
    /// props win on a name clash. A component renders at most once.
    pub fn render(&self, template: &str, bindings: impl Into<Value>) -> Result<(), RenderError> {
        self.ensure_active("render")?;
        if self.inner.has_rendered.swap(true, Ordering::SeqCst) {
            return Err(ContextError::AlreadyRendered {
                component: self.inner.component.clone(),
            }
            .into());
        }
        let host = self.host()?;

        let all = reactive([bindings.into(), Value::Reactive(self.inner.props.clone())]);
        let result = render_template(template, &all, &self.inner.refs, self.inner.components.clone())?;

        match result {
            Some(result) => {
                host.attach_shadow().append_child(result.element());
                *self.inner.rendered.lock() = Some(result);
            }
            None => tracing::debug!(component = %self.inner.component, "component template rendered nothing"),
        }
        Ok(())
    }

    /// The component's props object. Values passed as computed props stay
    /// live.
    pub fn props(&self) -> Result<ReactiveObject, ContextError> {
        self.ensure_active("props")?;
        Ok(self.inner.props.clone())
    }

    /// An emitter for synthetic events on the host element.
    pub fn define_emits(&self) -> Result<Emitter, ContextError> {
        self.ensure_active("define_emits")?;
        Ok(Emitter {
            host: self.inner.host.clone(),
        })
    }

    /// The signal that will hold the element(s) marked `ref="name"`.
    pub fn use_template_ref(&self, name: &str) -> Result<Signal<Value>, ContextError> {
        self.ensure_active("use_template_ref")?;
        Ok(self.inner.refs.use_ref(name))
    }

    /// The element this component is attached to.
    pub fn host(&self) -> Result<Node, ContextError> {
        self.ensure_active("host")?;
        self.inner
            .host
            .upgrade()
            .ok_or(ContextError::OutsideDefinition { helper: "host" })
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("component", &self.inner.component)
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .finish()
    }
}

/// Dispatches `{ tinyVue: true, args }` events on a component's host.
///
/// Obtained during the definition; usable for the component's lifetime.
#[derive(Clone, Debug)]
pub struct Emitter {
    host: WeakNode,
}

impl Emitter {
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<(), EvalError> {
        match self.host.upgrade() {
            Some(host) => host.dispatch_event(Event::custom(event, args)),
            None => {
                tracing::trace!(event, "emit on a dropped component");
                Ok(())
            }
        }
    }
}

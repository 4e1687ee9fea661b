//! Per-element component state.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ComponentContext;
use super::registry::Definition;
use crate::dom::{CustomElement, WeakNode};
use crate::error::RenderError;
use crate::proxy::{reactive, ReactiveObject};
use crate::render::{CustomComponents, RenderResult, TemplateRefs};
use crate::value::Value;

/// One component attached to one element.
pub(crate) struct ComponentInstance {
    name: String,
    definition: Definition,
    components: Arc<dyn CustomComponents>,
    host: WeakNode,
    state: Mutex<InstanceState>,
}

#[derive(Default)]
struct InstanceState {
    initialized: bool,
    props: Option<ReactiveObject>,
    rendered: Option<RenderResult>,
    refs: TemplateRefs,
}

impl ComponentInstance {
    pub(crate) fn new(
        name: &str,
        definition: Definition,
        components: Arc<dyn CustomComponents>,
        host: WeakNode,
    ) -> Self {
        Self {
            name: name.to_string(),
            definition,
            components,
            host,
            state: Mutex::new(InstanceState::default()),
        }
    }
}

impl CustomElement for ComponentInstance {
    fn initialize(&self, props: IndexMap<String, Value>) -> Result<(), RenderError> {
        let Some(host) = self.host.upgrade() else {
            tracing::warn!(component = %self.name, "host element dropped before initialization");
            return Ok(());
        };

        let (props, refs) = {
            let mut state = self.state.lock();
            if state.initialized {
                // Moving an initialized element re-enters here; nothing to redo.
                tracing::trace!(component = %self.name, "component already initialized");
                return Ok(());
            }
            state.initialized = true;
            let props = reactive([Value::Object(Arc::new(props))]);
            state.props = Some(props.clone());
            (props, state.refs.clone())
        };

        tracing::debug!(component = %self.name, "initializing component");
        let context = ComponentContext::open(&self.name, &host, props, refs, self.components.clone());
        let outcome = (self.definition)(&context);
        let rendered = context.close();

        if let Some(rendered) = rendered {
            self.state.lock().rendered = Some(rendered);
        }
        outcome
    }

    fn props(&self) -> Option<ReactiveObject> {
        self.state.lock().props.clone()
    }

    fn dispose(&self) {
        let rendered = self.state.lock().rendered.take();
        if let Some(rendered) = rendered {
            tracing::debug!(component = %self.name, "disposing component");
            rendered.dispose();
        }
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ComponentInstance")
            .field("name", &self.name)
            .field("initialized", &state.initialized)
            .field("rendered", &state.rendered.is_some())
            .finish()
    }
}

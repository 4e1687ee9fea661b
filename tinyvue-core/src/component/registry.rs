//! Component definitions by tag name.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::context::ComponentContext;
use super::instance::ComponentInstance;
use crate::dom::{request_idle_callback, Node};
use crate::error::RenderError;
use crate::render::CustomComponents;
use crate::value::Value;

/// A component definition: runs once per element, with that element's
/// context.
pub type Definition = Arc<dyn Fn(&ComponentContext) -> Result<(), RenderError> + Send + Sync>;

/// Registered components. Clones share the same table.
///
/// The registry is also the component set handed to every render pass its
/// components perform, so nested tags resolve against it.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    definitions: Arc<RwLock<IndexMap<String, Definition>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` under `name` (case-insensitive) and return a
    /// factory for it. Redefining a name replaces the old definition for
    /// elements upgraded afterwards.
    pub fn define<F>(&self, name: &str, definition: F) -> ComponentFactory
    where
        F: Fn(&ComponentContext) -> Result<(), RenderError> + Send + Sync + 'static,
    {
        let name = name.to_ascii_lowercase();
        let previous = self.definitions.write().insert(name.clone(), Arc::new(definition));
        if previous.is_some() {
            tracing::warn!(component = %name, "component redefined");
        } else {
            tracing::debug!(component = %name, "component defined");
        }
        ComponentFactory {
            name,
            registry: self.clone(),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.read().contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    fn definition(&self, name: &str) -> Option<Definition> {
        self.definitions.read().get(name).cloned()
    }

    /// Create an element for `name` and initialize it right away.
    pub fn create(&self, name: &str, props: IndexMap<String, Value>) -> Result<Node, RenderError> {
        let element = Node::element(name);
        let tag = element.local_name().unwrap_or_default();
        self.upgrade(&element);
        let component = element
            .custom_element()
            .ok_or(RenderError::UnknownComponent { name: tag })?;
        component.initialize(props)?;
        Ok(element)
    }

    /// The element entered a document: initialize it with empty props on
    /// the next idle period.
    ///
    /// Elements created by a parent template are initialized with their
    /// props synchronously during the parent's render, so by the time this
    /// runs they are already initialized and it does nothing.
    pub fn connect(&self, element: &Node) {
        self.upgrade(element);
        let element = element.clone();
        request_idle_callback(move || {
            let Some(component) = element.custom_element() else {
                return;
            };
            if let Err(err) = component.initialize(IndexMap::new()) {
                tracing::error!(element = ?element, error = %err, "deferred component initialization failed");
            }
        });
    }

    /// The element left the document: tear down its render result.
    pub fn disconnect(&self, element: &Node) {
        if let Some(component) = element.custom_element() {
            component.dispose();
        }
    }
}

impl CustomComponents for ComponentRegistry {
    fn contains(&self, tag: &str) -> bool {
        self.is_defined(tag)
    }

    fn upgrade(&self, element: &Node) {
        if element.custom_element().is_some() {
            return;
        }
        let Some(tag) = element.local_name() else {
            return;
        };
        let Some(definition) = self.definition(&tag) else {
            return;
        };
        let instance = ComponentInstance::new(&tag, definition, Arc::new(self.clone()), element.downgrade());
        element.set_custom_element(Arc::new(instance));
        tracing::trace!(component = %tag, "upgraded element");
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.definitions.read().keys()).finish()
    }
}

/// Creates initialized elements of one component.
#[derive(Clone, Debug)]
pub struct ComponentFactory {
    name: String,
    registry: ComponentRegistry,
}

impl ComponentFactory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create(&self, props: IndexMap<String, Value>) -> Result<Node, RenderError> {
        self.registry.create(&self.name, props)
    }
}

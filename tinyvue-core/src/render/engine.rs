//! Tree walk and per-element directive dispatch.

use std::sync::Arc;

use super::directives::{self, CollectedProps};
use super::list;
use super::{CustomComponents, Disposer, TemplateRefs};
use crate::dom::{Node, NodeType};
use crate::error::RenderError;
use crate::proxy::ReactiveObject;
use crate::value::Value;

/// What a render pass carries down the tree.
#[derive(Clone)]
pub(crate) struct Engine {
    pub(crate) bindings: ReactiveObject,
    pub(crate) refs: TemplateRefs,
    pub(crate) components: Arc<dyn CustomComponents>,
}

impl Engine {
    pub(crate) fn new(bindings: ReactiveObject, refs: TemplateRefs, components: Arc<dyn CustomComponents>) -> Self {
        Self {
            bindings,
            refs,
            components,
        }
    }

    /// Same refs and components, different bindings (a list item's layer).
    pub(crate) fn with_bindings(&self, bindings: ReactiveObject) -> Self {
        Self {
            bindings,
            ..self.clone()
        }
    }

    /// Walk the children of `parent` depth-first, binding every directive.
    ///
    /// The child list is snapshotted first: bindings move and detach nodes
    /// while the walk is in progress.
    pub(crate) fn render_children(&self, parent: &Node) -> Result<Vec<Disposer>, RenderError> {
        let mut disposers = Vec::new();
        for child in parent.children() {
            match child.node_type() {
                NodeType::Text => disposers.extend(directives::bind_text(&child, &self.bindings)?),
                NodeType::Element => {
                    // Each item renders its own clone, so the template's
                    // subtree is not walked here.
                    if let Some(expression) = child.remove_attribute("v-for") {
                        disposers.push(list::bind_list(self, &child, &expression)?);
                        continue;
                    }
                    self.bind_element(&child, &mut disposers)?;
                    disposers.extend(self.render_children(&child)?);
                }
                _ => {}
            }
        }
        Ok(disposers)
    }

    /// Bind the directive attributes of one element, last attribute first,
    /// stripping each one handled. Then initialize it if it is a component.
    fn bind_element(&self, element: &Node, disposers: &mut Vec<Disposer>) -> Result<(), RenderError> {
        let tag = element.local_name().unwrap_or_default();
        let is_component = self.components.contains(&tag);
        if is_component {
            self.components.upgrade(element);
        }
        let props = CollectedProps::default();
        let bindings = &self.bindings;

        for (name, value) in element.attributes().into_iter().rev() {
            match name.as_str() {
                "v-if" => disposers.extend(directives::bind_if_chain(element, &value, bindings)?),
                // Consumed by the `v-if` that heads the chain.
                "v-else-if" | "v-else" => {}
                "v-show" => disposers.push(directives::bind_show(element, &value, bindings)?),
                "v-hide" => disposers.push(directives::bind_show(element, &format!("!({value})"), bindings)?),
                "v-model" if is_component => directives::bind_component_model(element, &value, bindings, &props)?,
                "v-model" => disposers.push(directives::bind_model(element, &value, bindings)?),
                "v-bind" => {
                    let target = is_component.then(|| props.clone());
                    disposers.push(directives::bind_spread(element, &value, bindings, target)?);
                }
                "ref" => self.refs.record(&value, element),
                event if event.starts_with('@') => directives::bind_event(element, &event[1..], &value, bindings),
                attribute if attribute.starts_with(':') || attribute == "v-html" => {
                    let attribute = attribute.strip_prefix(':').unwrap_or(attribute);
                    if is_component {
                        let memo = directives::prop_memo(&value, bindings)?;
                        props.lock().insert(attribute.to_string(), Value::Computed(memo));
                    } else {
                        disposers.push(directives::bind_attribute(element, attribute, &value, bindings)?);
                    }
                }
                _ => continue,
            }
            element.remove_attribute(&name);
        }

        if is_component {
            self.initialize_component(element, &tag, props, disposers)?;
        }
        Ok(())
    }

    fn initialize_component(
        &self,
        element: &Node,
        tag: &str,
        props: CollectedProps,
        disposers: &mut Vec<Disposer>,
    ) -> Result<(), RenderError> {
        let Some(component) = element.custom_element() else {
            tracing::warn!(tag, "custom component element has no behaviour attached");
            return Ok(());
        };
        let props = std::mem::take(&mut *props.lock());
        tracing::debug!(tag, props = props.len(), "initializing nested component");
        component.initialize(props)?;
        disposers.push(Disposer::new(move || component.dispose()));
        Ok(())
    }
}

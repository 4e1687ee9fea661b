//! Template refs.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::dom::Node;
use crate::reactive::Signal;
use crate::value::Value;

/// Named element handles collected from `ref="name"` attributes.
///
/// Each name maps to a signal. The first element recorded under a name is
/// stored as a node; a second one turns the slot into an array of nodes.
/// Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct TemplateRefs {
    slots: Arc<RwLock<IndexMap<String, Signal<Value>>>>,
}

impl TemplateRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal for `name`, created empty if nothing claimed it yet.
    pub fn use_ref(&self, name: &str) -> Signal<Value> {
        if let Some(signal) = self.get(name) {
            return signal;
        }
        self.slots
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Signal::new(Value::Undefined))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Signal<Value>> {
        self.slots.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Record `node` under `name`.
    pub(crate) fn record(&self, name: &str, node: &Node) {
        let signal = self.use_ref(name);
        let next = match signal.get_untracked() {
            Value::Undefined => Value::Node(node.clone()),
            Value::Array(items) => {
                let mut items = items.as_ref().clone();
                items.push(Value::Node(node.clone()));
                Value::from(items)
            }
            single => Value::array([single, Value::Node(node.clone())]),
        };
        tracing::trace!(name, "recorded template ref");
        signal.set(next);
    }
}

impl std::fmt::Debug for TemplateRefs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.slots.read().keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_stores_the_node() {
        let refs = TemplateRefs::new();
        let node = Node::element("input");
        refs.record("field", &node);

        let stored = refs.get("field").unwrap().get();
        assert!(stored.as_node().unwrap().ptr_eq(&node));
    }

    #[test]
    fn repeated_names_promote_to_an_array() {
        let refs = TemplateRefs::new();
        let (a, b, c) = (Node::element("li"), Node::element("li"), Node::element("li"));
        refs.record("item", &a);
        refs.record("item", &b);
        refs.record("item", &c);

        let items = refs.get("item").unwrap().get().as_sequence().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[2].as_node().unwrap().ptr_eq(&c));
    }

    #[test]
    fn use_ref_hands_out_the_same_signal() {
        let refs = TemplateRefs::new();
        let early = refs.use_ref("panel");
        assert!(early.get().is_undefined());

        let node = Node::element("div");
        refs.record("panel", &node);
        assert!(early.get().as_node().is_some());
        assert!(early.ptr_eq(&refs.use_ref("panel")));
        assert_eq!(refs.names(), vec!["panel".to_string()]);
    }
}

//! Events.

use std::sync::Arc;

use super::node::Node;
use crate::error::EvalError;
use crate::value::Value;

/// Listener callback. An error aborts the dispatch and is returned to the
/// dispatcher.
pub type Listener = Arc<dyn Fn(&Event) -> Result<(), EvalError> + Send + Sync>;

/// Marker key in the detail of component-to-component events.
pub const SYNTHETIC_MARKER: &str = "tinyVue";

/// A dispatched event: a type, an arbitrary detail payload and the node it
/// was dispatched on.
#[derive(Clone, Debug)]
pub struct Event {
    event_type: String,
    detail: Value,
    target: Option<Node>,
}

impl Event {
    pub fn new(event_type: &str) -> Self {
        Self::with_detail(event_type, Value::Undefined)
    }

    pub fn with_detail(event_type: &str, detail: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            detail,
            target: None,
        }
    }

    /// A synthetic component event carrying positional arguments:
    /// `{ tinyVue: true, args: [...] }`.
    pub fn custom(event_type: &str, args: Vec<Value>) -> Self {
        Self::with_detail(
            event_type,
            Value::object([
                (SYNTHETIC_MARKER, Value::Bool(true)),
                ("args", Value::from(args)),
            ]),
        )
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn target(&self) -> Option<&Node> {
        self.target.as_ref()
    }

    pub(crate) fn with_target(mut self, target: Node) -> Self {
        self.target = Some(target);
        self
    }

    /// Positional arguments when this is a synthetic component event.
    pub fn synthetic_args(&self) -> Option<Vec<Value>> {
        let Value::Object(detail) = &self.detail else {
            return None;
        };
        if !detail.get(SYNTHETIC_MARKER).is_some_and(Value::is_truthy) {
            return None;
        }
        Some(
            detail
                .get("args")
                .and_then(Value::as_sequence)
                .unwrap_or_default(),
        )
    }

    /// The event as a plain object, as handlers see it in expressions.
    pub fn to_value(&self) -> Value {
        Value::object([
            ("type", Value::from(self.event_type.as_str())),
            ("detail", self.detail.clone()),
            (
                "target",
                self.target.clone().map(Value::Node).unwrap_or(Value::Null),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_events_carry_marked_args() {
        let event = Event::custom("select", vec![Value::from(1), Value::from("a")]);
        assert_eq!(
            event.synthetic_args(),
            Some(vec![Value::from(1), Value::from("a")])
        );
    }

    #[test]
    fn plain_events_have_no_synthetic_args() {
        assert_eq!(Event::new("click").synthetic_args(), None);
        let spoofed = Event::with_detail("x", Value::object([("args", Value::array([]))]));
        assert_eq!(spoofed.synthetic_args(), None);
    }

    #[test]
    fn event_value_exposes_target() {
        let node = Node::element("input");
        node.set_value("typed");
        let event = Event::new("input").with_target(node);
        let value = event.to_value();
        let target = value.as_entries().unwrap()[2].1.clone();
        assert_eq!(target.as_node().unwrap().value(), "typed");
    }
}

//! Single-node directive bindings.
//!
//! Each function attaches one live binding to one node and returns what
//! tears it down. Effects come from [`Effect::try_new`], so a failing first
//! evaluation surfaces to the render call.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::Disposer;
use crate::dom::{Event, Node};
use crate::error::{EvalError, ParseError, RenderError};
use crate::expr::{evaluate_expression, Evaluator};
use crate::proxy::ReactiveObject;
use crate::reactive::{computed, untracked, Effect, Memo};
use crate::value::Value;

/// Props gathered for a nested component before it is initialized.
pub(crate) type CollectedProps = Arc<Mutex<IndexMap<String, Value>>>;

pub(crate) const MODEL_UPDATE: &str = "update:modelValue";

// ---- Text ----

/// Split `text` on `{{ expr }}` markers into literal pieces and expression
/// sources. There is always one more literal than expression.
fn split_interpolations(text: &str) -> (Vec<String>, Vec<String>) {
    let mut literals = Vec::new();
    let mut expressions = Vec::new();
    let mut rest = text;
    let mut literal = String::new();

    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        literal.push_str(&rest[..open]);
        literals.push(std::mem::take(&mut literal));
        expressions.push(after[..close].to_string());
        rest = &after[close + 2..];
    }
    literal.push_str(rest);
    literals.push(literal);
    (literals, expressions)
}

/// Bind a text node containing interpolations. One effect per node.
pub(crate) fn bind_text(node: &Node, bindings: &ReactiveObject) -> Result<Option<Disposer>, RenderError> {
    let text = node.text_content();
    if !text.contains("{{") {
        return Ok(None);
    }
    let (literals, sources) = split_interpolations(&text);
    if sources.is_empty() {
        return Ok(None);
    }
    let evaluators = sources
        .iter()
        .map(|source| evaluate_expression(source, bindings))
        .collect::<Result<Vec<Evaluator>, ParseError>>()?;

    let target = node.clone();
    let effect = Effect::try_new(move || -> Result<(), EvalError> {
        let mut rendered = literals[0].clone();
        for (evaluator, literal) in evaluators.iter().zip(&literals[1..]) {
            rendered.push_str(&evaluator()?.to_text());
            rendered.push_str(literal);
        }
        target.set_text_content(&rendered);
        Ok(())
    })?;
    Ok(Some(Disposer::effect(effect)))
}

// ---- Conditionals ----

/// Keep `node` in the tree only while `condition` is truthy. A comment
/// marker inserted before the node remembers where it goes back.
pub(crate) fn bind_if(node: &Node, condition: &str, bindings: &ReactiveObject) -> Result<Disposer, RenderError> {
    let evaluator = evaluate_expression(condition, bindings)?;
    let marker = Node::comment("");
    node.before(&marker);

    let target = node.clone();
    let effect = Effect::try_new(move || -> Result<(), EvalError> {
        if evaluator()?.is_truthy() {
            marker.after(&target);
        } else {
            target.remove();
        }
        Ok(())
    })?;
    Ok(Disposer::effect(effect))
}

/// Bind a `v-if` and the `v-else-if` / `v-else` siblings that follow it.
///
/// Each later branch is guarded by the negation of every earlier condition,
/// so `a`, `b`, else becomes `a`, `!(a)&&(b)`, `!(a)&&!(b)`.
pub(crate) fn bind_if_chain(
    node: &Node,
    condition: &str,
    bindings: &ReactiveObject,
) -> Result<Vec<Disposer>, RenderError> {
    // Siblings are found before any binding can detach the node.
    let mut next = node.next_element_sibling();
    let mut disposers = vec![bind_if(node, condition, bindings)?];
    let mut negated = vec![format!("!({condition})")];

    while let Some(sibling) = next.take() {
        match sibling.get_attribute("v-else-if") {
            Some(branch) => {
                next = sibling.next_element_sibling();
                let guarded = format!("{}&&({branch})", negated.join("&&"));
                disposers.push(bind_if(&sibling, &guarded, bindings)?);
                negated.push(format!("!({branch})"));
            }
            None => {
                if sibling.has_attribute("v-else") {
                    disposers.push(bind_if(&sibling, &negated.join("&&"), bindings)?);
                }
            }
        }
    }
    Ok(disposers)
}

/// Toggle inline `display: none` without touching the node's placement.
pub(crate) fn bind_show(node: &Node, condition: &str, bindings: &ReactiveObject) -> Result<Disposer, RenderError> {
    let evaluator = evaluate_expression(condition, bindings)?;
    let target = node.clone();
    let effect = Effect::try_new(move || -> Result<(), EvalError> {
        let display = if evaluator()?.is_truthy() { "" } else { "none" };
        target.set_style_property("display", display);
        Ok(())
    })?;
    Ok(Disposer::effect(effect))
}

// ---- Attributes ----

/// Bind `:name` (or `v-html` / `value`) on a plain element.
///
/// A static value already present under `name` is kept in front of the
/// dynamic one.
pub(crate) fn bind_attribute(
    node: &Node,
    name: &str,
    expression: &str,
    bindings: &ReactiveObject,
) -> Result<Disposer, RenderError> {
    let evaluator = evaluate_expression(expression, bindings)?;
    let prefix = match node.get_attribute(name) {
        Some(existing) if !existing.is_empty() && name != "v-html" && name != "value" => {
            format!("{existing} ")
        }
        _ => String::new(),
    };

    let target = node.clone();
    let name = name.to_string();
    let effect = Effect::try_new(move || -> Result<(), RenderError> {
        let value = evaluator()?;
        apply_attribute(&target, &name, &prefix, &value)
    })?;
    Ok(Disposer::effect(effect))
}

fn apply_attribute(node: &Node, name: &str, prefix: &str, value: &Value) -> Result<(), RenderError> {
    match name {
        "v-html" => node.set_inner_html(&value.to_text())?,
        "value" => node.set_value(value.to_text()),
        _ => node.set_attribute(name, format!("{prefix}{}", value.to_attribute_value())),
    }
    Ok(())
}

/// A computed prop for a nested component.
///
/// The expression is evaluated once up front so a broken prop fails the
/// render instead of the child's first read.
pub(crate) fn prop_memo(expression: &str, bindings: &ReactiveObject) -> Result<Memo<Value>, RenderError> {
    let evaluator = evaluate_expression(expression, bindings)?;
    untracked(|| evaluator())?;

    let source = expression.to_string();
    Ok(computed(move || {
        evaluator().unwrap_or_else(|err| {
            tracing::error!(expression = %source, error = %err, "prop expression failed");
            Value::Undefined
        })
    }))
}

/// `v-bind="expr"`: spread an object's entries.
///
/// Plain elements get attributes. A custom component gets props: written
/// into its live props once it is initialized, collected for its
/// initialization before that.
pub(crate) fn bind_spread(
    node: &Node,
    expression: &str,
    bindings: &ReactiveObject,
    component_props: Option<CollectedProps>,
) -> Result<Disposer, RenderError> {
    let evaluator = evaluate_expression(expression, bindings)?;
    let target = node.clone();
    let effect = Effect::try_new(move || -> Result<(), RenderError> {
        let entries = evaluator()?.as_entries().unwrap_or_default();
        let Some(collected) = &component_props else {
            for (key, value) in &entries {
                apply_attribute(&target, key, "", value)?;
            }
            return Ok(());
        };
        match target.custom_element().and_then(|component| component.props()) {
            Some(live) => {
                for (key, value) in entries {
                    live.set(&key, value);
                }
            }
            None => collected.lock().extend(entries),
        }
        Ok(())
    })?;
    Ok(Disposer::effect(effect))
}

// ---- Events ----

/// `@event="handler"`: call `bindings[handler]` when the event fires.
///
/// Synthetic component events pass their positional args; anything else
/// passes the event itself.
pub(crate) fn bind_event(node: &Node, event_type: &str, handler: &str, bindings: &ReactiveObject) {
    let bindings = bindings.clone();
    let handler = handler.trim().to_string();
    node.add_event_listener(event_type, move |event| {
        let callback = untracked(|| {
            bindings
                .contains_key(&handler)
                .then(|| bindings.get(&handler).resolve())
        });
        let Some(Value::Function(callback)) = callback else {
            tracing::warn!(handler = %handler, event = event.event_type(), "no handler function bound for event");
            return Ok(());
        };
        let args = event
            .synthetic_args()
            .unwrap_or_else(|| vec![event.to_value()]);
        callback.call(&args).map(drop)
    });
}

// ---- Two-way binding ----

/// `v-model="key"` on a plain element: the value property follows
/// `bindings[key]` and typed input writes back.
///
/// After writing back, an `update:modelValue` event is sent to the host of
/// the shadow tree the element lives in, so a parent using `v-model` on that
/// component hears about it.
pub(crate) fn bind_model(node: &Node, key: &str, bindings: &ReactiveObject) -> Result<Disposer, RenderError> {
    let disposer = bind_attribute(node, "value", key, bindings)?;
    listen_for_model(node, "input", key, bindings, |event| {
        event.target().map(|target| Value::from(target.value())).unwrap_or_default()
    });
    Ok(disposer)
}

/// `v-model="key"` on a custom component: a `modelValue` prop plus a
/// listener for the component's `update:modelValue` event.
pub(crate) fn bind_component_model(
    node: &Node,
    key: &str,
    bindings: &ReactiveObject,
    props: &CollectedProps,
) -> Result<(), RenderError> {
    let memo = prop_memo(key, bindings)?;
    props.lock().insert("modelValue".to_string(), Value::Computed(memo));
    listen_for_model(node, MODEL_UPDATE, key, bindings, |event| {
        event
            .synthetic_args()
            .and_then(|args| args.into_iter().next())
            .unwrap_or_default()
    });
    Ok(())
}

fn listen_for_model<F>(node: &Node, event_type: &str, key: &str, bindings: &ReactiveObject, read: F)
where
    F: Fn(&Event) -> Value + Send + Sync + 'static,
{
    let bindings = bindings.clone();
    let key = key.trim().to_string();
    let element = node.downgrade();
    node.add_event_listener(event_type, move |event| {
        let value = read(event);
        bindings.set(&key, value.clone());

        let host = element.upgrade().and_then(|element| element.root_node().host());
        match host {
            Some(host) => host.dispatch_event(Event::custom(MODEL_UPDATE, vec![value])),
            None => Ok(()),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::reactive;

    fn data() -> ReactiveObject {
        reactive([Value::object([
            ("name", Value::from("Ada")),
            ("visible", Value::from(true)),
            ("count", Value::from(1)),
        ])])
    }

    #[test]
    fn splits_literals_around_markers() {
        let (literals, sources) = split_interpolations("a {{ x }} b {{y}}");
        assert_eq!(literals, vec!["a ", " b ", ""]);
        assert_eq!(sources, vec![" x ", "y"]);

        let (literals, sources) = split_interpolations("open {{ never closed");
        assert_eq!(literals, vec!["open {{ never closed"]);
        assert!(sources.is_empty());
    }

    #[test]
    fn text_binding_follows_its_dependencies() {
        let data = data();
        let node = Node::text("Hi {{ name }} x{{ count }}");
        let disposer = bind_text(&node, &data).unwrap().unwrap();
        assert_eq!(node.text_content(), "Hi Ada x1");

        data.set("count", Value::from(2));
        assert_eq!(node.text_content(), "Hi Ada x2");

        disposer.dispose();
        data.set("name", Value::from("Bob"));
        assert_eq!(node.text_content(), "Hi Ada x2");
    }

    #[test]
    fn plain_text_needs_no_binding() {
        assert!(bind_text(&Node::text("static"), &data()).unwrap().is_none());
    }

    #[test]
    fn first_run_errors_fail_the_binding() {
        let node = Node::text("{{ missing.field }}");
        let err = bind_text(&node, &data()).unwrap_err();
        assert!(matches!(err, RenderError::Eval(EvalError::UndefinedIdentifier { .. })));
    }

    #[test]
    fn show_toggles_display_only() {
        let data = data();
        let parent = Node::element("div");
        let node = Node::element("span");
        parent.append_child(&node);

        let _show = bind_show(&node, "visible", &data).unwrap();
        assert_eq!(node.style_property("display"), None);

        data.set("visible", Value::from(false));
        assert_eq!(node.style_property("display").as_deref(), Some("none"));
        assert!(node.parent().is_some());
    }

    #[test]
    fn dynamic_attribute_keeps_static_prefix() {
        let data = reactive([Value::object([(
            "classes",
            Value::object([("active", Value::from(true)), ("hidden", Value::from(false))]),
        )])]);
        let node = Node::element("div");
        node.set_attribute("class", "card");

        let _binding = bind_attribute(&node, "class", "classes", &data).unwrap();
        assert_eq!(node.get_attribute("class").as_deref(), Some("card active"));
    }

    #[test]
    fn spread_sets_attributes_on_plain_elements() {
        let data = reactive([Value::object([(
            "attrs",
            Value::object([("title", Value::from("t")), ("role", Value::from("button"))]),
        )])]);
        let node = Node::element("div");
        let _binding = bind_spread(&node, "attrs", &data, None).unwrap();
        assert_eq!(node.get_attribute("title").as_deref(), Some("t"));
        assert_eq!(node.get_attribute("role").as_deref(), Some("button"));
    }

    #[test]
    fn spread_collects_props_before_initialization() {
        let data = reactive([Value::object([("attrs", Value::object([("size", Value::from(3))]))])]);
        let props = CollectedProps::default();
        let node = Node::element("x-box");
        let _binding = bind_spread(&node, "attrs", &data, Some(props.clone())).unwrap();
        assert_eq!(props.lock().get("size"), Some(&Value::from(3)));
    }

    #[test]
    fn prop_memo_rejects_broken_expressions_early() {
        assert!(prop_memo("nope + 1", &data()).is_err());
        let memo = prop_memo("count + 1", &data()).unwrap();
        assert_eq!(memo.get(), Value::from(2));
    }
}

//! `v-for` list rendering.
//!
//! The template element is replaced by a comment anchor. Every run of the
//! list effect tears down the previous items, then clones the template once
//! per item of the source sequence, renders each clone against the outer
//! bindings layered with the item (and index) names, and inserts the clones
//! after the anchor in order.

use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::Engine;
use super::Disposer;
use crate::dom::{request_animation_frame, Node};
use crate::error::RenderError;
use crate::expr::evaluate_expression;
use crate::proxy::reactive;
use crate::reactive::{untracked, Effect};
use crate::value::Value;

/// A parsed `v-for` directive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForDirective {
    pub item: String,
    pub index: Option<String>,
    pub source: String,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Parse `item in source` or `(item, index) in source`.
pub(crate) fn parse_for(expression: &str) -> Result<ForDirective, RenderError> {
    let malformed = || RenderError::MalformedFor {
        expression: expression.to_string(),
    };
    let (names, source) = expression.split_once(" in ").ok_or_else(malformed)?;
    let (names, source) = (names.trim(), source.trim());
    if source.is_empty() {
        return Err(malformed());
    }

    let (item, index) = match names.strip_prefix('(').and_then(|n| n.strip_suffix(')')) {
        Some(inner) => match inner.split_once(',') {
            Some((item, index)) => (item.trim(), Some(index.trim())),
            None => (inner.trim(), None),
        },
        None => (names, None),
    };
    if !is_identifier(item) || !index.map_or(true, is_identifier) {
        return Err(malformed());
    }

    Ok(ForDirective {
        item: item.to_string(),
        index: index.map(str::to_string),
        source: source.to_string(),
    })
}

#[derive(Default)]
struct Rendered {
    nodes: Vec<Node>,
    disposers: Vec<Disposer>,
}

impl Rendered {
    fn clear(&mut self) {
        for disposer in self.disposers.drain(..) {
            disposer.dispose();
        }
        for node in self.nodes.drain(..) {
            node.remove();
        }
    }
}

/// Bind a `v-for` element. The caller has already stripped the directive.
pub(crate) fn bind_list(engine: &Engine, template: &Node, expression: &str) -> Result<Disposer, RenderError> {
    let directive = parse_for(expression)?;
    let evaluator = evaluate_expression(&directive.source, &engine.bindings)?;

    let anchor = Node::comment("");
    template.before(&anchor);
    {
        // The walk that reached this node is still iterating its siblings.
        let template = template.clone();
        request_animation_frame(move || template.remove());
    }

    let rendered: Arc<Mutex<Rendered>> = Arc::default();
    let state = rendered.clone();
    let engine = engine.clone();
    let template = template.clone();

    let effect = Effect::try_new(move || -> Result<(), RenderError> {
        // Take the old items out before disposing them: their teardown may
        // touch signals that reschedule this effect.
        let mut previous = std::mem::take(&mut *state.lock());
        previous.clear();

        let Some(items) = evaluator()?.as_sequence() else {
            return Ok(());
        };

        untracked(|| -> Result<(), RenderError> {
            let mut last = anchor.clone();
            for (position, item) in items.into_iter().enumerate() {
                let clone = template.clone_node(true);
                let holder = Node::fragment();
                holder.append_child(&clone);

                // Item names shadow outer keys instead of writing through them.
                let item_bindings = reactive([Value::Reactive(engine.bindings.clone())]);
                item_bindings.shadow(&directive.item, item);
                if let Some(index) = &directive.index {
                    item_bindings.shadow(index, Value::from(position));
                }
                let disposers = engine.with_bindings(item_bindings).render_children(&holder)?;

                // A conditional clone may be detached right now; track it
                // anyway so a later toggle cannot leave it behind.
                let mut nodes = holder.children();
                if !nodes.iter().any(|node| node.ptr_eq(&clone)) {
                    nodes.push(clone);
                }
                for node in nodes.iter().filter(|node| node.parent().is_some()) {
                    last.after(node);
                    last = node.clone();
                }

                let mut current = state.lock();
                current.nodes.extend(nodes);
                current.disposers.extend(disposers);
            }
            Ok(())
        })?;

        tracing::trace!(items = state.lock().nodes.len(), "rendered list");
        Ok(())
    })?;

    Ok(Disposer::new(move || {
        effect.dispose();
        let mut current = std::mem::take(&mut *rendered.lock());
        for disposer in current.disposers.drain(..) {
            disposer.dispose();
        }
    }))
}

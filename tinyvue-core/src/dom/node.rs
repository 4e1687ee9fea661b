//! Tree nodes.
//!
//! A [`Node`] is a shared handle to one node of a mutable document tree.
//! Children are owned by their parent; parents and shadow hosts are weak
//! back-references, so dropping a detached subtree frees it. Every method
//! locks at most one node at a time and never calls out while holding a lock.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::event::{Event, Listener};
use super::html;
use crate::error::{EvalError, ParseError, RenderError};
use crate::proxy::ReactiveObject;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Fragment,
    ShadowRoot,
}

/// Behaviour attached to a custom-component element.
///
/// The render engine initializes nested components through this hook and
/// disposes them with their parent render pass.
pub trait CustomElement: Send + Sync {
    /// Initialize with the prop map collected from the parent template.
    /// Repeated calls are no-ops.
    fn initialize(&self, props: IndexMap<String, Value>) -> Result<(), RenderError>;

    /// The live props object, once initialized.
    fn props(&self) -> Option<ReactiveObject>;

    /// Tear down the component's render result.
    fn dispose(&self);
}

struct NodeData {
    node_type: NodeType,
    name: String,
    data: String,
    attributes: IndexMap<String, String>,
    value: Option<String>,
    children: Vec<Node>,
    parent: Weak<RwLock<NodeData>>,
    host: Weak<RwLock<NodeData>>,
    shadow_root: Option<Node>,
    listeners: SmallVec<[(String, Listener); 2]>,
    custom: Option<Arc<dyn CustomElement>>,
}

/// Shared handle to a tree node. Clones refer to the same node.
#[derive(Clone)]
pub struct Node(Arc<RwLock<NodeData>>);

/// Non-owning handle to a node.
#[derive(Clone)]
pub struct WeakNode(Weak<RwLock<NodeData>>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}

impl Node {
    fn with(node_type: NodeType, name: String, data: String) -> Self {
        Node(Arc::new(RwLock::new(NodeData {
            node_type,
            name,
            data,
            attributes: IndexMap::new(),
            value: None,
            children: Vec::new(),
            parent: Weak::new(),
            host: Weak::new(),
            shadow_root: None,
            listeners: SmallVec::new(),
            custom: None,
        })))
    }

    /// A new element. Tag names are case-insensitive and stored lowercase.
    pub fn element(name: &str) -> Self {
        Self::with(NodeType::Element, name.to_ascii_lowercase(), String::new())
    }

    pub fn text(data: &str) -> Self {
        Self::with(NodeType::Text, String::new(), data.to_string())
    }

    pub fn comment(data: &str) -> Self {
        Self::with(NodeType::Comment, String::new(), data.to_string())
    }

    pub fn fragment() -> Self {
        Self::with(NodeType::Fragment, String::new(), String::new())
    }

    pub fn node_type(&self) -> NodeType {
        self.0.read().node_type
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// Lowercase tag name of an element.
    pub fn local_name(&self) -> Option<String> {
        let data = self.0.read();
        (data.node_type == NodeType::Element).then(|| data.name.clone())
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // ---- Tree navigation ----

    pub fn parent(&self) -> Option<Node> {
        self.0.read().parent.upgrade().map(Node)
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.read().children.clone()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.read().children.first().cloned()
    }

    pub fn first_element_child(&self) -> Option<Node> {
        self.children().into_iter().find(Node::is_element)
    }

    fn position(&self) -> Option<(Node, usize)> {
        let parent = self.parent()?;
        let index = parent.0.read().children.iter().position(|c| c.ptr_eq(self))?;
        Some((parent, index))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let (parent, index) = self.position()?;
        let sibling = parent.0.read().children.get(index + 1).cloned();
        sibling
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let (parent, index) = self.position()?;
        let sibling = index
            .checked_sub(1)
            .and_then(|i| parent.0.read().children.get(i).cloned());
        sibling
    }

    pub fn next_element_sibling(&self) -> Option<Node> {
        let (parent, index) = self.position()?;
        parent
            .children()
            .into_iter()
            .skip(index + 1)
            .find(Node::is_element)
    }

    /// The topmost ancestor (the node itself when detached).
    pub fn root_node(&self) -> Node {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    // ---- Tree mutation ----

    /// Detach from the parent, if any.
    pub fn remove(&self) {
        if let Some((parent, index)) = self.position() {
            parent.0.write().children.remove(index);
        }
        self.0.write().parent = Weak::new();
    }

    /// Insert `child` before `reference`, or append when `reference` is
    /// `None` or not a child. Fragments insert their children instead.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if reference.is_some_and(|r| r.ptr_eq(child)) || child.contains(self) {
            return;
        }

        let incoming = if child.node_type() == NodeType::Fragment {
            let nodes = child.children();
            for node in &nodes {
                node.remove();
            }
            nodes
        } else {
            child.remove();
            vec![child.clone()]
        };
        for node in &incoming {
            node.0.write().parent = Arc::downgrade(&self.0);
        }

        let mut data = self.0.write();
        let index = reference
            .and_then(|r| data.children.iter().position(|c| c.ptr_eq(r)))
            .unwrap_or(data.children.len());
        data.children.splice(index..index, incoming);
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `node` as the previous sibling.
    pub fn before(&self, node: &Node) {
        if let Some(parent) = self.parent() {
            parent.insert_before(node, Some(self));
        }
    }

    /// Insert `node` as the next sibling.
    pub fn after(&self, node: &Node) {
        let Some(parent) = self.parent() else {
            return;
        };
        let mut next = self.next_sibling();
        if next.as_ref().is_some_and(|n| n.ptr_eq(node)) {
            next = node.next_sibling();
        }
        parent.insert_before(node, next.as_ref());
    }

    fn clear_children(&self) {
        let children = std::mem::take(&mut self.0.write().children);
        for child in children {
            child.0.write().parent = Weak::new();
        }
    }

    /// Copy this node; `deep` copies the subtree too. Listeners, component
    /// behaviour and shadow roots are not copied.
    pub fn clone_node(&self, deep: bool) -> Node {
        let (copy, children) = {
            let data = self.0.read();
            let copy = Node::with(data.node_type, data.name.clone(), data.data.clone());
            {
                let mut target = copy.0.write();
                target.attributes = data.attributes.clone();
                target.value = data.value.clone();
            }
            let children = if deep { data.children.clone() } else { Vec::new() };
            (copy, children)
        };
        for child in children {
            copy.append_child(&child.clone_node(true));
        }
        copy
    }

    // ---- Attributes ----

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.0.read().attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.read().attributes.contains_key(name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.0
            .write()
            .attributes
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.0.write().attributes.shift_remove(name)
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .read()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ---- Content ----

    /// Text of a text/comment node, or the concatenated descendant text.
    pub fn text_content(&self) -> String {
        let (node_type, data, children) = {
            let d = self.0.read();
            (d.node_type, d.data.clone(), d.children.clone())
        };
        match node_type {
            NodeType::Text | NodeType::Comment => data,
            _ => children
                .iter()
                .filter(|c| c.node_type() != NodeType::Comment)
                .map(Node::text_content)
                .collect(),
        }
    }

    pub fn set_text_content(&self, text: &str) {
        let node_type = self.node_type();
        match node_type {
            NodeType::Text | NodeType::Comment => self.0.write().data = text.to_string(),
            _ => {
                self.clear_children();
                if !text.is_empty() {
                    self.append_child(&Node::text(text));
                }
            }
        }
    }

    /// The `value` property; falls back to the `value` attribute.
    pub fn value(&self) -> String {
        let data = self.0.read();
        data.value
            .clone()
            .or_else(|| data.attributes.get("value").cloned())
            .unwrap_or_default()
    }

    pub fn set_value(&self, value: impl Into<String>) {
        self.0.write().value = Some(value.into());
    }

    /// One inline style declaration.
    pub fn style_property(&self, property: &str) -> Option<String> {
        let style = self.get_attribute("style")?;
        parse_style(&style).shift_remove(property)
    }

    /// Set an inline style declaration; an empty value removes it.
    pub fn set_style_property(&self, property: &str, value: &str) {
        let mut declarations = parse_style(&self.get_attribute("style").unwrap_or_default());
        if value.is_empty() {
            declarations.shift_remove(property);
        } else {
            declarations.insert(property.to_string(), value.to_string());
        }

        if declarations.is_empty() {
            self.remove_attribute("style");
        } else {
            let style = declarations
                .iter()
                .map(|(k, v)| format!("{k}: {v};"))
                .collect::<Vec<_>>()
                .join(" ");
            self.set_attribute("style", style);
        }
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            html::serialize(&child, &mut out);
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        html::serialize(self, &mut out);
        out
    }

    /// Replace the children with nodes parsed from `markup`.
    pub fn set_inner_html(&self, markup: &str) -> Result<(), ParseError> {
        let fragment = html::parse_fragment(markup)?;
        self.clear_children();
        self.append_child(&fragment);
        Ok(())
    }

    // ---- Events ----

    pub fn add_event_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&Event) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        self.0
            .write()
            .listeners
            .push((event_type.to_string(), Arc::new(listener)));
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.0
            .read()
            .listeners
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    /// Run this node's listeners for the event, in registration order.
    /// Events do not bubble. The first listener error stops dispatch.
    pub fn dispatch_event(&self, event: Event) -> Result<(), EvalError> {
        let listeners: Vec<Listener> = self
            .0
            .read()
            .listeners
            .iter()
            .filter(|(t, _)| t == event.event_type())
            .map(|(_, l)| l.clone())
            .collect();

        let event = event.with_target(self.clone());
        for listener in listeners {
            listener(&event)?;
        }
        Ok(())
    }

    // ---- Shadow roots and components ----

    /// Attach (or return the existing) shadow root.
    pub fn attach_shadow(&self) -> Node {
        if let Some(root) = self.shadow_root() {
            return root;
        }
        let root = Node::with(NodeType::ShadowRoot, String::new(), String::new());
        root.0.write().host = Arc::downgrade(&self.0);
        self.0.write().shadow_root = Some(root.clone());
        root
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.0.read().shadow_root.clone()
    }

    /// The element hosting this shadow root.
    pub fn host(&self) -> Option<Node> {
        self.0.read().host.upgrade().map(Node)
    }

    pub fn set_custom_element(&self, behavior: Arc<dyn CustomElement>) {
        self.0.write().custom = Some(behavior);
    }

    pub fn custom_element(&self) -> Option<Arc<dyn CustomElement>> {
        self.0.read().custom.clone()
    }
}

fn parse_style(style: &str) -> IndexMap<String, String> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        match data.node_type {
            NodeType::Element => write!(f, "Element(<{}>)", data.name),
            NodeType::Text => write!(f, "Text({:?})", data.data),
            NodeType::Comment => write!(f, "Comment({:?})", data.data),
            NodeType::Fragment => f.write_str("Fragment"),
            NodeType::ShadowRoot => f.write_str("ShadowRoot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(node: &Node) -> Vec<String> {
        node.children()
            .iter()
            .map(|c| c.local_name().unwrap_or_else(|| c.text_content()))
            .collect()
    }

    #[test]
    fn append_moves_node_between_parents() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = Node::element("span");

        a.append_child(&child);
        b.append_child(&child);

        assert!(a.children().is_empty());
        assert!(child.parent().unwrap().ptr_eq(&b));
    }

    #[test]
    fn before_and_after_place_siblings() {
        let parent = Node::element("div");
        let middle = Node::element("b");
        parent.append_child(&middle);

        middle.before(&Node::element("a"));
        middle.after(&Node::element("c"));

        assert_eq!(names(&parent), ["a", "b", "c"]);
    }

    #[test]
    fn after_with_current_next_sibling_keeps_order() {
        let parent = Node::element("div");
        let marker = Node::comment("");
        let item = Node::element("p");
        parent.append_child(&marker);
        parent.append_child(&item);
        parent.append_child(&Node::element("footer"));

        marker.after(&item);

        assert_eq!(names(&parent), ["", "p", "footer"]);
    }

    #[test]
    fn fragment_insert_moves_children() {
        let parent = Node::element("ul");
        let fragment = Node::fragment();
        fragment.append_child(&Node::element("li"));
        fragment.append_child(&Node::element("li"));

        parent.append_child(&fragment);

        assert_eq!(parent.children().len(), 2);
        assert!(fragment.children().is_empty());
    }

    #[test]
    fn remove_detaches() {
        let parent = Node::element("div");
        let child = Node::text("x");
        parent.append_child(&child);
        child.remove();

        assert!(child.parent().is_none());
        assert_eq!(parent.text_content(), "");
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let source = Node::element("div");
        source.set_attribute("class", "box");
        source.append_child(&Node::text("hi"));
        source.add_event_listener("click", |_| Ok(()));

        let copy = source.clone_node(true);
        copy.set_attribute("class", "other");

        assert_eq!(copy.text_content(), "hi");
        assert_eq!(source.get_attribute("class").as_deref(), Some("box"));
        assert_eq!(copy.listener_count("click"), 0);
    }

    #[test]
    fn style_properties_round_trip_through_attribute() {
        let node = Node::element("div");
        node.set_attribute("style", "color: red");
        node.set_style_property("display", "none");
        assert_eq!(node.get_attribute("style").as_deref(), Some("color: red; display: none;"));

        node.set_style_property("display", "");
        node.set_style_property("color", "");
        assert!(!node.has_attribute("style"));
    }

    #[test]
    fn value_property_shadows_attribute() {
        let input = Node::element("input");
        input.set_attribute("value", "initial");
        assert_eq!(input.value(), "initial");
        input.set_value("typed");
        assert_eq!(input.value(), "typed");
        assert_eq!(input.get_attribute("value").as_deref(), Some("initial"));
    }

    #[test]
    fn shadow_root_knows_its_host() {
        let host = Node::element("my-card");
        let root = host.attach_shadow();
        let inner = Node::element("p");
        root.append_child(&inner);

        assert!(inner.root_node().host().unwrap().ptr_eq(&host));
        assert!(host.attach_shadow().ptr_eq(&root));
    }

    #[test]
    fn dispatch_runs_matching_listeners_with_target() {
        let node = Node::element("button");
        let seen = Arc::new(RwLock::new(Vec::new()));

        let s = seen.clone();
        node.add_event_listener("click", move |event| {
            s.write().push(event.target().is_some());
            Ok(())
        });
        node.add_event_listener("input", |_| Err(EvalError::handler("not this one")));

        node.dispatch_event(Event::new("click")).unwrap();
        assert_eq!(*seen.read(), vec![true]);
        assert!(node.dispatch_event(Event::new("input")).is_err());
    }
}

//! Reactive Objects
//!
//! A reactive object is a mapping or a sequence whose every property is
//! backed by a signal. Reading a property returns the signal's current value
//! (and tracks it inside effects); writing a property writes the signal.
//! Code using the object never sees the signals unless it asks for them.
//!
//! # Slots
//!
//! Each property lives in a [`Slot`]: a writable signal, or a read-only
//! computed cell. Assigning a signal-like value replaces the slot itself
//! instead of writing through it, which is how two objects come to share one
//! property. Merging a reactive source into a new object copies slots, never
//! values, so the merged object and its source stay linked both ways.
//!
//! # Shape
//!
//! Besides per-property signals each object carries a shape signal, bumped
//! when keys are added or the sequence length changes. Sequence reads and key
//! iteration track it, so `push`/`pop` re-run whoever looked at the list.
//!
//! Mapping reads of unknown keys auto-vivify an `undefined` slot so a later
//! write re-runs the reader. Sequences never auto-vivify.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::reactive::{untracked, Memo, Signal};
use crate::value::Value;

/// Storage behind one property of a reactive object.
#[derive(Clone)]
pub enum Slot {
    Signal(Signal<Value>),
    Computed(Memo<Value>),
}

impl Slot {
    fn fresh(value: Value) -> Self {
        Slot::Signal(Signal::new(value))
    }

    /// Current value, tracked.
    pub fn get(&self) -> Value {
        match self {
            Slot::Signal(s) => s.get(),
            Slot::Computed(c) => c.get(),
        }
    }

    pub fn get_untracked(&self) -> Value {
        match self {
            Slot::Signal(s) => s.get_untracked(),
            Slot::Computed(c) => c.get_untracked(),
        }
    }

    /// Write through the slot. Computed slots are read-only.
    pub fn set(&self, value: Value) {
        match self {
            Slot::Signal(s) => s.set(value),
            Slot::Computed(c) => {
                tracing::warn!(computed = c.id().raw(), "ignoring write to a computed property");
            }
        }
    }

    /// The slot as a signal-like value, for aliasing it elsewhere.
    pub fn to_value(&self) -> Value {
        match self {
            Slot::Signal(s) => Value::Signal(s.clone()),
            Slot::Computed(c) => Value::Computed(c.clone()),
        }
    }

    fn from_signal_like(value: &Value) -> Option<Self> {
        match value {
            Value::Signal(s) => Some(Slot::Signal(s.clone())),
            Value::Computed(c) => Some(Slot::Computed(c.clone())),
            _ => None,
        }
    }
}

enum Store {
    Map(IndexMap<String, Slot>),
    Seq(Vec<Slot>),
}

struct Inner {
    store: RwLock<Store>,
    shape: Signal<u64>,
}

/// A signal-backed mapping or sequence.
///
/// Cloning the handle shares the object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Arc<Inner>,
}

/// Build a reactive object from `sources`, merged left to right.
///
/// The result is a sequence if the first source is sequence-shaped, a mapping
/// otherwise. Reactive sources contribute their slots (aliasing), plain
/// sources contribute values wrapped in fresh signals, signal-like values are
/// adopted as slots. Later sources overwrite earlier keys.
///
/// # Example
///
/// ```rust
/// use tinyvue_core::{reactive, Value};
///
/// let data = reactive([Value::object([("name", Value::from("John"))])]);
/// data.set("name", "Jane".into());
/// assert_eq!(data.get("name"), Value::from("Jane"));
/// ```
pub fn reactive<I>(sources: I) -> ReactiveObject
where
    I: IntoIterator<Item = Value>,
{
    let sources: Vec<Value> = sources.into_iter().collect();

    let is_seq = match sources.first() {
        Some(Value::Array(_)) => true,
        Some(Value::Reactive(r)) => r.is_array(),
        _ => false,
    };
    let object = if is_seq {
        ReactiveObject::new_array()
    } else {
        ReactiveObject::new_map()
    };

    untracked(|| {
        for source in &sources {
            object.merge(source);
        }
    });

    object
}

impl ReactiveObject {
    fn with_store(store: Store) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(store),
                shape: Signal::new(0),
            }),
        }
    }

    /// An empty reactive mapping.
    pub fn new_map() -> Self {
        Self::with_store(Store::Map(IndexMap::new()))
    }

    /// An empty reactive sequence.
    pub fn new_array() -> Self {
        Self::with_store(Store::Seq(Vec::new()))
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.inner.store.read(), Store::Seq(_))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn merge(&self, source: &Value) {
        match source {
            Value::Reactive(other) => {
                for (key, slot) in other.raw_slots() {
                    self.put_slot(&key, slot);
                }
            }
            Value::Object(map) => {
                for (key, value) in map.iter() {
                    self.set(key, value.clone());
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    self.set(&index.to_string(), value.clone());
                }
            }
            Value::Undefined | Value::Null => {}
            other => {
                tracing::warn!(source = ?other, "ignoring non-container reactive source");
            }
        }
    }

    /// Read a property.
    ///
    /// Mappings auto-vivify unknown keys as `undefined`. Sequences answer
    /// indices and `length`; anything else is `undefined`.
    pub fn get(&self, key: &str) -> Value {
        if let Some(index) = parse_index(key) {
            if self.is_array() {
                return self.get_index(index);
            }
        }

        if self.is_array() {
            let len = self.len();
            return if key == "length" {
                Value::from(len)
            } else {
                Value::Undefined
            };
        }

        let existing = match &*self.inner.store.read() {
            Store::Map(map) => map.get(key).cloned(),
            Store::Seq(_) => None,
        };
        let slot = match existing {
            Some(slot) => slot,
            None => match &mut *self.inner.store.write() {
                Store::Map(map) => map
                    .entry(key.to_string())
                    .or_insert_with(|| Slot::fresh(Value::Undefined))
                    .clone(),
                Store::Seq(_) => return Value::Undefined,
            },
        };
        slot.get()
    }

    /// Read a sequence item; `undefined` when out of range or not a sequence.
    pub fn get_index(&self, index: usize) -> Value {
        self.inner.shape.get();
        let slot = match &*self.inner.store.read() {
            Store::Seq(items) => items.get(index).cloned(),
            Store::Map(map) => map.get(&index.to_string()).cloned(),
        };
        slot.map(|s| s.get()).unwrap_or_default()
    }

    /// Write a property.
    ///
    /// Signal-like values replace the slot; other values write through an
    /// existing slot or create a new one. Writing `length` of a sequence is
    /// ignored; use the sequence mutators.
    pub fn set(&self, key: &str, value: Value) {
        if let Some(slot) = Slot::from_signal_like(&value) {
            self.put_slot(key, slot);
            return;
        }

        if self.is_array() {
            match parse_index(key) {
                Some(index) => self.set_index(index, value),
                None => tracing::trace!(key, "ignoring non-index write to a reactive sequence"),
            }
            return;
        }

        let existing = match &*self.inner.store.read() {
            Store::Map(map) => map.get(key).cloned(),
            Store::Seq(_) => None,
        };

        match existing {
            Some(slot) => slot.set(value),
            None => {
                if let Store::Map(map) = &mut *self.inner.store.write() {
                    map.insert(key.to_string(), Slot::fresh(value));
                }
                self.bump_shape();
            }
        }
    }

    /// Bind `key` to a slot of its own, leaving any slot it replaces (and the
    /// objects sharing that slot) untouched.
    pub fn shadow(&self, key: &str, value: Value) {
        let slot = Slot::from_signal_like(&value).unwrap_or_else(|| Slot::fresh(value));
        self.put_slot(key, slot);
    }

    /// Write a sequence item, growing the sequence when writing past its end.
    pub fn set_index(&self, index: usize, value: Value) {
        if !self.is_array() || Slot::from_signal_like(&value).is_some() {
            return self.set(&index.to_string(), value);
        }

        let existing = match &*self.inner.store.read() {
            Store::Seq(items) => items.get(index).cloned(),
            Store::Map(_) => None,
        };

        match existing {
            Some(slot) => slot.set(value),
            None => {
                if let Store::Seq(items) = &mut *self.inner.store.write() {
                    while items.len() < index {
                        items.push(Slot::fresh(Value::Undefined));
                    }
                    items.push(Slot::fresh(value));
                }
                self.bump_shape();
            }
        }
    }

    fn put_slot(&self, key: &str, slot: Slot) {
        let grew = match &mut *self.inner.store.write() {
            Store::Map(map) => map.insert(key.to_string(), slot).is_none(),
            Store::Seq(items) => match parse_index(key) {
                Some(index) if index < items.len() => {
                    items[index] = slot;
                    false
                }
                Some(index) => {
                    while items.len() < index {
                        items.push(Slot::fresh(Value::Undefined));
                    }
                    items.push(slot);
                    true
                }
                None => false,
            },
        };
        if grew {
            self.bump_shape();
        }
    }

    /// The slot behind a property, bypassing value unwrapping.
    pub fn raw(&self, key: &str) -> Option<Slot> {
        match &*self.inner.store.read() {
            Store::Map(map) => map.get(key).cloned(),
            Store::Seq(items) => parse_index(key).and_then(|i| items.get(i).cloned()),
        }
    }

    /// All slots with their keys, in order.
    pub fn raw_slots(&self) -> Vec<(String, Slot)> {
        match &*self.inner.store.read() {
            Store::Map(map) => map.iter().map(|(k, s)| (k.clone(), s.clone())).collect(),
            Store::Seq(items) => items
                .iter()
                .enumerate()
                .map(|(i, s)| (i.to_string(), s.clone()))
                .collect(),
        }
    }

    /// Untracked plain snapshot of the backing container.
    pub fn peek(&self) -> Value {
        match &*self.inner.store.read() {
            Store::Map(map) => Value::object(
                map.iter()
                    .map(|(k, s)| (k.clone(), s.get_untracked())),
            ),
            Store::Seq(items) => Value::array(items.iter().map(Slot::get_untracked)),
        }
    }

    /// Whether a property exists, without tracking or auto-vivifying.
    pub fn contains_key(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Keys in insertion order (indices for sequences). Tracks the shape.
    pub fn keys(&self) -> Vec<String> {
        self.inner.shape.get();
        self.raw_slots().into_iter().map(|(k, _)| k).collect()
    }

    /// Current values in order. Tracks the shape and every slot.
    pub fn values(&self) -> Vec<Value> {
        self.inner.shape.get();
        self.raw_slots().into_iter().map(|(_, s)| s.get()).collect()
    }

    /// Current entries in order. Tracks the shape and every slot.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner.shape.get();
        self.raw_slots()
            .into_iter()
            .map(|(k, s)| (k, s.get()))
            .collect()
    }

    /// Number of properties (sequence length). Tracks the shape.
    pub fn len(&self) -> usize {
        self.inner.shape.get();
        match &*self.inner.store.read() {
            Store::Map(map) => map.len(),
            Store::Seq(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump_shape(&self) {
        self.inner.shape.update(|v| v.wrapping_add(1));
    }

    fn mutate_seq<R>(&self, f: impl FnOnce(&mut Vec<Slot>) -> R) -> Option<R> {
        let result = match &mut *self.inner.store.write() {
            Store::Seq(items) => Some(f(items)),
            Store::Map(_) => None,
        };
        if result.is_some() {
            self.bump_shape();
        } else {
            tracing::warn!("sequence mutator called on a reactive mapping");
        }
        result
    }

    /// Append items; returns the new length.
    pub fn push(&self, value: Value) -> usize {
        self.mutate_seq(|items| {
            items.push(Slot::fresh(value));
            items.len()
        })
        .unwrap_or(0)
    }

    /// Prepend an item; returns the new length.
    pub fn unshift(&self, value: Value) -> usize {
        self.mutate_seq(|items| {
            items.insert(0, Slot::fresh(value));
            items.len()
        })
        .unwrap_or(0)
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Value {
        self.mutate_seq(|items| items.pop())
            .flatten()
            .map(|s| s.get_untracked())
            .unwrap_or_default()
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Value {
        self.mutate_seq(|items| (!items.is_empty()).then(|| items.remove(0)))
            .flatten()
            .map(|s| s.get_untracked())
            .unwrap_or_default()
    }

    /// Remove `delete_count` items at `start` and insert `insert` there.
    /// Returns the removed values.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate_seq(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items
                .splice(start..end, insert.into_iter().map(Slot::fresh))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .iter()
        .map(Slot::get_untracked)
        .collect()
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "Array" } else { "Map" };
        let keys: Vec<String> = self.raw_slots().into_iter().map(|(k, _)| k).collect();
        f.debug_struct("ReactiveObject")
            .field("kind", &kind)
            .field("keys", &keys)
            .finish()
    }
}

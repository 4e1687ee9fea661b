//! Integration Tests for the Reactive System
//!
//! These tests verify that signals, computed cells, effects and reactive
//! objects work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tinyvue_core::reactive::{computed, untracked, Effect, Memo, Signal};
use tinyvue_core::{evaluate_expression, reactive, Value};

/// Test that a memo tracks signal dependencies.
#[test]
fn memo_tracks_signal_dependency() {
    let signal = Signal::new(10);

    let signal_clone = signal.clone();
    let memo = Memo::new(move || signal_clone.get() * 2);

    assert_eq!(memo.get(), 20);

    signal.set(5);
    assert_eq!(memo.get(), 10);
}

/// Test that an effect re-runs when a signal it read is written.
#[test]
fn effect_reruns_on_signal_write() {
    let signal = Signal::new(0);
    let observed = Arc::new(AtomicI32::new(-1));
    let observed_clone = observed.clone();

    let signal_clone = signal.clone();
    let _effect = Effect::new(move || {
        observed_clone.store(signal_clone.get(), Ordering::SeqCst);
    });
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    signal.set(42);
    assert_eq!(observed.load(Ordering::SeqCst), 42);
}

/// Test that reads inside `untracked` create no dependency.
#[test]
fn untracked_reads_do_not_subscribe() {
    let signal = Signal::new(1);
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let signal_clone = signal.clone();
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let _ = untracked(|| signal_clone.get());
    });

    signal.set(2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that reading an unset key yields undefined, and setting it later
/// re-runs the reader exactly once per write.
#[test]
fn unset_key_auto_vivifies_and_tracks() {
    let data = reactive([Value::object::<&str, _>([])]);
    let runs = Arc::new(AtomicI32::new(0));
    let seen = Arc::new(parking_lot::Mutex::new(Value::Null));

    let (data_clone, runs_clone, seen_clone) = (data.clone(), runs.clone(), seen.clone());
    let _effect = Effect::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        *seen_clone.lock() = data_clone.get("later");
    });
    assert_eq!(*seen.lock(), Value::Undefined);

    data.set("later", Value::from("here"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(*seen.lock(), Value::from("here"));

    data.set("later", Value::from("again"));
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Test the sequence mutators against standard sequence semantics.
#[test]
fn sequence_mutators_follow_array_semantics() {
    let names = reactive([Value::array([Value::from("John"), Value::from("James")])]);

    names.push(Value::from("Jane"));
    assert_eq!(names.len(), 3);
    assert_eq!(names.get_index(2), Value::from("Jane"));

    names.unshift(Value::from("Jack"));
    assert_eq!(names.len(), 4);

    names.pop();
    assert_eq!(names.len(), 3);

    names.shift();
    assert_eq!(names.len(), 2);

    names.splice(0, 1, Vec::new());
    assert_eq!(names.len(), 1);
    assert_eq!(names.get_index(0), Value::from("James"));
}

/// Test that merging aliases the signals of a reactive source.
#[test]
fn merged_objects_share_signals_with_their_sources() {
    let source = reactive([Value::object([("name", Value::from("John"))])]);
    let merged = reactive([Value::object([("extra", Value::from(1))]), Value::Reactive(source.clone())]);

    merged.set("name", Value::from("Jane"));
    assert_eq!(source.get("name"), Value::from("Jane"));

    source.set("name", Value::from("Jill"));
    assert_eq!(merged.get("name"), Value::from("Jill"));
}

/// Test that nested reactive objects are tracked per key, while plain nested
/// objects are values.
#[test]
fn nested_reactivity_requires_reactive_children() {
    let person = reactive([Value::object([("name", Value::from("Ada"))])]);
    let data = reactive([Value::object([
        ("person", Value::Reactive(person.clone())),
        ("plain", Value::object([("name", Value::from("Bob"))])),
    ])]);

    let name_runs = Arc::new(AtomicI32::new(0));
    let reference_runs = Arc::new(AtomicI32::new(0));

    let (d, r) = (data.clone(), name_runs.clone());
    let _name_effect = Effect::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
        let _ = d.get("person").as_reactive().map(|p| p.get("name"));
    });
    let (d, r) = (data.clone(), reference_runs.clone());
    let _reference_effect = Effect::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
        let _ = d.get("person");
    });

    person.set("name", Value::from("Grace"));
    assert_eq!(name_runs.load(Ordering::SeqCst), 2);
    assert_eq!(reference_runs.load(Ordering::SeqCst), 1);
}

/// Test that computed values stored in a reactive object read through.
#[test]
fn computed_slots_read_through() {
    let count = Signal::new(Value::from(2));
    let count_clone = count.clone();
    let doubled = computed(move || Value::from(count_clone.get().to_number() * 2.0));
    let data = reactive([Value::object([("doubled", Value::Computed(doubled))])]);

    let evaluator = evaluate_expression("doubled + 1", &data).unwrap();
    assert_eq!(evaluator().unwrap(), Value::from(5));

    count.set(Value::from(10));
    assert_eq!(evaluator().unwrap(), Value::from(21));
}

/// Test that an effect over an evaluated expression follows every binding
/// the expression touched.
#[test]
fn expression_effects_track_their_identifiers() {
    let data = reactive([Value::object([
        ("first", Value::from("Ada")),
        ("last", Value::from("Lovelace")),
        ("unused", Value::from(0)),
    ])]);
    let evaluator = evaluate_expression("`${first} ${last}`", &data).unwrap();

    let runs = Arc::new(AtomicI32::new(0));
    let text = Arc::new(parking_lot::Mutex::new(String::new()));
    let (r, t) = (runs.clone(), text.clone());
    let _effect = Effect::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
        *t.lock() = evaluator().map(|v| v.to_text()).unwrap_or_default();
    });
    assert_eq!(*text.lock(), "Ada Lovelace");

    data.set("last", Value::from("Byron"));
    assert_eq!(*text.lock(), "Ada Byron");

    data.set("unused", Value::from(1));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that a disposed effect stops reacting.
#[test]
fn disposed_effect_stops_reacting() {
    let signal = Signal::new(0);
    let runs = Arc::new(AtomicI32::new(0));
    let (s, r) = (signal.clone(), runs.clone());
    let effect = Effect::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
        let _ = s.get();
    });

    effect.dispose();
    signal.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(effect.is_disposed());
}

//! Deferred callback queues.
//!
//! Stand-ins for the host event loop's animation-frame and idle callbacks.
//! Each thread owns its queues; the embedding application decides when a
//! frame or an idle period happens by calling [`run_animation_frame`],
//! [`run_idle_callbacks`] or [`flush`].

use std::cell::RefCell;
use std::collections::VecDeque;

type Callback = Box<dyn FnOnce()>;

thread_local! {
    static ANIMATION_FRAME: RefCell<VecDeque<Callback>> = RefCell::new(VecDeque::new());
    static IDLE: RefCell<VecDeque<Callback>> = RefCell::new(VecDeque::new());
}

/// Queue `callback` for the next animation frame.
pub fn request_animation_frame(callback: impl FnOnce() + 'static) {
    ANIMATION_FRAME.with(|queue| queue.borrow_mut().push_back(Box::new(callback)));
}

/// Queue `callback` for the next idle period.
pub fn request_idle_callback(callback: impl FnOnce() + 'static) {
    IDLE.with(|queue| queue.borrow_mut().push_back(Box::new(callback)));
}

/// Run `callback` once the current work settles.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    request_idle_callback(callback);
}

fn drain(queue: &'static std::thread::LocalKey<RefCell<VecDeque<Callback>>>) -> usize {
    // Callbacks queued while running belong to the next round.
    let batch: Vec<Callback> = queue.with(|q| q.borrow_mut().drain(..).collect());
    let count = batch.len();
    for callback in batch {
        callback();
    }
    count
}

/// Run the callbacks queued for this frame. Returns how many ran.
pub fn run_animation_frame() -> usize {
    let count = drain(&ANIMATION_FRAME);
    if count > 0 {
        tracing::trace!(count, "ran animation frame callbacks");
    }
    count
}

/// Run the queued idle callbacks. Returns how many ran.
pub fn run_idle_callbacks() -> usize {
    let count = drain(&IDLE);
    if count > 0 {
        tracing::trace!(count, "ran idle callbacks");
    }
    count
}

/// Run frames and idle periods until both queues are empty.
pub fn flush() -> usize {
    let mut total = 0;
    loop {
        let ran = run_animation_frame() + run_idle_callbacks();
        if ran == 0 {
            return total;
        }
        total += ran;
    }
}

/// Number of callbacks waiting in both queues.
pub fn pending() -> usize {
    ANIMATION_FRAME.with(|q| q.borrow().len()) + IDLE.with(|q| q.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::cell::Cell;

    #[test]
    fn frames_run_only_when_driven() {
        let ran = Rc::new(Cell::new(0));
        let r = ran.clone();
        request_animation_frame(move || r.set(r.get() + 1));

        assert_eq!(ran.get(), 0);
        assert_eq!(run_animation_frame(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(run_animation_frame(), 0);
    }

    #[test]
    fn callbacks_queued_during_a_frame_wait_for_the_next() {
        let ran = Rc::new(Cell::new(0));
        let r = ran.clone();
        request_animation_frame(move || {
            let inner = r.clone();
            request_animation_frame(move || inner.set(inner.get() + 1));
        });

        run_animation_frame();
        assert_eq!(ran.get(), 0);
        run_animation_frame();
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn flush_drains_both_queues() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        next_tick(move || o.borrow_mut().push("idle"));
        let o = order.clone();
        request_animation_frame(move || o.borrow_mut().push("frame"));

        assert_eq!(flush(), 2);
        assert_eq!(*order.borrow(), vec!["frame", "idle"]);
        assert_eq!(pending(), 0);
    }
}

//! Change-event fan-out, with a reentrancy guard.
//!
//! A range's feedback callback (see [`crate::range::RangeFeedback`]) is
//! host code, and host code sometimes reacts to a cursor moving by editing
//! the buffer again. If that inner edit dispatched feedback inline, it
//! could re-enter the same callback while its first invocation is still on
//! the stack. Instead, edits that happen while already dispatching an
//! event are queued here and drained once the outer dispatch finishes, so
//! a single top-level edit never re-enters the same observer twice.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// One fact the buffer wants to tell its observers about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    TextInserted { line: usize, column: usize, len: usize },
    TextRemoved { line: usize, column: usize, len: usize },
    LineWrapped { line: usize, column: usize },
    LineUnwrapped { line: usize },
    RangeInvalidated { range: usize },
}

/// Dispatches [`ChangeEvent`]s to a list of listeners, guarding against
/// reentrant dispatch. Uses interior mutability so a listener can hold a
/// shared reference to the same hub it's being called from and still emit
/// into it without a borrow conflict — exactly the reentrant case this
/// exists to serialize.
#[derive(Default)]
pub struct EventHub {
    dispatching: Cell<bool>,
    pending: RefCell<VecDeque<ChangeEvent>>,
    /// Host-registered listeners (folding/swap-journal observers, a view's
    /// repaint hook, ...), per the design notes' "explicit observer lists
    /// stored on the buffer" guidance. A subscriber that wants to stop
    /// listening calls [`Self::unsubscribe`] with the id [`Self::subscribe`]
    /// returned; the slot is replaced with a no-op rather than removed, so
    /// ids handed out earlier never refer to a different listener later.
    listeners: RefCell<Vec<Box<dyn FnMut(&ChangeEvent)>>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    /// Registers `listener`, returning an id usable with
    /// [`Self::unsubscribe`]. A listener must not re-enter the buffer it's
    /// attached to — that's enforced by [`Self::emit`]'s reentrancy guard,
    /// not by this method.
    pub fn subscribe(&self, listener: impl FnMut(&ChangeEvent) + 'static) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        listeners.push(Box::new(listener));
        listeners.len() - 1
    }

    /// Replaces the listener at `id` with a no-op. `id` stays valid (but
    /// inert) for the lifetime of the hub.
    pub fn unsubscribe(&self, id: usize) {
        if let Some(slot) = self.listeners.borrow_mut().get_mut(id) {
            *slot = Box::new(|_: &ChangeEvent| {});
        }
    }

    /// Queues `event`, then, if nothing else is currently dispatching,
    /// drains the queue — including anything a listener emits back into
    /// this hub while it runs — one event at a time, first through the
    /// caller-supplied `listener` (the buffer's own same-call-site hook)
    /// and then through every registered subscriber.
    pub fn emit(&self, event: ChangeEvent, mut listener: impl FnMut(&ChangeEvent)) {
        self.pending.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }
        self.dispatching.set(true);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(event) => {
                    listener(&event);
                    let count = self.listeners.borrow().len();
                    for i in 0..count {
                        // Swap the listener out while it runs so a listener
                        // that itself calls `subscribe`/`unsubscribe` (on a
                        // hub shared by `Rc`/interior mutability, same as
                        // the reentrant-emit case) doesn't double-borrow
                        // `listeners` and panic.
                        let mut taken = match self.listeners.borrow_mut().get_mut(i) {
                            Some(slot) => std::mem::replace(slot, Box::new(|_: &ChangeEvent| {})),
                            None => continue,
                        };
                        taken(&event);
                        if let Some(slot) = self.listeners.borrow_mut().get_mut(i) {
                            *slot = taken;
                        }
                    }
                }
                None => break,
            }
        }
        self.dispatching.set(false);
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }
}

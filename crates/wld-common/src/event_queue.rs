//! Named pub/sub channel with ref-counted subscribers.
//!
//! A callback registered N times stays subscribed until it has been
//! unregistered N times. Subscribers may register or unregister callbacks
//! (including themselves) from inside a notification: the queue iterates
//! over a snapshot and re-checks membership before each call, so a callback
//! removed mid-round is not invoked afterwards.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Subscriber callback. Identity is the allocation behind the `Rc`.
pub type EventCallback<T> = Rc<dyn Fn(&T)>;

struct Subscriber<T> {
    callback: EventCallback<T>,
    refs: usize,
}

/// One named event channel.
pub struct EventQueue<T> {
    name: &'static str,
    subscribers: RefCell<Vec<Subscriber<T>>>,
}

fn same_callback<T>(a: &EventCallback<T>, b: &EventCallback<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl<T> EventQueue<T> {
    /// Creates an empty channel.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers a callback, or bumps its reference count if already present.
    ///
    /// Returns the callback's reference count after registration.
    pub fn register(&self, callback: &EventCallback<T>) -> usize {
        let mut subs = self.subscribers.borrow_mut();
        if let Some(sub) = subs.iter_mut().find(|s| same_callback(&s.callback, callback)) {
            sub.refs += 1;
            return sub.refs;
        }
        subs.push(Subscriber {
            callback: Rc::clone(callback),
            refs: 1,
        });
        tracing::debug!(queue = self.name, subscribers = subs.len(), "subscriber added");
        1
    }

    /// Drops one reference to a callback; removes it when the count hits zero.
    ///
    /// Returns false if the callback was not registered.
    pub fn unregister(&self, callback: &EventCallback<T>) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        let Some(pos) = subs
            .iter()
            .position(|s| same_callback(&s.callback, callback))
        else {
            return false;
        };
        subs[pos].refs -= 1;
        if subs[pos].refs == 0 {
            subs.remove(pos);
            tracing::debug!(queue = self.name, subscribers = subs.len(), "subscriber removed");
        }
        true
    }

    /// Returns true if the callback currently holds at least one reference.
    pub fn is_registered(&self, callback: &EventCallback<T>) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|s| same_callback(&s.callback, callback))
    }

    /// Reference count of a callback (0 if absent).
    pub fn ref_count(&self, callback: &EventCallback<T>) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .find(|s| same_callback(&s.callback, callback))
            .map(|s| s.refs)
            .unwrap_or(0)
    }

    /// Number of distinct subscribed callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Delivers an event to every subscriber once.
    pub fn notify(&self, event: &T) {
        let snapshot: Vec<EventCallback<T>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|s| Rc::clone(&s.callback))
            .collect();

        for callback in snapshot {
            if self.is_registered(&callback) {
                callback(event);
            }
        }
    }

    /// Removes every subscriber regardless of reference counts.
    pub fn clear(&self) {
        self.subscribers.borrow_mut().clear();
    }
}

impl<T> fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

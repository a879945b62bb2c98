use parking_lot::{Condvar, Mutex};

/// A single value passed from one thread to another.
///
/// The receiver blocks in `wait` until `notify` has stored a value. The
/// mutex provides the happens-before edge: everything the notifier wrote
/// before `notify` is visible to the waiter once `wait` returns.
pub(crate) struct Handoff<T> {
    value: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handoff<T> {
    pub const fn new() -> Self {
        Self {
            value: parking_lot::const_mutex(None),
            cond: Condvar::new(),
        }
    }

    pub fn notify(&self, value: T) {
        let mut slot = self.value.lock();
        debug_assert!(slot.is_none(), "Handoff notified twice");
        *slot = Some(value);
        self.cond.notify_one();
    }

    pub fn wait(&self) -> T {
        let mut slot = self.value.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.cond.wait(&mut slot);
        }
    }
}

//! Cached identity of the calling thread.
//!
//! Every os thread keeps its own copy of these facts in thread local storage.
//! They are computed on first use and stay valid for the life of the thread,
//! except across `fork()`: the child's only thread gets a new kernel id, so a
//! hook installed by [`initialize`] throws the inherited cache away.

use super::sys::{self, Tid};
use crate::{time, Result};
use parking_lot::Once;
use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    fmt, str,
    time::Duration,
};

pub(crate) const MAIN_NAME: &str = "main";
pub(crate) const UNKNOWN_NAME: &str = "unknown";
pub(crate) const FINISHED_NAME: &str = "finished";

const ID_STRING_CAPACITY: usize = 32;

/// The cached `"%5d "` rendering of a thread id.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct IdString {
    buf: [u8; ID_STRING_CAPACITY],
    len: u8,
}

impl IdString {
    const EMPTY: Self = Self {
        buf: [0; ID_STRING_CAPACITY],
        len: 0,
    };

    fn render(tid: Tid) -> Self {
        use std::io::Write;

        let mut this = Self::EMPTY;
        let mut cursor = &mut this.buf[..];
        let r = write!(cursor, "{:5} ", tid);
        debug_assert!(r.is_ok());
        let remaining = cursor.len();
        this.len = (ID_STRING_CAPACITY - remaining) as u8;
        this
    }

    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for IdString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for IdString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    static CACHED_ID: Cell<Tid> = const { Cell::new(0) };
    static ID_STRING: Cell<IdString> = const { Cell::new(IdString::EMPTY) };
    static NAME: RefCell<Option<Cow<'static, str>>> = const { RefCell::new(None) };
}

static INIT: Once = Once::new();

/// Sets up the process wide identity state.
///
/// Names the calling thread `"main"` when it is the initial thread of the
/// process, caches its id and installs the fork hook. Runs once per process,
/// later calls return immediately. Every entry point of this crate calls it,
/// so calling it by hand is only needed to pin the `"main"` name early.
pub fn initialize() {
    INIT.call_once(|| {
        sys::register_atfork_child(after_fork);

        let tid = cache_tid();
        if tid == sys::getpid() {
            set_name(MAIN_NAME);
        }

        log::debug!("thread identity initialized on tid {}", tid);
    });
}

/// Child side of `fork()`: the surviving thread is the new main thread.
unsafe extern "C" fn after_fork() {
    CACHED_ID.with(|id| id.set(0));
    NAME.with(|name| name.replace(Some(Cow::Borrowed(MAIN_NAME))));
    cache_tid();
}

/// Caches the calling thread's id if it hasn't been already and returns it.
pub fn resolve() -> Tid {
    initialize();
    cache_tid()
}

fn cache_tid() -> Tid {
    let cached = CACHED_ID.with(Cell::get);
    if cached != 0 {
        return cached;
    }

    let tid = sys::gettid();
    CACHED_ID.with(|id| id.set(tid));
    ID_STRING.with(|s| s.set(IdString::render(tid)));
    tid
}

/// The kernel id of the calling thread. Never zero.
#[inline]
pub fn id() -> Tid {
    resolve()
}

pub fn id_string() -> IdString {
    id();
    ID_STRING.with(Cell::get)
}

/// Whether the calling thread is the initial thread of the process.
pub fn is_main_thread() -> bool {
    id() == sys::getpid()
}

/// Runs `f` with the calling thread's display name.
pub fn with_name<T>(f: impl FnOnce(&str) -> T) -> T {
    let tid = resolve();
    let name = NAME.with(|name| name.borrow().clone());
    match name.as_deref() {
        Some(name) => f(name),
        None if tid == sys::getpid() => f(MAIN_NAME),
        None => f(UNKNOWN_NAME),
    }
}

pub fn name() -> String {
    with_name(str::to_owned)
}

/// Replaces the calling thread's display name.
///
/// Only the cached name changes, the kernel's copy is left alone.
pub fn set_name(name: impl Into<Cow<'static, str>>) {
    let name = Some(name.into());
    NAME.with(|slot| slot.replace(name));
}

/// Suspends the calling thread for at least `usec` microseconds.
///
/// A signal may end the sleep early, in which case
/// [`Error::Interrupted`](crate::Error::Interrupted) carries the time left.
/// The sleep is not restarted.
pub fn sleep_micros(usec: u64) -> Result<()> {
    sys::sleep_micros(usec)
}

pub fn sleep(duration: Duration) -> Result<()> {
    sleep_micros(time::as_micros(duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Instant};

    #[test]
    fn id_is_cached_and_nonzero() {
        let first = id();
        assert_ne!(first, 0);
        assert_eq!(first, id());
        assert_eq!(first, sys::gettid());
    }

    #[test]
    fn id_string_matches_id() {
        let tid = id();
        let rendered = id_string();
        assert_eq!(rendered.as_str(), format!("{:5} ", tid));
        assert_eq!(rendered.len(), rendered.as_str().len());
        assert!(rendered.as_str().ends_with(' '));
    }

    #[test]
    fn render_pads_short_ids() {
        assert_eq!(IdString::render(42).as_str(), "   42 ");
        assert_eq!(IdString::render(1234567).as_str(), "1234567 ");
    }

    #[test]
    fn threads_do_not_share_ids() {
        let here = id();
        let there = thread::spawn(id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn unnamed_side_threads_are_unknown() {
        thread::spawn(|| {
            assert!(!is_main_thread());
            assert_eq!(name(), UNKNOWN_NAME);

            set_name(String::from("worker-7"));
            assert_eq!(name(), "worker-7");
            with_name(|name| assert_eq!(name.len(), 8));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn rename_from_inside_with_name() {
        thread::spawn(|| {
            set_name("outer");
            let seen = with_name(|name| {
                set_name("inner");
                name.to_owned()
            });

            assert_eq!(seen, "outer");
            assert_eq!(name(), "inner");
        })
        .join()
        .unwrap();
    }

    #[test]
    fn after_fork_resets_to_main() {
        thread::spawn(|| {
            set_name("before");
            let before = id();
            unsafe { after_fork() };

            // Not actually forked, so the kernel hands back the same id.
            assert_eq!(id(), before);
            assert_eq!(name(), MAIN_NAME);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn sleep_micros_waits() {
        let start = Instant::now();
        sleep_micros(20_000).unwrap();
        assert!(start.elapsed() >= Duration::from_micros(20_000));
    }

    #[test]
    fn sleep_zero_returns() {
        sleep(Duration::ZERO).unwrap();
    }
}

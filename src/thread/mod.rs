pub mod current;
mod sys;

pub use self::{current::IdString, sys::Tid};

use crate::{sync::Handoff, Error, Result};
use libc::{c_void, pthread_t};
use std::{
    borrow::Cow,
    fmt,
    panic::{self, AssertUnwindSafe},
    ptr,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

const FALLBACK_NAME: &str = "yaarThread";

static NUM_CREATED: AtomicI32 = AtomicI32::new(0);

type ThreadFunc = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a [`Thread`].
#[derive(Debug, Default, Clone)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub const fn new() -> Self {
        Self {
            name: None,
            stack_size: None,
        }
    }

    /// The display name, also registered with the kernel once running.
    /// Left unset, the thread is called `Thread<N>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stack size in bytes. Raised to the platform minimum when smaller.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Creates the unstarted [`Thread`].
    pub fn build<F>(self, func: F) -> Thread
    where
        F: FnOnce() + Send + 'static,
    {
        let num = NUM_CREATED.fetch_add(1, Ordering::Relaxed) + 1;
        let name = self.name.unwrap_or_else(|| format!("Thread{}", num));

        current::initialize();
        Thread {
            started: false,
            joined: false,
            handle: None,
            tid: 0,
            func: Some(Box::new(func)),
            name,
            stack_size: self.stack_size,
        }
    }

    /// Creates the [`Thread`] and starts it.
    pub fn start<F>(self, func: F) -> Result<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut thread = self.build(func);
        thread.start()?;
        Ok(thread)
    }
}

/// An os thread running a single function.
///
/// A `Thread` is created unstarted. [`start`](Thread::start) launches it
/// and [`join`](Thread::join) waits for it to finish. Each may be called at
/// most once and in that order, anything else panics. Dropping a thread that
/// was started but never joined detaches it.
pub struct Thread {
    started: bool,
    joined: bool,
    handle: Option<pthread_t>,
    tid: Tid,
    func: Option<ThreadFunc>,
    name: String,
    stack_size: Option<usize>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("tid", &self.tid)
            .field("started", &self.started)
            .field("joined", &self.joined)
            .finish()
    }
}

impl Thread {
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().build(func)
    }

    /// Like [`Thread::new`], an empty `name` picks the default one.
    pub fn with_name<F>(func: F, name: impl Into<String>) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        match name.is_empty() {
            true => Builder::new().build(func),
            false => Builder::new().name(name).build(func),
        }
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// How many `Thread`s have been created in this process.
    pub fn num_created() -> i32 {
        NUM_CREATED.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kernel id of the spawned thread, `0` until it has been started.
    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Launches the os thread.
    ///
    /// Returns once the new thread has reported its id, so [`tid`](Thread::tid)
    /// is valid afterwards. If the os refuses to create the thread the
    /// `Thread` stays unstarted and may be started again.
    ///
    /// # Panics
    ///
    /// If the thread was already started.
    pub fn start(&mut self) -> Result<()> {
        assert!(!self.started, "thread {:?} started twice", self.name);

        let attr = sys::Attr::new(self.stack_size).map_err(Error::Attr)?;
        let func = self.func.take().expect("unstarted thread without a function");
        let tid = Arc::new(Handoff::new());
        let data = Box::new(ThreadData {
            func,
            name: self.name.clone(),
            tid: Some(Arc::clone(&tid)),
        });

        let raw = Box::into_raw(data);
        let handle = match unsafe { sys::spawn(&attr, thread_start, raw as *mut c_void) } {
            Ok(handle) => handle,
            Err(e) => {
                // Never reached the new thread, so ownership is still ours.
                let data = unsafe { Box::from_raw(raw) };
                self.func = Some(data.func);
                log::trace!("failed to spawn thread {:?}: {}", self.name, e);
                return Err(Error::Spawn(e));
            }
        };

        self.handle = Some(handle);
        self.started = true;
        self.tid = tid.wait();

        log::trace!("started thread {:?} with tid {}", self.name, self.tid);
        Ok(())
    }

    /// Blocks until the thread's function has returned.
    ///
    /// The thread counts as joined even if the os reports an error.
    /// A panic inside the function is not reported here.
    ///
    /// # Panics
    ///
    /// If the thread was never started or was already joined.
    pub fn join(&mut self) -> Result<()> {
        assert!(self.started, "thread {:?} joined before start", self.name);
        assert!(!self.joined, "thread {:?} joined twice", self.name);
        self.joined = true;

        let handle = self.handle.take().expect("started thread without a handle");
        log::trace!("joining thread {:?}", self.name);
        unsafe { sys::join(handle) }.map_err(Error::Join)
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.started && !self.joined {
            if let Some(handle) = self.handle.take() {
                log::trace!("detaching thread {:?}", self.name);
                unsafe { sys::detach(handle) };
            }
        }
    }
}

/// Everything the new thread needs, owned by it once `pthread_create` succeeds.
struct ThreadData {
    func: ThreadFunc,
    name: String,
    tid: Option<Arc<Handoff<Tid>>>,
}

impl ThreadData {
    fn run(mut self) {
        if let Some(tid) = self.tid.take() {
            tid.notify(current::id());
        }

        let name: Cow<'static, str> = match self.name.is_empty() {
            true => Cow::Borrowed(FALLBACK_NAME),
            false => Cow::Owned(self.name),
        };
        if let Err(e) = sys::set_os_thread_name(&name) {
            log::warn!("os rejected thread name {:?}: {}", name, e);
        }
        current::set_name(name);

        if panic::catch_unwind(AssertUnwindSafe(self.func)).is_err() {
            current::with_name(|name| log::error!("thread {:?} panicked", name));
        }

        current::set_name(current::FINISHED_NAME);
    }
}

extern "C" fn thread_start(data: *mut c_void) -> *mut c_void {
    let data = unsafe { Box::from_raw(data as *mut ThreadData) };
    data.run();
    ptr::null_mut()
}

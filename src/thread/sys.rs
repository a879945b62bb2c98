use crate::{
    time::{MICROSECONDS_PER_SECOND, NANOSECONDS_PER_MICROSECOND},
    Error, Result,
};
use libc::{
    c_void, pid_t, pthread_attr_destroy, pthread_attr_init, pthread_attr_setstacksize,
    pthread_attr_t, pthread_create, pthread_detach, pthread_join, pthread_t, timespec,
};
use std::{ffi::CString, io, mem::MaybeUninit, ptr, time::Duration};

pub type Tid = pid_t;

pub type RawEntry = extern "C" fn(*mut c_void) -> *mut c_void;

#[inline]
pub fn gettid() -> Tid {
    unsafe { libc::syscall(libc::SYS_gettid) as Tid }
}

#[inline]
pub fn getpid() -> Tid {
    unsafe { libc::getpid() }
}

/// Registers `name` with the kernel for the calling thread.
/// The kernel keeps at most 15 bytes, longer names are truncated.
pub fn set_os_thread_name(name: &str) -> io::Result<()> {
    let name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let r = unsafe { libc::prctl(libc::PR_SET_NAME, name.as_ptr() as libc::c_ulong, 0, 0, 0) };
    match r {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Reads back the kernel name of the calling thread.
#[cfg(test)]
pub fn os_thread_name() -> io::Result<String> {
    let mut buf = [0u8; 16];
    let r = unsafe { libc::prctl(libc::PR_GET_NAME, buf.as_mut_ptr() as libc::c_ulong, 0, 0, 0) };
    if r != 0 {
        return Err(io::Error::last_os_error());
    }

    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// Sleeps for `usec` microseconds using a single `nanosleep`.
/// On `EINTR` the unslept time is handed back instead of retrying.
pub fn sleep_micros(usec: u64) -> Result<()> {
    let ts = timespec {
        tv_sec: (usec / MICROSECONDS_PER_SECOND) as libc::time_t,
        tv_nsec: ((usec % MICROSECONDS_PER_SECOND) * NANOSECONDS_PER_MICROSECOND) as libc::c_long,
    };
    let mut rem = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    let r = unsafe { libc::nanosleep(&ts, &mut rem) };
    if r == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EINTR) => Err(Error::Interrupted {
            remaining: Duration::new(rem.tv_sec as u64, rem.tv_nsec as u32),
        }),
        _ => Err(Error::Sleep(err)),
    }
}

pub fn register_atfork_child(child: unsafe extern "C" fn()) {
    let r = unsafe { libc::pthread_atfork(None, None, Some(child)) };
    debug_assert_eq!(r, 0);
}

/// Thread creation attributes.
/// Owns an initialized `pthread_attr_t` and destroys it on drop.
pub struct Attr {
    attr: pthread_attr_t,
}

impl Attr {
    pub fn new(stack_size: Option<usize>) -> io::Result<Self> {
        let mut attr = MaybeUninit::<pthread_attr_t>::uninit();
        let r = unsafe { pthread_attr_init(attr.as_mut_ptr()) };
        if r != 0 {
            return Err(io::Error::from_raw_os_error(r));
        }

        let mut this = Self {
            attr: unsafe { attr.assume_init() },
        };

        if let Some(stack_size) = stack_size {
            let stack_size = stack_size.max(libc::PTHREAD_STACK_MIN);
            let r = unsafe { pthread_attr_setstacksize(&mut this.attr, stack_size) };
            if r != 0 {
                return Err(io::Error::from_raw_os_error(r));
            }
        }

        Ok(this)
    }
}

impl Drop for Attr {
    fn drop(&mut self) {
        let r = unsafe { pthread_attr_destroy(&mut self.attr) };
        debug_assert_eq!(r, 0);
    }
}

/// Spawns a native thread running `entry(arg)`.
///
/// # Safety
///
/// `arg` must stay valid until `entry` takes it over. On error the thread
/// was never created and the caller still owns `arg`.
pub unsafe fn spawn(attr: &Attr, entry: RawEntry, arg: *mut c_void) -> io::Result<pthread_t> {
    let mut handle = MaybeUninit::<pthread_t>::uninit();
    let r = pthread_create(handle.as_mut_ptr(), &attr.attr, entry, arg);
    match r {
        0 => Ok(handle.assume_init()),
        _ => Err(io::Error::from_raw_os_error(r)),
    }
}

/// Waits for the thread behind `handle` to exit.
///
/// # Safety
///
/// `handle` must come from [`spawn`] and must not have been joined or
/// detached before.
pub unsafe fn join(handle: pthread_t) -> io::Result<()> {
    let r = pthread_join(handle, ptr::null_mut());
    match r {
        0 => Ok(()),
        _ => Err(io::Error::from_raw_os_error(r)),
    }
}

/// # Safety
///
/// Same contract as [`join`].
pub unsafe fn detach(handle: pthread_t) {
    let r = pthread_detach(handle);
    debug_assert_eq!(r, 0);
}

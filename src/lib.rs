//! Native threads with a cached, fork safe view of "who am I".
//!
//! [`Thread`] wraps a single pthread: it is created with a function and a
//! name, started once, and either joined or detached on drop.
//! [`thread::current`] answers identity questions about the calling thread
//! (kernel tid, display name, main thread or not) from thread local caches.

#![warn(rust_2018_idioms)]

#[cfg(not(target_os = "linux"))]
compile_error!("yaar-thread only supports linux threads");

mod error;
mod sync;
pub mod thread;
pub mod time;

pub use self::{
    error::{Error, Result},
    thread::{Builder, Thread, Tid},
};

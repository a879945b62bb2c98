//! `resolve()` as the very first call into the crate must still leave the
//! fork hook installed, otherwise a forked child keeps the parent's tid.

use yaar_thread::thread::current;

fn main() {
    let parent_tid = current::resolve();
    assert_eq!(parent_tid, unsafe { libc::getpid() });

    match unsafe { libc::fork() } {
        -1 => panic!("fork failed: {}", std::io::Error::last_os_error()),
        0 => {
            let ok = current::id() != parent_tid
                && current::id() == unsafe { libc::getpid() }
                && current::is_main_thread();
            unsafe { libc::_exit(if ok { 0 } else { 1 }) };
        }
        child => {
            let mut status = 0;
            let r = unsafe { libc::waitpid(child, &mut status, 0) };
            assert_eq!(r, child);
            assert!(libc::WIFEXITED(status));
            assert_eq!(libc::WEXITSTATUS(status), 0, "child reported the parent's tid");
        }
    }

    assert_eq!(current::id(), parent_tid);
    println!("resolve_then_fork: ok");
}

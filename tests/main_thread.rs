//! Runs without the test harness so the checks execute on the process's
//! initial thread, and so `fork()` happens while no other threads exist.

use yaar_thread::{thread::current, Thread};

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();

    main_thread_is_named_main();
    spawned_threads_are_not_main();
    fork_child_gets_fresh_identity();

    println!("main_thread: ok");
}

fn main_thread_is_named_main() {
    assert_eq!(Thread::num_created(), 0);
    assert_eq!(current::name(), "main");
    assert!(current::is_main_thread());
    assert_eq!(current::id(), unsafe { libc::getpid() });
}

fn spawned_threads_are_not_main() {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut thread = Thread::new(move || {
        tx.send((current::is_main_thread(), current::name())).unwrap();
    });

    thread.start().unwrap();
    thread.join().unwrap();

    let (is_main, name) = rx.recv().unwrap();
    assert!(!is_main);
    assert_eq!(name, "Thread1");
    assert_ne!(thread.tid(), current::id());

    // Spawning must not disturb the caller's identity.
    assert_eq!(current::name(), "main");
}

fn fork_child_gets_fresh_identity() {
    current::set_name("parent");
    let parent_id = current::id();

    match unsafe { libc::fork() } {
        -1 => panic!("fork failed: {}", std::io::Error::last_os_error()),
        0 => {
            let ok = current::id() != parent_id
                && current::id() == unsafe { libc::getpid() }
                && current::is_main_thread()
                && current::id_string().as_str() == format!("{:5} ", current::id())
                && current::name() == "main";
            unsafe { libc::_exit(if ok { 0 } else { 1 }) };
        }
        child => {
            let mut status = 0;
            let r = unsafe { libc::waitpid(child, &mut status, 0) };
            assert_eq!(r, child);
            assert!(libc::WIFEXITED(status));
            assert_eq!(libc::WEXITSTATUS(status), 0, "child kept the parent's identity");
        }
    }

    assert_eq!(current::id(), parent_id);
    assert_eq!(current::name(), "parent");
    current::set_name("main");
}

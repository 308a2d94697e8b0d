//! Blocking-adapter I/O over pipes: park on EAGAIN, wake on readiness.

mod util;

use goro::{go, io, WaitGroup};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    (fds[0], fds[1])
}

#[test]
fn parked_readers_wake_on_data() {
    const PIPES: usize = 8;

    util::run(|| {
        let wg = Arc::new(WaitGroup::new());
        let woken = Arc::new(AtomicUsize::new(0));
        wg.add(PIPES as i64);

        let mut write_ends = Vec::with_capacity(PIPES);
        for i in 0..PIPES {
            let (rfd, wfd) = pipe();
            write_ends.push(wfd);

            let wg2 = Arc::clone(&wg);
            let woken2 = Arc::clone(&woken);
            go(move || {
                io::set_nonblocking(rfd).unwrap();
                let mut buf = [0u8; 4];
                // Pipe is empty, so this parks until the writer below
                // delivers
                let n = io::read(rfd, &mut buf).unwrap();
                assert_eq!(n, 1);
                assert_eq!(buf[0], i as u8);
                woken2.fetch_add(1, Ordering::SeqCst);
                io::unwatch(rfd);
                unsafe { libc::close(rfd) };
                wg2.done();
            })
            .unwrap();
        }

        // Let every reader hit EAGAIN and park first
        goro::sleep(Duration::from_millis(20));
        for (i, &wfd) in write_ends.iter().enumerate() {
            let byte = [i as u8];
            let n = unsafe { libc::write(wfd, byte.as_ptr() as *const libc::c_void, 1) };
            assert_eq!(n, 1);
        }

        wg.wait().unwrap();
        assert_eq!(woken.load(Ordering::SeqCst), PIPES);
        for wfd in write_ends {
            unsafe { libc::close(wfd) };
        }
    });
}

#[test]
fn racing_readers_on_one_descriptor_both_finish() {
    // Two coroutines blocking-read the same fd; each re-watch evicts the
    // other's registration, and the evicted side must be woken to retry
    // rather than sleep through its displacement
    util::run(|| {
        let (rfd, wfd) = pipe();
        io::set_nonblocking(rfd).unwrap();

        let wg = Arc::new(WaitGroup::new());
        let received = Arc::new(AtomicUsize::new(0));
        wg.add(2);

        for _ in 0..2 {
            let wg2 = Arc::clone(&wg);
            let received2 = Arc::clone(&received);
            go(move || {
                let mut buf = [0u8; 1];
                let n = io::read(rfd, &mut buf).unwrap();
                assert_eq!(n, 1);
                received2.fetch_add(1, Ordering::SeqCst);
                wg2.done();
            })
            .unwrap();
        }

        goro::sleep(Duration::from_millis(20));
        let n = unsafe { libc::write(wfd, b"ab".as_ptr() as *const libc::c_void, 2) };
        assert_eq!(n, 2);

        wg.wait().unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 2);
        io::unwatch(rfd);
        unsafe {
            libc::close(rfd);
            libc::close(wfd);
        }
    });
}

#[test]
fn write_backpressure_drains_through_reader() {
    // Larger than the default pipe buffer so the writer must park at
    // least once with write interest
    const LEN: usize = 256 * 1024;

    util::run(|| {
        let (rfd, wfd) = pipe();
        io::set_nonblocking(rfd).unwrap();
        io::set_nonblocking(wfd).unwrap();

        let wg = Arc::new(WaitGroup::new());
        wg.add(2);

        let wg_w = Arc::clone(&wg);
        go(move || {
            let data: Vec<u8> = (0..LEN).map(|i| (i % 251) as u8).collect();
            let n = io::write(wfd, &data).unwrap();
            assert_eq!(n, LEN, "partial write leaked through");
            io::unwatch(wfd);
            unsafe { libc::close(wfd) };
            wg_w.done();
        })
        .unwrap();

        let wg_r = Arc::clone(&wg);
        go(move || {
            let mut total = 0usize;
            let mut buf = [0u8; 4096];
            while total < LEN {
                let n = io::read(rfd, &mut buf).unwrap();
                assert!(n > 0, "unexpected EOF at {} bytes", total);
                for (j, &b) in buf[..n].iter().enumerate() {
                    assert_eq!(b, ((total + j) % 251) as u8, "byte corrupted in transit");
                }
                total += n;
            }
            assert_eq!(total, LEN);
            io::unwatch(rfd);
            unsafe { libc::close(rfd) };
            wg_r.done();
        })
        .unwrap();

        wg.wait().unwrap();
    });
}

#[test]
fn closed_write_end_reads_as_eof() {
    util::run(|| {
        let (rfd, wfd) = pipe();
        io::set_nonblocking(rfd).unwrap();

        let wg = Arc::new(WaitGroup::new());
        wg.add(1);

        let wg2 = Arc::clone(&wg);
        go(move || {
            let mut total = 0usize;
            let mut buf = [0u8; 64];
            loop {
                let n = io::read(rfd, &mut buf).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            assert_eq!(total, 5);
            io::unwatch(rfd);
            unsafe { libc::close(rfd) };
            wg2.done();
        })
        .unwrap();

        goro::sleep(Duration::from_millis(10));
        let n = unsafe { libc::write(wfd, b"hello".as_ptr() as *const libc::c_void, 5) };
        assert_eq!(n, 5);
        unsafe { libc::close(wfd) };

        wg.wait().unwrap();
    });
}

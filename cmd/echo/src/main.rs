//! TCP echo server
//!
//! Accepts on the main thread and serves each connection from its own
//! coroutine with the blocking-adapter read/write. Try it with
//! `nc 127.0.0.1 7878`.

use goro::{go, io, Runtime, RuntimeConfig};
use std::net::TcpListener;
use std::os::fd::IntoRawFd;

fn serve(fd: i32) {
    let mut buf = [0u8; 4096];
    loop {
        match io::read(fd, &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = io::write(fd, &buf[..n]) {
                    goro::kwarn!("write on fd {} failed: {:?}", fd, e);
                    break;
                }
            }
            Err(e) => {
                goro::kwarn!("read on fd {} failed: {:?}", fd, e);
                break;
            }
        }
    }
    io::unwatch(fd);
    unsafe { libc::close(fd) };
    goro::kinfo!("connection on fd {} closed", fd);
}

fn main() {
    goro::init_logging();

    let rt = Runtime::new(RuntimeConfig::from_env()).expect("runtime init");
    rt.start().expect("runtime start");

    let addr = "127.0.0.1:7878";
    let listener = TcpListener::bind(addr).expect("bind");
    println!("echo server listening on {}", addr);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                goro::kwarn!("accept failed: {}", e);
                continue;
            }
        };
        let fd = stream.into_raw_fd();
        if let Err(e) = io::set_nonblocking(fd) {
            goro::kwarn!("set_nonblocking on fd {} failed: {:?}", fd, e);
            unsafe { libc::close(fd) };
            continue;
        }
        if let Err(e) = go(move || serve(fd)) {
            goro::kwarn!("spawn for fd {} failed: {:?}", fd, e);
            unsafe { libc::close(fd) };
        }
    }

    rt.shutdown();
}

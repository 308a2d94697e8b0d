//! Blocking-adapter I/O
//!
//! Synchronous-looking read/write for coroutine code. Descriptors are
//! non-blocking underneath; EAGAIN arms the netpoller for the needed
//! direction and parks the caller, so the worker thread stays free.
//! Only callable inside a coroutine.

use crate::netpoller::{self, Interest};
use crate::scheduler;
use crate::tls;
use goro_core::error::{CoroError, CoroResult};

#[inline]
pub(crate) fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Put `fd` into non-blocking mode if it is not already.
///
/// Call this on every descriptor before its first `read`/`write`: a
/// still-blocking fd would block the worker thread in the read syscall
/// before the netpoller ever sees it. The netpoller also applies this on
/// first watch, but by then the first syscall has already happened.
pub fn set_nonblocking(fd: i32) -> CoroResult<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(CoroError::Io(errno()));
    }
    if flags & libc::O_NONBLOCK == 0 {
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if ret < 0 {
            return Err(CoroError::Io(errno()));
        }
    }
    Ok(())
}

/// Read up to `buf.len()` bytes from `fd`. Returns 0 at EOF. Parks on
/// EAGAIN until the netpoller reports the descriptor readable.
pub fn read(fd: i32, buf: &mut [u8]) -> CoroResult<usize> {
    if !tls::is_in_coroutine() {
        return Err(CoroError::NotInCoroutine);
    }
    let current = tls::current_coro();

    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let e = errno();
        if e == libc::EINTR {
            continue;
        }
        if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
            netpoller::global()?.watch(fd, Interest::Read, current)?;
            scheduler::park_current();
            continue;
        }
        return Err(CoroError::Io(e));
    }
}

/// Write the whole buffer to `fd`, parking on EAGAIN with write
/// interest. Returns `buf.len()` on success.
pub fn write(fd: i32, buf: &[u8]) -> CoroResult<usize> {
    if !tls::is_in_coroutine() {
        return Err(CoroError::NotInCoroutine);
    }
    let current = tls::current_coro();
    let mut written = 0usize;

    while written < buf.len() {
        let rest = &buf[written..];
        let n = unsafe { libc::write(fd, rest.as_ptr() as *const libc::c_void, rest.len()) };
        if n > 0 {
            written += n as usize;
            continue;
        }
        if n == 0 {
            // Zero-length progress on a non-empty buffer means the peer
            // cannot take more; treat like EAGAIN
            netpoller::global()?.watch(fd, Interest::Write, current)?;
            scheduler::park_current();
            continue;
        }
        let e = errno();
        if e == libc::EINTR {
            continue;
        }
        if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
            netpoller::global()?.watch(fd, Interest::Write, current)?;
            scheduler::park_current();
            continue;
        }
        return Err(CoroError::Io(e));
    }
    Ok(written)
}

/// Tell the netpoller a descriptor is going away. Call before close on
/// any fd that was ever watched.
pub fn unwatch(fd: i32) {
    if let Ok(poller) = netpoller::global() {
        poller.unwatch(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_coroutine_rejected() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            read(0, &mut buf),
            Err(CoroError::NotInCoroutine)
        ));
        assert!(matches!(write(1, b"x"), Err(CoroError::NotInCoroutine)));
    }
}

//! Netpoller
//!
//! Readiness events for the blocking-adapter I/O layer. One dedicated
//! thread runs epoll_wait; descriptors are armed one-shot per direction,
//! so a waiter is woken at most once per arming and re-arms on its next
//! EAGAIN. At most one waiter per direction per descriptor.

use crate::scheduler;
use goro_core::error::{CoroError, CoroResult};
use goro_core::id::CoroId;
use goro_core::SpinLock;
use goro_core::{kdebug, kerror, kwarn};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use std::collections::HashMap;
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::JoinHandle;

/// Direction a coroutine is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// What kind of peer sits behind the descriptor. Only used for
/// diagnostics; the wake path treats all kinds the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Stream,
    Database,
    Web,
}

/// Per-descriptor record. One waiter per direction.
struct IoContext {
    kind: IoKind,
    reader: CoroId,
    writer: CoroId,
}

pub struct Netpoller {
    epoll: Epoll,
    contexts: SpinLock<HashMap<RawFd, IoContext>>,
    stop: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

static POLLER: OnceLock<Netpoller> = OnceLock::new();

/// Create the poller and start its thread. Called from scheduler start.
pub fn start() -> CoroResult<()> {
    let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
        .map_err(|e| CoroError::PollerRegistration(e as i32))?;

    let poller = Netpoller {
        epoll,
        contexts: SpinLock::new(HashMap::new()),
        stop: AtomicBool::new(false),
        handle: Mutex::new(None),
    };
    POLLER
        .set(poller)
        .map_err(|_| CoroError::AlreadyInitialized)?;

    let handle = std::thread::Builder::new()
        .name("goro-netpoller".to_string())
        .spawn(|| {
            if let Some(p) = POLLER.get() {
                p.poll_loop();
            }
        })
        .map_err(|_| CoroError::NotInitialized)?;

    if let Some(p) = POLLER.get() {
        *p.handle.lock().unwrap() = Some(handle);
    }
    Ok(())
}

/// The global poller, or NotInitialized.
#[inline]
pub fn global() -> CoroResult<&'static Netpoller> {
    POLLER.get().ok_or(CoroError::NotInitialized)
}

/// Stop the poller thread and join it.
pub fn shutdown() {
    let Some(poller) = POLLER.get() else { return };
    poller.stop.store(true, Ordering::Release);
    if let Some(handle) = poller.handle.lock().unwrap().take() {
        let _ = handle.join();
    }
}

impl Netpoller {
    /// Register `coro` as the waiter for one direction of `fd` and arm a
    /// one-shot interest. The caller parks right after; the poll loop
    /// wakes it when the direction becomes ready.
    pub fn watch(&self, fd: RawFd, interest: Interest, coro: CoroId) -> CoroResult<()> {
        self.watch_with_kind(fd, interest, coro, IoKind::Stream)
    }

    pub fn watch_with_kind(
        &self,
        fd: RawFd,
        interest: Interest,
        coro: CoroId,
        kind: IoKind,
    ) -> CoroResult<()> {
        let mut contexts = self.contexts.lock();

        let is_new = !contexts.contains_key(&fd);
        if is_new {
            crate::io::set_nonblocking(fd)?;
        }

        let ctx = contexts.entry(fd).or_insert(IoContext {
            kind,
            reader: CoroId::NONE,
            writer: CoroId::NONE,
        });
        let slot = match interest {
            Interest::Read => &mut ctx.reader,
            Interest::Write => &mut ctx.writer,
        };
        // A second watcher on the same direction evicts the first; the
        // evicted coroutine gets woken so its retry loop re-validates
        // instead of parking forever
        let displaced = if slot.is_some() && *slot != coro {
            kwarn!("fd {} {:?} waiter {} displaced by {}", fd, interest, slot, coro);
            std::mem::replace(slot, coro)
        } else {
            *slot = coro;
            CoroId::NONE
        };

        let mut flags = EpollFlags::EPOLLONESHOT | EpollFlags::EPOLLRDHUP;
        if ctx.reader.is_some() {
            flags |= EpollFlags::EPOLLIN;
        }
        if ctx.writer.is_some() {
            flags |= EpollFlags::EPOLLOUT;
        }

        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut event = EpollEvent::new(flags, fd as u64);
        let armed = if is_new {
            match self.epoll.add(borrowed, event) {
                // Map entry lost track of an earlier registration
                Err(nix::errno::Errno::EEXIST) => self.epoll.modify(borrowed, &mut event),
                other => other,
            }
        } else {
            match self.epoll.modify(borrowed, &mut event) {
                // Descriptor was closed and reopened with the same number
                Err(nix::errno::Errno::ENOENT) => self.epoll.add(borrowed, event),
                other => other,
            }
        };

        if let Err(e) = armed {
            // Detach the waiter we just parked-to-be; the caller decides
            // how to recover
            match interest {
                Interest::Read => ctx.reader = CoroId::NONE,
                Interest::Write => ctx.writer = CoroId::NONE,
            }
            kerror!("netpoller failed to arm fd {}: {}", fd, e);
            drop(contexts);
            if displaced.is_some() {
                scheduler::push_ready(displaced);
            }
            return Err(CoroError::PollerRegistration(e as i32));
        }

        // Wake outside the lock
        drop(contexts);
        if displaced.is_some() {
            scheduler::push_ready(displaced);
        }
        Ok(())
    }

    /// Drop interest in `fd` entirely. Pending waiters are woken so
    /// their retry observes the closed descriptor.
    pub fn unwatch(&self, fd: RawFd) {
        let ctx = self.contexts.lock().remove(&fd);
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let _ = self.epoll.delete(borrowed);

        if let Some(ctx) = ctx {
            if ctx.reader.is_some() {
                scheduler::push_ready(ctx.reader);
            }
            if ctx.writer.is_some() {
                scheduler::push_ready(ctx.writer);
            }
        }
    }

    /// Descriptors currently tracked.
    pub fn watched_count(&self) -> usize {
        self.contexts.lock().len()
    }

    fn poll_loop(&self) {
        let mut events = [EpollEvent::empty(); 64];

        while !self.stop.load(Ordering::Acquire) {
            // Bounded wait so the stop flag is observed promptly
            let n = match self.epoll.wait(&mut events, EpollTimeout::from(50u16)) {
                Ok(n) => n,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => {
                    kerror!("epoll_wait failed: {}", e);
                    break;
                }
            };

            for event in &events[..n] {
                let fd = event.data() as RawFd;
                let flags = event.events();

                let readable = flags.intersects(
                    EpollFlags::EPOLLIN
                        | EpollFlags::EPOLLRDHUP
                        | EpollFlags::EPOLLHUP
                        | EpollFlags::EPOLLERR,
                );
                let writable = flags
                    .intersects(EpollFlags::EPOLLOUT | EpollFlags::EPOLLHUP | EpollFlags::EPOLLERR);

                // Detach under the lock so each waiter is taken at most
                // once, then wake outside it
                let (reader, writer, kind) = {
                    let mut contexts = self.contexts.lock();
                    let Some(ctx) = contexts.get_mut(&fd) else {
                        continue;
                    };
                    let r = if readable {
                        std::mem::replace(&mut ctx.reader, CoroId::NONE)
                    } else {
                        CoroId::NONE
                    };
                    let w = if writable {
                        std::mem::replace(&mut ctx.writer, CoroId::NONE)
                    } else {
                        CoroId::NONE
                    };
                    (r, w, ctx.kind)
                };

                if reader.is_some() {
                    kdebug!("fd {} readable ({:?}), waking {}", fd, kind, reader);
                    scheduler::push_ready(reader);
                }
                if writer.is_some() {
                    kdebug!("fd {} writable ({:?}), waking {}", fd, kind, writer);
                    scheduler::push_ready(writer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::io::set_nonblocking;
    use std::os::fd::RawFd;

    #[test]
    fn test_set_nonblocking_on_pipe() {
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);

        set_nonblocking(fds[0]).unwrap();
        let flags = unsafe { libc::fcntl(fds[0], libc::F_GETFL) };
        assert!(flags & libc::O_NONBLOCK != 0);

        // Idempotent
        set_nonblocking(fds[0]).unwrap();

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn test_set_nonblocking_bad_fd() {
        assert!(set_nonblocking(-1).is_err());
    }
}

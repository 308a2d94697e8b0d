//! Global scheduler
//!
//! M:N scheduling of coroutines over a pool of worker threads. One global
//! FIFO ready queue, one timer heap drained by the workers, one netpoller
//! thread.
//!
//! # Suspend/wake handshake
//!
//! A coroutine that parks switches out while still `Running`; its worker
//! stores `Blocked` only after the registers are saved, so no other
//! worker can resume a half-saved context. Wakers set `wake_pending`
//! before attempting the `Blocked -> Ready` CAS, and the worker consumes
//! `wake_pending` after storing `Blocked`. Whichever side wins the CAS
//! enqueues; the loser does nothing. A wake can therefore never be lost
//! in the window before the park completes, and a coroutine can never be
//! enqueued twice for one park. Workers never re-enqueue a coroutine on
//! their own; every resume is driven by a primitive, timer or poller
//! wake (yield is the coroutine waking itself through the same path).

use crate::arch;
use crate::config::RuntimeConfig;
use crate::coroutine::CoroTable;
use crate::netpoller;
use crate::ready_queue::ReadyQueue;
use crate::timer::{now_ns, TimerEntry, TimerHeap};
use crate::tls;
use goro_core::error::{CoroError, CoroResult};
use goro_core::id::CoroId;
use goro_core::state::CoroState;
use goro_core::{kdebug, kerror, kwarn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

static SCHEDULER: OnceLock<Scheduler> = OnceLock::new();

pub struct Scheduler {
    config: RuntimeConfig,
    table: CoroTable,
    ready: ReadyQueue,
    timers: TimerHeap,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Install the global scheduler. Call once, before `start`.
pub fn init(config: RuntimeConfig) -> CoroResult<()> {
    if let Err(e) = config.validate() {
        kerror!("rejecting runtime config: {}", e);
        return Err(CoroError::NotInitialized);
    }
    // Pin the monotonic clock epoch before anything reads it
    let _ = now_ns();

    let sched = Scheduler {
        table: CoroTable::new(config.max_coroutines, config.stack_size),
        ready: ReadyQueue::new(),
        timers: TimerHeap::new(),
        running: AtomicBool::new(false),
        workers: Mutex::new(Vec::new()),
        config,
    };
    SCHEDULER
        .set(sched)
        .map_err(|_| CoroError::AlreadyInitialized)
}

/// The global scheduler, or NotInitialized.
#[inline]
pub fn global() -> CoroResult<&'static Scheduler> {
    SCHEDULER.get().ok_or(CoroError::NotInitialized)
}

/// Start workers and the netpoller thread.
pub fn start() -> CoroResult<()> {
    let sched = global()?;
    if sched.running.swap(true, Ordering::SeqCst) {
        return Err(CoroError::AlreadyInitialized);
    }

    netpoller::start()?;

    let mut handles = sched.workers.lock().unwrap();
    for i in 0..sched.config.num_workers {
        let handle = thread::Builder::new()
            .name(format!("goro-worker-{}", i))
            .spawn(move || {
                // The OnceLock is set; workers only start after init
                if let Ok(s) = global() {
                    s.worker_loop(i);
                }
            })
            .map_err(|_| CoroError::NotInitialized)?;
        handles.push(handle);
    }
    Ok(())
}

/// Stop workers and the netpoller and join them. Parked coroutines are
/// abandoned; their stacks go away with the process.
pub fn shutdown() {
    let Ok(sched) = global() else { return };
    if !sched.running.swap(false, Ordering::SeqCst) {
        return;
    }

    netpoller::shutdown();
    sched.ready.wake_all();

    let handles = std::mem::take(&mut *sched.workers.lock().unwrap());
    for h in handles {
        let _ = h.join();
    }
}

/// True between `start` and `shutdown`.
pub fn is_running() -> bool {
    global()
        .map(|s| s.running.load(Ordering::Acquire))
        .unwrap_or(false)
}

impl Scheduler {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Allocate a slot, lay out the initial context and enqueue Ready.
    pub fn spawn<F>(&self, f: F) -> CoroResult<CoroId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.table.allocate()?;
        let slot = match self.table.slot(id) {
            Some(s) => s,
            None => return Err(CoroError::NoSlotsAvailable),
        };

        let task: Box<dyn FnOnce() + Send> = Box::new(f);
        let task_ptr = Box::into_raw(Box::new(task));

        let stack_top = match slot.stack_top() {
            Some(top) => top,
            None => {
                // Reclaim the task and the slot; the stack mapping failed
                unsafe {
                    drop(Box::from_raw(task_ptr));
                }
                self.table.release(id);
                return Err(CoroError::StackAllocationFailed);
            }
        };

        unsafe {
            arch::init_context(
                slot.regs_ptr(),
                stack_top,
                coro_entry as usize,
                task_ptr as usize,
            );
        }

        slot.state.store(CoroState::Ready);
        self.ready.push(id);
        Ok(id)
    }

    /// Generation-checked wake. Safe from any thread, idempotent per
    /// park. See the module docs for the handshake.
    pub fn wake(&self, id: CoroId) {
        let Some(slot) = self.table.slot(id) else { return };

        slot.wake_pending.store(true, Ordering::Release);
        if slot.state.transition(CoroState::Blocked, CoroState::Ready) {
            slot.wake_pending.store(false, Ordering::Release);
            self.ready.push(id);
        }
    }

    /// Arm a timer. The callback (if any) runs on the draining worker,
    /// then `coro` is woken.
    pub fn add_timer(
        &self,
        after: Duration,
        coro: CoroId,
        callback: Option<Box<dyn FnOnce() + Send>>,
    ) {
        self.timers.add(TimerEntry {
            deadline_ns: now_ns() + after.as_nanos() as u64,
            coro,
            callback,
        });
        // A parked worker may be sleeping past this deadline; nudge one
        // so it recomputes its park bound
        self.ready.wake_one();
    }

    pub fn live_coroutines(&self) -> usize {
        self.table.live_count()
    }

    fn fire_expired_timers(&self) {
        loop {
            let now = now_ns();
            let Some(mut entry) = self.timers.pop_expired(now) else {
                return;
            };
            if let Some(cb) = entry.callback.take() {
                cb();
            }
            if entry.coro.is_some() {
                self.wake(entry.coro);
            }
        }
    }

    fn worker_loop(&'static self, worker_id: usize) {
        let mut sched_regs = Box::new(arch::SavedRegs::zeroed());
        tls::set_sched_regs(&mut *sched_regs);

        if self.config.debug_logging {
            kdebug!("worker {} started", worker_id);
        }

        let park_timeout = self.config.park_timeout;
        let spin_limit = self.config.idle_spins;
        let mut idle_spins: u32 = 0;

        while self.running.load(Ordering::Acquire) {
            self.fire_expired_timers();

            if let Some(id) = self.ready.pop() {
                idle_spins = 0;
                self.resume(id);
                continue;
            }

            if idle_spins < spin_limit {
                // Catch fast wake cycles before paying for a park
                idle_spins += 1;
                for _ in 0..32 {
                    std::hint::spin_loop();
                }
                thread::yield_now();
                continue;
            }

            let timeout = match self.timers.next_deadline_in() {
                Some(d) => d.min(park_timeout),
                None => park_timeout,
            };
            if let Some(id) = self.ready.pop_timeout(timeout) {
                idle_spins = 0;
                self.resume(id);
            }
        }

        tls::set_sched_regs(std::ptr::null_mut());
        if self.config.debug_logging {
            kdebug!("worker {} exiting", worker_id);
        }
    }

    /// Switch into a ready coroutine and sort out whatever state it
    /// leaves behind.
    fn resume(&self, id: CoroId) {
        let Some(slot) = self.table.slot(id) else {
            // Slot was released while the id sat in the queue
            return;
        };
        if !slot.state.transition(CoroState::Ready, CoroState::Running) {
            // Lost the race to another worker or a stale entry
            return;
        }

        tls::set_current_coro(id);
        unsafe {
            arch::switch_context(tls::sched_regs(), slot.regs_ptr());
        }
        tls::clear_current_coro();

        match slot.state.load() {
            CoroState::Finished => {
                self.table.release(id);
            }
            CoroState::Running => {
                // Parked: registers are saved now, publish Blocked and
                // consume any wake that raced the park
                slot.state.store(CoroState::Blocked);
                if slot.wake_pending.swap(false, Ordering::AcqRel)
                    && slot.state.transition(CoroState::Blocked, CoroState::Ready)
                {
                    self.ready.push(id);
                }
            }
            state => {
                kwarn!("coroutine {} came back in state {:?}", id, state);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coroutine entry and exit
// ---------------------------------------------------------------------------

/// First frame on every coroutine stack. Runs the boxed task; a panic
/// here means an unwound coroutine stack we must never resume, so it is
/// logged and the process aborts.
pub(crate) extern "C" fn coro_entry(task_ptr: usize) {
    let task: Box<Box<dyn FnOnce() + Send>> =
        unsafe { Box::from_raw(task_ptr as *mut Box<dyn FnOnce() + Send>) };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || (*task)()));
    if result.is_err() {
        kerror!("coroutine {} panicked, aborting", tls::current_coro());
        std::process::abort();
    }
}

/// Called by the arch trampoline after `coro_entry` returns. Marks the
/// slot Finished and switches back to the scheduler for the last time.
pub(crate) extern "C" fn coro_finished() {
    let id = tls::current_coro();
    if let Ok(sched) = global() {
        if let Some(slot) = sched.table.slot(id) {
            slot.state.store(CoroState::Finished);
            unsafe {
                arch::switch_context(slot.regs_ptr(), tls::sched_regs());
            }
        }
    }
    // A finished coroutine must never run again
    kerror!("finished coroutine {} resumed", id);
    std::process::abort();
}

// ---------------------------------------------------------------------------
// Module-level API (operates on the global scheduler)
// ---------------------------------------------------------------------------

/// Spawn a coroutine.
pub fn spawn<F>(f: F) -> CoroResult<CoroId>
where
    F: FnOnce() + Send + 'static,
{
    global()?.spawn(f)
}

/// Id of the calling coroutine, None on plain threads.
#[inline]
pub fn current() -> Option<CoroId> {
    tls::current_coro().to_option()
}

/// Monotonic: once true for an id, stays true.
pub fn is_finished(id: CoroId) -> bool {
    match global() {
        Ok(sched) => match sched.table.slot(id) {
            None => true,
            Some(slot) => slot.state.load() == CoroState::Finished,
        },
        Err(_) => false,
    }
}

/// Park the calling coroutine until something wakes it. A primitive must
/// already hold its id, or it sleeps forever. On a plain thread this is
/// an OS yield.
pub fn park_current() {
    if !tls::is_in_coroutine() {
        thread::yield_now();
        return;
    }
    let id = tls::current_coro();
    let Ok(sched) = global() else { return };
    let Some(slot) = sched.table.slot(id) else {
        return;
    };
    // State stays Running across the switch; the worker publishes
    // Blocked after our registers are saved
    unsafe {
        arch::switch_context(slot.regs_ptr(), tls::sched_regs());
    }
}

/// Reschedule the calling coroutine behind everything currently ready.
pub fn yield_now() {
    if !tls::is_in_coroutine() {
        thread::yield_now();
        return;
    }
    let id = tls::current_coro();
    let Ok(sched) = global() else { return };
    let Some(slot) = sched.table.slot(id) else {
        return;
    };
    // Self-wake through the park handshake: the worker consumes the
    // pending flag after switch-out and re-enqueues us
    slot.wake_pending.store(true, Ordering::Release);
    park_current();
}

/// Generation-checked wake of a parked coroutine. Safe from any thread.
pub fn push_ready(id: CoroId) {
    if let Ok(sched) = global() {
        sched.wake(id);
    }
}

/// Arm a timer on the global scheduler.
pub fn add_timer(after: Duration, coro: CoroId, callback: Option<Box<dyn FnOnce() + Send>>) {
    if let Ok(sched) = global() {
        sched.add_timer(after, coro, callback);
    }
}

/// Suspend the caller for at least `duration`. Outside a coroutine this
/// is a plain thread sleep.
pub fn sleep(duration: Duration) {
    if !tls::is_in_coroutine() {
        thread::sleep(duration);
        return;
    }
    let id = tls::current_coro();
    let Ok(sched) = global() else { return };

    let deadline = now_ns() + duration.as_nanos() as u64;
    sched.add_timer(duration, id, None);
    loop {
        park_current();
        let now = now_ns();
        if now >= deadline {
            return;
        }
        // A stray wake (e.g. a push_ready racing an earlier park) ended
        // the park early; re-arm for the remainder
        sched.add_timer(Duration::from_nanos(deadline - now), id, None);
    }
}

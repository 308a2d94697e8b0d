//! Coroutine stacks
//!
//! Each stack is a private anonymous mmap with a PROT_NONE guard page at
//! the low end; overflow faults instead of corrupting a neighbour. Stacks
//! are kept mapped across slot reuse and the usable pages are returned to
//! the kernel with madvise(DONTNEED) between generations.

use goro_core::error::{CoroError, CoroResult};
use goro_core::kerror;

const PAGE_SIZE: usize = 4096;

/// One mmap'd coroutine stack. Grows down from `top()` toward the guard.
pub struct Stack {
    base: *mut u8,
    total_size: usize,
}

// Safety: the mapping is private to this Stack; ownership moves with it
unsafe impl Send for Stack {}

impl Stack {
    /// Map a stack with `usable_size` writable bytes plus one guard page.
    pub fn allocate(usable_size: usize) -> CoroResult<Stack> {
        let usable = round_up_page(usable_size);
        let total = usable + PAGE_SIZE;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            kerror!("stack mmap of {} bytes failed", total);
            return Err(CoroError::StackAllocationFailed);
        }

        // Guard page at the low end; the stack grows toward it
        let ret = unsafe { libc::mprotect(base, PAGE_SIZE, libc::PROT_NONE) };
        if ret != 0 {
            unsafe {
                libc::munmap(base, total);
            }
            kerror!("stack guard mprotect failed");
            return Err(CoroError::StackAllocationFailed);
        }

        Ok(Stack {
            base: base as *mut u8,
            total_size: total,
        })
    }

    /// High end of the mapping; initial stack pointer for a fresh context
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.total_size) }
    }

    /// Usable bytes between guard and top
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.total_size - PAGE_SIZE
    }

    /// Return the physical pages to the kernel while keeping the mapping.
    /// Called between slot generations.
    pub fn recycle(&self) {
        let usable_base = unsafe { self.base.add(PAGE_SIZE) };
        let ret = unsafe {
            libc::madvise(
                usable_base as *mut libc::c_void,
                self.usable_size(),
                libc::MADV_DONTNEED,
            )
        };
        if ret != 0 {
            kerror!("stack madvise(DONTNEED) failed");
        }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total_size);
        }
    }
}

fn round_up_page(n: usize) -> usize {
    (n + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_write() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        assert!(stack.usable_size() >= 64 * 1024);

        // Top of stack must be writable
        unsafe {
            let p = stack.top().sub(8) as *mut u64;
            p.write(0xDEAD_BEEF);
            assert_eq!(p.read(), 0xDEAD_BEEF);
        }
    }

    #[test]
    fn test_recycle_keeps_mapping_writable() {
        let stack = Stack::allocate(32 * 1024).unwrap();
        unsafe {
            let p = stack.top().sub(16) as *mut u64;
            p.write(42);
        }
        stack.recycle();
        // Pages are zero-filled on next touch but still mapped
        unsafe {
            let p = stack.top().sub(16) as *mut u64;
            p.write(7);
            assert_eq!(p.read(), 7);
        }
    }

    #[test]
    fn test_odd_size_rounds_to_page() {
        let stack = Stack::allocate(10_000).unwrap();
        assert_eq!(stack.usable_size() % PAGE_SIZE, 0);
        assert!(stack.usable_size() >= 10_000);
    }
}

//! Coroutine identifier type
//!
//! A `CoroId` names one incarnation of a coroutine slot: the low 32 bits
//! index the slot table, the high 32 bits carry the slot's generation at
//! spawn time. Wake paths compare the generation against the slot before
//! acting, so a handle that outlives its coroutine becomes inert instead
//! of waking whatever reused the slot.

use core::fmt;

/// Generation-checked handle to a coroutine.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CoroId(u64);

impl CoroId {
    /// Sentinel value indicating no coroutine
    pub const NONE: CoroId = CoroId(u64::MAX);

    /// Build a handle from a slot index and its current generation
    #[inline]
    pub const fn new(slot: u32, generation: u32) -> Self {
        CoroId(((generation as u64) << 32) | slot as u64)
    }

    /// Slot index into the coroutine table
    #[inline]
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    /// Generation the handle was issued under
    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuild from a raw packed value
    #[inline]
    pub const fn from_u64(raw: u64) -> Self {
        CoroId(raw)
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }

    /// Check if this is a real handle
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u64::MAX
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<CoroId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for CoroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "CoroId(NONE)")
        } else {
            write!(f, "CoroId({}g{})", self.slot(), self.generation())
        }
    }
}

impl fmt::Display for CoroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}g{}", self.slot(), self.generation())
        }
    }
}

impl Default for CoroId {
    fn default() -> Self {
        CoroId::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let id = CoroId::new(42, 7);
        assert_eq!(id.slot(), 42);
        assert_eq!(id.generation(), 7);
        assert!(id.is_some());
        assert!(!id.is_none());
    }

    #[test]
    fn test_none_sentinel() {
        let none = CoroId::NONE;
        assert!(none.is_none());
        assert_eq!(none.to_option(), None);
    }

    #[test]
    fn test_generations_distinct() {
        let a = CoroId::new(3, 0);
        let b = CoroId::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn test_raw_roundtrip() {
        let id = CoroId::new(u32::MAX - 1, u32::MAX - 1);
        assert_eq!(CoroId::from_u64(id.as_u64()), id);
        // The all-ones pattern is reserved for NONE
        assert!(CoroId::from_u64(u64::MAX).is_none());
    }
}

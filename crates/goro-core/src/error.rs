//! Error types for the goro runtime

use core::fmt;

/// Result type for runtime operations
pub type CoroResult<T> = Result<T, CoroError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoroError {
    /// A blocking operation was invoked outside a coroutine
    NotInCoroutine,

    /// No coroutine slots available
    NoSlotsAvailable,

    /// Runtime not initialized
    NotInitialized,

    /// Runtime already initialized
    AlreadyInitialized,

    /// Channel is full (for try_push)
    ChannelFull,

    /// Channel is empty (for try_pop)
    ChannelEmpty,

    /// Stack allocation or protection failed
    StackAllocationFailed,

    /// Netpoller failed to arm an event (errno)
    PollerRegistration(i32),

    /// I/O error from a descriptor operation (errno)
    Io(i32),
}

impl fmt::Display for CoroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoroError::NotInCoroutine => write!(f, "blocking operation outside a coroutine"),
            CoroError::NoSlotsAvailable => write!(f, "no coroutine slots available"),
            CoroError::NotInitialized => write!(f, "runtime not initialized"),
            CoroError::AlreadyInitialized => write!(f, "runtime already initialized"),
            CoroError::ChannelFull => write!(f, "channel full"),
            CoroError::ChannelEmpty => write!(f, "channel empty"),
            CoroError::StackAllocationFailed => write!(f, "stack allocation failed"),
            CoroError::PollerRegistration(errno) => {
                write!(f, "netpoller registration failed: errno {}", errno)
            }
            CoroError::Io(errno) => write!(f, "i/o error: errno {}", errno),
        }
    }
}

impl std::error::Error for CoroError {}

/// Error returned when trying to push on a full channel; carries the
/// value back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryPushError<T>(pub T);

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel full")
    }
}

/// Error returned when trying to pop from an empty channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryPopError;

impl fmt::Display for TryPopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = CoroError::NotInCoroutine;
        assert_eq!(format!("{}", e), "blocking operation outside a coroutine");

        let e = CoroError::PollerRegistration(9);
        assert_eq!(format!("{}", e), "netpoller registration failed: errno 9");
    }

    #[test]
    fn test_try_push_keeps_value() {
        let e = TryPushError(42);
        assert_eq!(e.0, 42);
    }
}

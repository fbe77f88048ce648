//! Error and status types for splitter operations.

use thiserror::Error;

/// Outcome of a successful `put`.
///
/// Either way the frame was admitted; the variants distinguish whether the
/// admission cost lagging clients their oldest pending frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Admitted without touching anyone's pending frames.
    Stored,
    /// Admitted, and after the backpressure wait timed out the oldest
    /// frame was dropped for every client that still had it pending.
    ForcedFrameDrop,
}

impl PutOutcome {
    /// Stable numeric code for status-style surfaces.
    #[inline]
    pub const fn code(self) -> u32 {
        match self {
            Self::Stored => 0,
            Self::ForcedFrameDrop => 4,
        }
    }
}

/// Errors surfaced by splitter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SplitterError {
    /// The id is outside `1..=max_clients` or not currently registered.
    #[error("unknown client id")]
    BadClientId,

    /// A broadcast aimed at other waiters woke this `get` while its client
    /// was still caught up. Retry at the caller's discretion; the broker
    /// never re-arms a wait on its own.
    #[error("woken without a pending frame")]
    SpuriousWakeup,

    /// The wait deadline elapsed.
    #[error("timed out waiting")]
    Timeout,

    /// The splitter has been closed; every operation now fails fast.
    #[error("splitter is closed")]
    Closed,

    /// Every client slot is taken.
    #[error("all {max} client slots are in use")]
    ClientsExhausted {
        /// The configured number of client slots.
        max: usize,
    },

    /// Enumeration index past the current client count.
    #[error("client index {index} out of range (count: {count})")]
    IndexOutOfRange {
        /// The requested 0-based index.
        index: usize,
        /// The client count at the time of the call.
        count: usize,
    },
}

impl SplitterError {
    /// Returns `true` for wait outcomes the caller may simply retry.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SpuriousWakeup | Self::Timeout)
    }

    /// Returns `true` if the splitter is permanently unusable.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Stable numeric code for status-style surfaces.
    ///
    /// Codes 0 through 5 are the classic admission/wait numbering (0 and 4
    /// are the [`PutOutcome`] codes); 6 and 7 cover the registration and
    /// enumeration failures that classic surfaces folded into a boolean.
    #[inline]
    pub const fn code(&self) -> u32 {
        match self {
            Self::BadClientId => 1,
            Self::SpuriousWakeup => 2,
            Self::Timeout => 3,
            Self::Closed => 5,
            Self::ClientsExhausted { .. } => 6,
            Self::IndexOutOfRange { .. } => 7,
        }
    }
}

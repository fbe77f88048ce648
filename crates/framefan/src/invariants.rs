//! Debug assertion macros for the broker invariants.
//!
//! Each macro states one invariant of the splitter state and checks it at
//! the mutation site. All checks compile to nothing in release builds.

// =============================================================================
// INV-RING-01: Sequence Window Accounting
// =============================================================================

/// Assert that the sequence window matches the physical store.
///
/// **Invariant**: `end_seq - front_seq == len`
///
/// Used in: `FrameRing` after every push, pop, and clear
macro_rules! debug_assert_ring_window {
    ($front:expr, $end:expr, $len:expr) => {
        debug_assert!(
            $end - $front == $len as u64,
            "INV-RING-01 violated: window [{}, {}) does not cover {} frames",
            $front,
            $end,
            $len
        )
    };
}

// =============================================================================
// INV-CUR-01: No Dangling Cursor
// =============================================================================

/// Assert that a client cursor stays inside the live window.
///
/// **Invariant**: `front_seq ≤ cursor ≤ end_seq` (`cursor == end_seq`
/// means the client is caught up)
///
/// Used in: `get` before reading the cursor's frame
macro_rules! debug_assert_cursor_in_window {
    ($id:expr, $cursor:expr, $front:expr, $end:expr) => {
        debug_assert!(
            $cursor >= $front && $cursor <= $end,
            "INV-CUR-01 violated: client {} cursor {} outside window [{}, {}]",
            $id,
            $cursor,
            $front,
            $end
        )
    };
}

// =============================================================================
// INV-ADM-01: Bounded Admission Overshoot
// =============================================================================

/// Assert that an admission overshoots the budget by at most one frame.
///
/// **Invariant**: `len ≤ max_buffers + 1` while the admitting `put` still
/// holds the lock
///
/// Used in: `put` directly after the append
macro_rules! debug_assert_admission_bound {
    ($len:expr, $max_buffers:expr) => {
        debug_assert!(
            $len <= $max_buffers + 1,
            "INV-ADM-01 violated: {} frames buffered against a budget of {}",
            $len,
            $max_buffers
        )
    };
}

// =============================================================================
// INV-ADM-02: Budget Or Referenced
// =============================================================================

/// Assert that an over-budget ring is only kept for a demonstrably slow
/// client.
///
/// **Invariant**: on return from any operation,
/// `len ≤ max_buffers` or some cursor sits on the front slot
///
/// Used in: `put` before returning
macro_rules! debug_assert_budget_or_referenced {
    ($len:expr, $max_buffers:expr, $front_referenced:expr) => {
        debug_assert!(
            $len <= $max_buffers || $front_referenced,
            "INV-ADM-02 violated: {} frames over a budget of {} with an unreferenced front",
            $len,
            $max_buffers
        )
    };
}

// =============================================================================
// INV-ID-01: Id Pool Partition
// =============================================================================

/// Assert that free and live ids partition the full id range.
///
/// **Invariant**: `|free_ids| + |clients| == max_clients`, and no id is in
/// both sets (disjointness is enforced structurally: ids move between the
/// pool and the client map, never duplicated)
///
/// Used in: `add_client` and `remove_client` after the transfer
macro_rules! debug_assert_pool_partition {
    ($free:expr, $live:expr, $max_clients:expr) => {
        debug_assert!(
            $free + $live == $max_clients,
            "INV-ID-01 violated: {} free + {} live ids do not partition {} slots",
            $free,
            $live,
            $max_clients
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_admission_bound;
pub(crate) use debug_assert_budget_or_referenced;
pub(crate) use debug_assert_cursor_in_window;
pub(crate) use debug_assert_pool_partition;
pub(crate) use debug_assert_ring_window;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{PutOutcome, SplitterError};
use crate::frame::Frame;
use crate::ids::{ClientId, IdPool};
use crate::invariants::{
    debug_assert_admission_bound, debug_assert_budget_or_referenced, debug_assert_cursor_in_window,
    debug_assert_pool_partition,
};
use crate::ring::{FrameRing, Seq};
use crate::SplitterConfig;

// =============================================================================
// LOCKING & WAKE-UP PROTOCOL
// =============================================================================
//
// One mutex guards the entire broker state: the ring, the client cursors,
// the id pool, and the closed flag. Every operation is atomic with respect
// to every other operation because each takes this lock for its full
// duration.
//
// Two condition variables hang off the lock, one per predicate:
//
// - `frame_available`, predicate "my cursor is behind `end_seq`".
//   Waited in `get` by a caught-up client. Broadcast by `put` after every
//   append, by `remove_client` (so a deregistered client's wait observes
//   its removal), and by `close`.
//
// - `no_slow_client`, predicate "no cursor sits on the front slot".
//   Waited in `put` while the ring is over budget and the front is still
//   pending for someone. Broadcast whenever the slow set empties (the
//   `get` advance or `remove_client` that unpins the front) and by
//   `close`.
//
// Both are broadcast, never single-wake: any subset of waiters may become
// eligible after a state change (several clients can wait on one frame,
// several producers on one slow reader).
//
// Lost wakeups cannot occur: predicates are evaluated under the lock
// before parking, notifications happen with the lock held, and every wake
// re-checks `closed` first, then its predicate, under the re-acquired
// lock. These two waits are the only suspension points in the crate.
// =============================================================================

/// Point-in-time limits of a splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterInfo {
    /// Soft cap on buffered frames.
    pub max_buffers: usize,
    /// Number of client slots.
    pub max_clients: usize,
}

/// Per-client snapshot returned by [`Splitter::client_by_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    /// The client's id.
    pub id: ClientId,
    /// Frames admitted but not yet read by this client.
    pub latency: u64,
}

struct State {
    ring: FrameRing,
    /// Client id to the sequence of the next frame that client will read.
    /// A cursor equal to `ring.end_seq()` means the client is caught up.
    /// Ordered by id so index enumeration is deterministic.
    clients: BTreeMap<ClientId, Seq>,
    free_ids: IdPool,
    /// One-shot: flips false to true in `close`, never back.
    closed: bool,
}

impl State {
    fn any_cursor_at(&self, seq: Seq) -> bool {
        self.clients.values().any(|&next| next == seq)
    }
}

/// Multi-consumer frame fan-out buffer.
///
/// A `Splitter` sits between producers of opaque [`Frame`]s and up to
/// `max_clients` registered clients. Every client observes every frame
/// admitted after it joined, in admission order, at its own pace. The
/// buffer is bounded: when an admission would leave more than
/// `max_buffers` frames pending for some client, the producer is parked
/// until the slowest clients catch up, and on timeout the oldest frame is
/// dropped for exactly the clients still lagging on it so the producer can
/// make progress.
///
/// All methods take `&self`; wrap the splitter in an `Arc` (or borrow it
/// across scoped threads) to share it between producer and client threads.
pub struct Splitter {
    state: Mutex<State>,
    frame_available: Condvar,
    no_slow_client: Condvar,
    max_buffers: usize,
    max_clients: usize,
}

impl Splitter {
    /// Creates a splitter with the given configuration.
    ///
    /// A configuration with a zero limit produces a splitter that is
    /// already closed: every operation on it returns
    /// [`SplitterError::Closed`].
    pub fn new(config: SplitterConfig) -> Self {
        let valid = config.is_valid();
        Self {
            state: Mutex::new(State {
                ring: FrameRing::new(),
                clients: BTreeMap::new(),
                free_ids: IdPool::new(if valid { config.max_clients } else { 0 }),
                closed: !valid,
            }),
            frame_available: Condvar::new(),
            no_slow_client: Condvar::new(),
            max_buffers: config.max_buffers,
            max_clients: config.max_clients,
        }
    }

    /// Convenience constructor, equivalent to
    /// `Splitter::new(SplitterConfig::new(max_buffers, max_clients))`.
    pub fn with_limits(max_buffers: usize, max_clients: usize) -> Self {
        Self::new(SplitterConfig::new(max_buffers, max_clients))
    }

    /// Returns the configured limits.
    pub fn info(&self) -> Result<SplitterInfo, SplitterError> {
        let state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        Ok(SplitterInfo {
            max_buffers: self.max_buffers,
            max_clients: self.max_clients,
        })
    }

    /// Returns `true` once the splitter has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Admits a frame.
    ///
    /// The frame is appended and every caught-up client is pointed at it;
    /// waiting `get`s are woken. If the ring is now over budget the call
    /// parks for up to `timeout` waiting for the slow clients to drain the
    /// oldest frame. Exactly one of three things then happens:
    ///
    /// - the slow set drains (or nothing referenced the oldest frame to
    ///   begin with): the unreferenced front is reclaimed and the call
    ///   returns [`PutOutcome::Stored`];
    /// - the deadline passes: every cursor still parked on the front is
    ///   advanced by one, the front is dropped, and the call returns
    ///   [`PutOutcome::ForcedFrameDrop`];
    /// - the splitter is closed: [`SplitterError::Closed`].
    ///
    /// One call drops at most one frame and advances each cursor by at
    /// most one, no matter how long the wait.
    pub fn put(&self, frame: Frame, timeout: Duration) -> Result<PutOutcome, SplitterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }

        // A client parked at the old end sentinel now points at the new
        // frame with no bookkeeping: its cursor already equals the frame's
        // sequence.
        state.ring.push_back(frame);
        self.frame_available.notify_all();

        debug_assert_admission_bound!(state.ring.len(), self.max_buffers);

        if state.ring.len() <= self.max_buffers {
            return Ok(PutOutcome::Stored);
        }

        let deadline = Instant::now() + timeout;
        let mut timed_out = false;
        loop {
            if state.closed {
                return Err(SplitterError::Closed);
            }
            if state.ring.len() <= self.max_buffers {
                // Drained (or flushed) while we waited; nothing to drop.
                return Ok(PutOutcome::Stored);
            }
            let front = state.ring.front_seq();
            if !state.any_cursor_at(front) {
                // The oldest frame is pending for no one; reclaim it.
                state.ring.pop_front();
                debug_assert_budget_or_referenced!(
                    state.ring.len(),
                    self.max_buffers,
                    state.any_cursor_at(state.ring.front_seq())
                );
                return Ok(PutOutcome::Stored);
            }
            if timed_out {
                // Advance every cursor still parked on the front in
                // lock-step with the drop, so none is left dangling.
                for next in state.clients.values_mut() {
                    if *next == front {
                        *next += 1;
                    }
                }
                state.ring.pop_front();
                debug_assert_budget_or_referenced!(
                    state.ring.len(),
                    self.max_buffers,
                    state.any_cursor_at(state.ring.front_seq())
                );
                return Ok(PutOutcome::ForcedFrameDrop);
            }
            timed_out = self
                .no_slow_client
                .wait_until(&mut state, deadline)
                .timed_out();
        }
    }

    /// Reads the next frame for `id`, advancing its cursor by one.
    ///
    /// If the client is caught up the call performs a single wait on the
    /// new-frame signal with the given deadline; the outcome of that wait
    /// is surfaced verbatim ([`SplitterError::Timeout`] or
    /// [`SplitterError::SpuriousWakeup`]) rather than re-armed, so the
    /// caller keeps an explicit cancellation point. Timeouts are measured
    /// from entry to the wait, not from entry to the call.
    pub fn get(&self, id: ClientId, timeout: Duration) -> Result<Frame, SplitterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        let mut next = match state.clients.get(&id) {
            Some(&next) => next,
            None => return Err(SplitterError::BadClientId),
        };

        if next == state.ring.end_seq() {
            let deadline = Instant::now() + timeout;
            let timed_out = self
                .frame_available
                .wait_until(&mut state, deadline)
                .timed_out();

            // Re-evaluate every predicate under the re-acquired lock.
            if state.closed {
                return Err(SplitterError::Closed);
            }
            next = match state.clients.get(&id) {
                Some(&next) => next,
                None => return Err(SplitterError::BadClientId),
            };
            if next == state.ring.end_seq() {
                return Err(if timed_out {
                    SplitterError::Timeout
                } else {
                    SplitterError::SpuriousWakeup
                });
            }
        }

        debug_assert_cursor_in_window!(
            id,
            next,
            state.ring.front_seq(),
            state.ring.end_seq()
        );
        let frame = state.ring.frame_at(next).clone();
        let front = state.ring.front_seq();
        if let Some(cursor) = state.clients.get_mut(&id) {
            *cursor = next + 1;
        }
        if next == front && !state.any_cursor_at(front) {
            // That advance emptied the slow set; unpark producers.
            self.no_slow_client.notify_all();
        }
        Ok(frame)
    }

    /// Drops every buffered frame and marks every client as caught up.
    ///
    /// Producers parked in [`put`](Self::put) are not signalled: on their
    /// next wake they observe a ring under budget and return with nothing
    /// to drop. Clients waiting in [`get`](Self::get) keep waiting; their
    /// predicate still holds.
    pub fn flush(&self) -> Result<(), SplitterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        state.ring.clear();
        let end = state.ring.end_seq();
        for next in state.clients.values_mut() {
            *next = end;
        }
        Ok(())
    }

    /// Registers a new client and returns its id.
    ///
    /// The client starts caught up: it observes only frames admitted
    /// strictly after this call returns.
    pub fn add_client(&self) -> Result<ClientId, SplitterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        let id = match state.free_ids.acquire() {
            Some(id) => id,
            None => {
                return Err(SplitterError::ClientsExhausted {
                    max: self.max_clients,
                })
            }
        };
        let end = state.ring.end_seq();
        state.clients.insert(id, end);
        debug_assert_pool_partition!(
            state.free_ids.available(),
            state.clients.len(),
            self.max_clients
        );
        Ok(id)
    }

    /// Deregisters a client, returning its id to the pool.
    ///
    /// A removed client blocked in [`get`](Self::get) is woken and
    /// observes [`SplitterError::BadClientId`] instead of running out its
    /// timeout.
    pub fn remove_client(&self, id: ClientId) -> Result<(), SplitterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        if state.clients.remove(&id).is_none() {
            return Err(SplitterError::BadClientId);
        }
        state.free_ids.release(id);
        debug_assert_pool_partition!(
            state.free_ids.available(),
            state.clients.len(),
            self.max_clients
        );
        self.frame_available.notify_all();
        // Removing the last lagging client empties the slow set.
        if !state.any_cursor_at(state.ring.front_seq()) {
            self.no_slow_client.notify_all();
        }
        Ok(())
    }

    /// Number of currently registered clients.
    pub fn client_count(&self) -> Result<usize, SplitterError> {
        let state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        Ok(state.clients.len())
    }

    /// Snapshot of the `index`-th client, in ascending id order.
    ///
    /// Concurrent adds and removes may shift which client a given index
    /// names between two calls; the order is documented, not stabilized.
    pub fn client_by_index(&self, index: usize) -> Result<ClientInfo, SplitterError> {
        let state = self.state.lock();
        if state.closed {
            return Err(SplitterError::Closed);
        }
        let count = state.clients.len();
        match state.clients.iter().nth(index) {
            Some((&id, &next)) => Ok(ClientInfo {
                id,
                latency: state.ring.distance_to_end(next),
            }),
            None => Err(SplitterError::IndexOutOfRange { index, count }),
        }
    }

    /// Closes the splitter and wakes every waiter.
    ///
    /// Idempotent. Afterwards every operation returns
    /// [`SplitterError::Closed`]; parked producers and clients re-check
    /// the flag first on wake and return in bounded time.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.frame_available.notify_all();
        self.no_slow_client.notify_all();
    }
}

impl Drop for Splitter {
    fn drop(&mut self) {
        // Exclusive access: no waiter can exist here. Close, then drain
        // clients before frames.
        let state = self.state.get_mut();
        state.closed = true;
        state.clients.clear();
        state.ring.clear();
    }
}

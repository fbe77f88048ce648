//! FrameFan - bounded multi-consumer frame fan-out
//!
//! One in-memory broker between producers of opaque binary frames and a
//! bounded set of registered clients. Every client observes every frame
//! admitted after it joined, in admission order, and drains at its own
//! pace; frames are shared by handle, never copied per client.
//!
//! # Key properties
//!
//! - **Fan-out**: all clients see the same globally serialized admission
//!   order, each through its own cursor
//! - **Bounded buffer**: at most `max_buffers` frames stay buffered after
//!   any successful clean admission
//! - **Backpressure**: an over-budget `put` parks until the slowest
//!   clients catch up, bounded by the caller's timeout
//! - **Forced drop**: on timeout the oldest frame is dropped for exactly
//!   the clients still lagging on it, at most one frame per admission
//! - **Deterministic shutdown**: `close` unparks every waiter in bounded
//!   time
//!
//! # Example
//!
//! ```
//! use framefan::{Frame, Splitter};
//! use std::time::Duration;
//!
//! let splitter = Splitter::with_limits(4, 2);
//! let client = splitter.add_client().unwrap();
//!
//! splitter
//!     .put(Frame::from(vec![1, 2, 3]), Duration::from_millis(10))
//!     .unwrap();
//!
//! let frame = splitter.get(client, Duration::from_millis(10)).unwrap();
//! assert_eq!(frame.as_bytes(), &[1, 2, 3]);
//! ```

mod config;
mod error;
mod frame;
mod ids;
mod invariants;
mod ring;
mod splitter;

pub use config::SplitterConfig;
pub use error::{PutOutcome, SplitterError};
pub use frame::Frame;
pub use ids::ClientId;
pub use ring::{FrameRing, Seq};
pub use splitter::{ClientInfo, Splitter, SplitterInfo};

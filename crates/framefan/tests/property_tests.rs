//! Property tests driving random operation sequences against a reference
//! model of the splitter.
//!
//! Every operation is made deterministic with zero timeouts: an over-budget
//! admission takes the forced-drop path immediately, a caught-up read times
//! out immediately. The model replays the same semantics over a plain deque
//! and map, and the broker must agree with it after every step: returned
//! outcomes, client enumeration, and per-client latencies.

use framefan::{ClientId, Frame, PutOutcome, Splitter, SplitterError};
use proptest::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

const MAX_BUFFERS: usize = 4;
const MAX_CLIENTS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    AddClient,
    RemoveClient(u32),
    Put(u8),
    Get(u32),
    Flush,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Ids range one past the pool so unknown-id paths are exercised too.
    let any_id = 1..=MAX_CLIENTS as u32 + 1;
    prop_oneof![
        2 => Just(Op::AddClient),
        1 => any_id.clone().prop_map(Op::RemoveClient),
        4 => any::<u8>().prop_map(Op::Put),
        4 => any_id.prop_map(Op::Get),
        1 => Just(Op::Flush),
    ]
}

/// Reference semantics over plain containers.
struct Model {
    ring: VecDeque<u8>,
    base: u64,
    clients: BTreeMap<u32, u64>,
    free: VecDeque<u32>,
}

impl Model {
    fn new() -> Self {
        Self {
            ring: VecDeque::new(),
            base: 0,
            clients: BTreeMap::new(),
            free: (1..=MAX_CLIENTS as u32).collect(),
        }
    }

    fn end(&self) -> u64 {
        self.base + self.ring.len() as u64
    }

    fn add(&mut self) -> Option<u32> {
        let id = self.free.pop_front()?;
        let end = self.end();
        self.clients.insert(id, end);
        Some(id)
    }

    fn remove(&mut self, id: u32) -> bool {
        if self.clients.remove(&id).is_some() {
            self.free.push_front(id);
            true
        } else {
            false
        }
    }

    fn put(&mut self, tag: u8) -> PutOutcome {
        self.ring.push_back(tag);
        if self.ring.len() <= MAX_BUFFERS {
            return PutOutcome::Stored;
        }
        let front = self.base;
        let mut forced = false;
        for next in self.clients.values_mut() {
            if *next == front {
                *next += 1;
                forced = true;
            }
        }
        self.ring.pop_front();
        self.base += 1;
        if forced {
            PutOutcome::ForcedFrameDrop
        } else {
            PutOutcome::Stored
        }
    }

    fn get(&mut self, id: u32) -> Result<u8, SplitterError> {
        let end = self.end();
        let next = match self.clients.get_mut(&id) {
            Some(next) => next,
            None => return Err(SplitterError::BadClientId),
        };
        if *next == end {
            return Err(SplitterError::Timeout);
        }
        let tag = self.ring[(*next - self.base) as usize];
        *next += 1;
        Ok(tag)
    }

    fn flush(&mut self) {
        self.base = self.end();
        self.ring.clear();
        for next in self.clients.values_mut() {
            *next = self.base;
        }
    }
}

proptest! {
    /// The broker agrees with the reference model step for step: same
    /// outcomes, same client enumeration, same latencies, and the buffered
    /// window never exceeds the budget once an operation has returned.
    #[test]
    fn prop_model_equivalence(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let splitter = Splitter::with_limits(MAX_BUFFERS, MAX_CLIENTS);
        let mut model = Model::new();

        for op in ops {
            match op {
                Op::AddClient => {
                    let actual = splitter.add_client();
                    match model.add() {
                        Some(id) => prop_assert_eq!(actual, Ok(ClientId::new(id))),
                        None => prop_assert_eq!(
                            actual,
                            Err(SplitterError::ClientsExhausted { max: MAX_CLIENTS })
                        ),
                    }
                }
                Op::RemoveClient(id) => {
                    let actual = splitter.remove_client(ClientId::new(id));
                    if model.remove(id) {
                        prop_assert_eq!(actual, Ok(()));
                    } else {
                        prop_assert_eq!(actual, Err(SplitterError::BadClientId));
                    }
                }
                Op::Put(tag) => {
                    let actual = splitter.put(Frame::from(vec![tag]), Duration::ZERO);
                    prop_assert_eq!(actual, Ok(model.put(tag)));
                }
                Op::Get(id) => {
                    let actual = splitter.get(ClientId::new(id), Duration::ZERO);
                    match model.get(id) {
                        Ok(tag) => {
                            let frame = actual.unwrap();
                            prop_assert_eq!(frame.as_bytes(), &[tag]);
                        }
                        Err(expected) => prop_assert_eq!(actual.unwrap_err(), expected),
                    }
                }
                Op::Flush => {
                    model.flush();
                    prop_assert_eq!(splitter.flush(), Ok(()));
                }
            }

            // The model keeps at most the budget once an op has returned.
            prop_assert!(model.ring.len() <= MAX_BUFFERS);

            prop_assert_eq!(splitter.client_count().unwrap(), model.clients.len());
            for (index, (&id, &next)) in model.clients.iter().enumerate() {
                let info = splitter.client_by_index(index).unwrap();
                prop_assert_eq!(info.id, ClientId::new(id));
                prop_assert_eq!(info.latency, model.end() - next);
                prop_assert!(info.latency <= MAX_BUFFERS as u64);
            }
            prop_assert_eq!(
                splitter.client_by_index(model.clients.len()).unwrap_err(),
                SplitterError::IndexOutOfRange {
                    index: model.clients.len(),
                    count: model.clients.len()
                }
            );
        }
    }
}

proptest! {
    /// Live ids are unique, bounded by the slot count, and a freed id is
    /// handed out again before any older one.
    #[test]
    fn prop_id_uniqueness_and_fifo_reuse(removals in prop::collection::vec(0usize..MAX_CLIENTS, 1..20)) {
        let splitter = Splitter::with_limits(MAX_BUFFERS, MAX_CLIENTS);

        let mut live: Vec<ClientId> = (0..MAX_CLIENTS)
            .map(|_| splitter.add_client().unwrap())
            .collect();
        let mut sorted: Vec<u32> = live.iter().map(|id| id.get()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), MAX_CLIENTS);
        prop_assert!(splitter.add_client().is_err());

        for slot in removals {
            let id = live.remove(slot % live.len());
            splitter.remove_client(id).unwrap();
            // The id released last comes back first.
            prop_assert_eq!(splitter.add_client(), Ok(id));
            live.push(id);
        }
    }
}

proptest! {
    /// With no client watching, an over-budget admission reclaims the
    /// unreferenced front instead of reporting a drop.
    #[test]
    fn prop_unwatched_ring_never_reports_drops(count in 1usize..60) {
        let splitter = Splitter::with_limits(MAX_BUFFERS, MAX_CLIENTS);
        for tag in 0..count {
            let outcome = splitter.put(Frame::from(vec![tag as u8]), Duration::ZERO);
            prop_assert_eq!(outcome, Ok(PutOutcome::Stored));
        }
    }
}

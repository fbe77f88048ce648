use std::collections::VecDeque;
use std::fmt;

/// Identifier of a registered client, always in `1..=max_clients`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u32);

impl ClientId {
    /// Builds an id from its numeric value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Numeric value of the id.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed pool of reusable client ids.
///
/// Primed with `1..=max_clients` in order. Released ids go back to the
/// front of the pool, so a freshly freed id is handed out before older
/// ones and the live set stays small and dense.
#[derive(Debug)]
pub(crate) struct IdPool {
    free: VecDeque<ClientId>,
}

impl IdPool {
    pub(crate) fn new(max_clients: usize) -> Self {
        Self {
            free: (1..=max_clients as u32).map(ClientId::new).collect(),
        }
    }

    /// Takes the id at the front of the pool, if any is left.
    pub(crate) fn acquire(&mut self) -> Option<ClientId> {
        self.free.pop_front()
    }

    /// Returns an id to the front of the pool.
    pub(crate) fn release(&mut self, id: ClientId) {
        debug_assert!(!self.free.contains(&id), "double release of id {id}");
        self.free.push_front(id);
    }

    /// Number of ids still available.
    pub(crate) fn available(&self) -> usize {
        self.free.len()
    }
}

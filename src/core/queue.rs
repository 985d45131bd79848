//! Deduplicating FIFO of content ids.
//!
//! Each id is admitted at most once for the lifetime of the queue, so the
//! packager processes every content unit exactly once no matter how many
//! items reference it.

use std::collections::{HashSet, VecDeque};

use crate::domain::{ContentId, Role};

/// How two ids are compared for deduplication.
///
/// The packager has historically keyed only on the numeric id, which makes
/// `item-200-123` and `stim-200-123` collide. That behavior is kept as the
/// default for compatibility; `Full` is the corrected projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    #[default]
    NumericOnly,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct IdentityKey {
    role: Option<Role>,
    bank_key: Option<u32>,
    id: u32,
}

impl IdentityMode {
    fn key(&self, id: &ContentId) -> IdentityKey {
        match self {
            IdentityMode::NumericOnly => IdentityKey {
                role: None,
                bank_key: None,
                id: id.id,
            },
            IdentityMode::Full => IdentityKey {
                role: Some(id.role),
                bank_key: Some(id.bank_key),
                id: id.id,
            },
        }
    }
}

/// FIFO work queue that admits each identity at most once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    seen: HashSet<IdentityKey>,
    pending: VecDeque<ContentId>,
    dequeued: usize,
    identity: IdentityMode,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: IdentityMode) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    /// Admit an id. Returns `true` if newly admitted, `false` if an equal
    /// identity was already seen (the enqueue is then a no-op).
    pub fn enqueue(&mut self, id: ContentId) -> bool {
        if !self.seen.insert(self.identity.key(&id)) {
            return false;
        }
        self.pending.push_back(id);
        true
    }

    /// Pop the oldest pending id, if any.
    pub fn dequeue(&mut self) -> Option<ContentId> {
        let id = self.pending.pop_front()?;
        self.dequeued += 1;
        Some(id)
    }

    pub fn peek(&self) -> Option<&ContentId> {
        self.pending.front()
    }

    /// Pending entries not yet dequeued.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Distinct identities ever admitted.
    pub fn distinct_count(&self) -> usize {
        self.seen.len()
    }

    /// Ids handed out so far. Monotonic.
    pub fn dequeued_count(&self) -> usize {
        self.dequeued
    }

    /// Enqueue a sequence, returning how many were newly admitted.
    pub fn load<I: IntoIterator<Item = ContentId>>(&mut self, ids: I) -> usize {
        ids.into_iter().filter(|id| self.enqueue(*id)).count()
    }
}

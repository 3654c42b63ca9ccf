use serde::Serialize;

/// Result of a toggle against a [`BoundedSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionChange {
    Added,
    Removed,
    /// The candidate was absent and the set was full; nothing changed.
    AtCapacity,
}

/// Insertion-ordered set capped at `N` members with toggle semantics.
///
/// Adding past capacity is refused; older members are never evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoundedSelection<T, const N: usize> {
    members: Vec<T>,
}

impl<T, const N: usize> Default for BoundedSelection<T, N> {
    fn default() -> Self {
        Self {
            members: Vec::with_capacity(N),
        }
    }
}

impl<T: PartialEq, const N: usize> BoundedSelection<T, N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, candidate: T) -> SelectionChange {
        if let Some(index) = self.members.iter().position(|member| *member == candidate) {
            self.members.remove(index);
            return SelectionChange::Removed;
        }

        if self.members.len() >= N {
            return SelectionChange::AtCapacity;
        }

        self.members.push(candidate);
        SelectionChange::Added
    }

    pub fn contains(&self, candidate: &T) -> bool {
        self.members.contains(candidate)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= N
    }

    pub fn remaining(&self) -> usize {
        N.saturating_sub(self.members.len())
    }

    pub fn members(&self) -> &[T] {
        &self.members
    }
}

use crate::{ContainerState, Inventory, ResourceKind};
use std::collections::HashMap;
use std::fmt;

/// What an in-flight action is expected to leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Lifecycle(ContainerState),
    /// Never matches an observed state; the entry goes away once the id leaves the inventory.
    Removed,
}

impl DesiredState {
    fn matches(self, observed: Option<ContainerState>) -> bool {
        match (self, observed) {
            (DesiredState::Lifecycle(want), Some(seen)) => want == seen,
            _ => false,
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Lifecycle(state) => f.write_str(state.as_str()),
            DesiredState::Removed => f.write_str("removed"),
        }
    }
}

/// Resources with an action in flight, keyed by kind and runtime id.
#[derive(Debug, Clone, Default)]
pub struct PendingLedger {
    entries: HashMap<(ResourceKind, String), DesiredState>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the expected state for `id`. A later dispatch for the same resource replaces it.
    pub fn record(&mut self, kind: ResourceKind, id: &str, desired: DesiredState) {
        self.entries.insert((kind, id.to_string()), desired);
    }

    pub fn desired(&self, kind: ResourceKind, id: &str) -> Option<DesiredState> {
        self.entries.get(&(kind, id.to_string())).copied()
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.entries.contains_key(&(kind, id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry whose resource reached its desired state or vanished from the
    /// inventory. Returns how many entries were settled.
    ///
    /// There is no timeout: an action that silently failed keeps its entry until the
    /// resource disappears.
    pub fn reconcile(&mut self, inventory: &Inventory) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(kind, id), desired| match inventory.observe(*kind, id) {
                None => false,
                Some(observed) => !desired.matches(observed),
            });
        before - self.entries.len()
    }
}

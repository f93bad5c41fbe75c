//! Turns "verb applied to these targets" into gateway requests, ledger entries and a summary.

use crate::{
    ActionRequest, ContainerState, Inventory, PendingLedger, ResourceKind, Target, Verb,
};

const MAX_NAMES_IN_SUMMARY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The container is not in a state the verb accepts.
    State(ContainerState),
    /// Running or paused containers still use the image.
    ImageInUse { containers: Vec<String> },
    /// Containers still mount the volume.
    VolumeInUse { containers: Vec<String> },
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub target: Target,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub verb: Verb,
    pub succeeded: Vec<Target>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub requests: Vec<ActionRequest>,
    pub report: DispatchReport,
}

/// Checks whether `verb` may be applied to `target` given the current inventory.
pub fn eligibility(verb: Verb, target: &Target, inventory: &Inventory) -> Result<(), SkipReason> {
    match target.kind {
        ResourceKind::Container => {
            let state = target.state.unwrap_or(ContainerState::Unknown);
            if verb.accepts(state) {
                Ok(())
            } else {
                Err(SkipReason::State(state))
            }
        }
        ResourceKind::Image if verb == Verb::Remove => {
            let blocking = inventory.active_dependents(&target.id);
            if blocking.is_empty() {
                Ok(())
            } else {
                Err(SkipReason::ImageInUse {
                    containers: blocking.iter().map(|c| c.name.clone()).collect(),
                })
            }
        }
        ResourceKind::Volume if verb == Verb::Remove => {
            let users = inventory.volume_users(&target.id);
            if users.is_empty() {
                Ok(())
            } else {
                Err(SkipReason::VolumeInUse {
                    containers: users.iter().map(|c| c.name.clone()).collect(),
                })
            }
        }
        ResourceKind::Image | ResourceKind::Volume => Err(SkipReason::Unsupported),
    }
}

/// Partitions `targets`, records a ledger entry for every eligible one and returns the
/// requests to fire. Never fails: gateway errors surface later, if at all, through the
/// ledger never settling.
pub fn dispatch(
    ledger: &mut PendingLedger,
    verb: Verb,
    targets: &[Target],
    inventory: &Inventory,
) -> Dispatch {
    let mut requests = Vec::new();
    let mut succeeded = Vec::new();
    let mut skipped = Vec::new();

    for target in targets {
        match eligibility(verb, target, inventory) {
            Ok(()) => {
                ledger.record(target.kind, &target.id, verb.expected_outcome());
                requests.push(ActionRequest {
                    verb,
                    kind: target.kind,
                    id: target.id.clone(),
                });
                succeeded.push(target.clone());
            }
            Err(reason) => skipped.push(Skipped {
                target: target.clone(),
                reason,
            }),
        }
    }

    Dispatch {
        requests,
        report: DispatchReport {
            verb,
            succeeded,
            skipped,
        },
    }
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.skipped.is_empty()
    }

    /// One line for the counts, then one line per skip category.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return format!("{}: nothing selected", self.verb);
        }

        let mut lines = vec![format!(
            "{}: {} succeeded, {} skipped",
            self.verb,
            self.succeeded.len(),
            self.skipped.len()
        )];

        let state_skips: Vec<&Skipped> = self
            .skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::State(_)))
            .collect();
        if !state_skips.is_empty() {
            let wanted: Vec<&str> = self
                .verb
                .eligible_states()
                .iter()
                .map(|s| s.as_str())
                .collect();
            lines.push(format!(
                "  not {}: {}",
                wanted.join(" or "),
                name_list(state_skips.iter().map(|s| s.target.name.as_str()))
            ));
        }

        // Only the first dependency failure is spelled out.
        let mut blocked = self.skipped.iter().filter_map(|s| match &s.reason {
            SkipReason::ImageInUse { containers } => {
                Some((s, "used by running containers", containers))
            }
            SkipReason::VolumeInUse { containers } => Some((s, "mounted by", containers)),
            _ => None,
        });
        if let Some((first, what, users)) = blocked.next() {
            let rest = blocked.count();
            let more = if rest > 0 {
                format!(" (+{rest} more blocked)")
            } else {
                String::new()
            };
            lines.push(format!(
                "  {} {what} {}{more}",
                first.target.name,
                name_list(users.iter().map(String::as_str))
            ));
        }

        let unsupported = self
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Unsupported)
            .count();
        if unsupported > 0 {
            lines.push(format!("  {} not supported for {unsupported} item(s)", self.verb));
        }

        lines.join("\n")
    }
}

fn name_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    if names.len() <= MAX_NAMES_IN_SUMMARY {
        return names.join(", ");
    }
    format!(
        "{}, +{}",
        names[..MAX_NAMES_IN_SUMMARY].join(", "),
        names.len() - MAX_NAMES_IN_SUMMARY
    )
}

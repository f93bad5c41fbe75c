use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub mod dispatch;
pub mod gateway;
pub mod ledger;

pub use dispatch::{dispatch, Dispatch, DispatchReport, SkipReason, Skipped};
pub use gateway::{ActionRequest, GatewayError, PollBatch, ResourceGateway};
pub use ledger::{DesiredState, PendingLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Container,
    Image,
    Volume,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Container => "container",
            ResourceKind::Image => "image",
            ResourceKind::Volume => "volume",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Container => "containers",
            ResourceKind::Image => "images",
            ResourceKind::Volume => "volumes",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state as reported by the runtime for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ContainerState::Running | ContainerState::Paused)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "paused" => Ok(ContainerState::Paused),
            "restarting" => Ok(ContainerState::Restarting),
            "removing" => Ok(ContainerState::Removing),
            "exited" => Ok(ContainerState::Exited),
            "dead" => Ok(ContainerState::Dead),
            other => Err(format!("Unknown container state: {other}")),
        }
    }
}

/// Lifecycle verbs an operator can apply to a batch of resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
    Kill,
    Remove,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Pause,
        Verb::Unpause,
        Verb::Kill,
        Verb::Remove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Pause => "pause",
            Verb::Unpause => "unpause",
            Verb::Kill => "kill",
            Verb::Remove => "remove",
        }
    }

    /// Container states from which this verb is allowed. `Remove` is unconditional
    /// and reports every state.
    pub fn eligible_states(self) -> &'static [ContainerState] {
        use ContainerState::*;
        match self {
            Verb::Start => &[Exited, Created],
            Verb::Stop => &[Running, Restarting],
            Verb::Restart | Verb::Pause | Verb::Kill => &[Running],
            Verb::Unpause => &[Paused],
            Verb::Remove => &[
                Created, Running, Paused, Restarting, Removing, Exited, Dead, Unknown,
            ],
        }
    }

    pub fn accepts(self, state: ContainerState) -> bool {
        self.eligible_states().contains(&state)
    }

    /// State the resource is expected to reach once the call lands.
    pub fn expected_outcome(self) -> DesiredState {
        match self {
            Verb::Start | Verb::Restart | Verb::Unpause => {
                DesiredState::Lifecycle(ContainerState::Running)
            }
            Verb::Stop | Verb::Kill => DesiredState::Lifecycle(ContainerState::Exited),
            Verb::Pause => DesiredState::Lifecycle(ContainerState::Paused),
            Verb::Remove => DesiredState::Removed,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only capabilities shared by every polled record.
pub trait Resource {
    const KIND: ResourceKind;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn lifecycle(&self) -> Option<ContainerState> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
    /// Image reference the container was created from, as given by the runtime.
    pub image: String,
    pub image_id: String,
    /// Command line the container was started with.
    pub command: String,
    /// One address per attached network, ordered by network name.
    pub ip_addresses: Vec<String>,
    pub status: String,
    pub ports: Vec<PortMapping>,
    /// Names of the volumes mounted into the container.
    pub volumes: Vec<String>,
}

impl ContainerRecord {
    /// True when this container was created from `image`, by id or by any of its tags.
    pub fn descends_from(&self, image: &ImageRecord) -> bool {
        (!self.image_id.is_empty() && self.image_id == image.id)
            || self.image == image.id
            || image.tags.iter().any(|tag| *tag == self.image)
    }
}

impl Resource for ContainerRecord {
    const KIND: ResourceKind = ResourceKind::Container;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> Option<ContainerState> {
        Some(self.state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    pub tags: Vec<String>,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
}

impl Resource for ImageRecord {
    const KIND: ResourceKind = ResourceKind::Image;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or(&self.id)
    }
}

/// Volumes are addressed by name; the runtime has no separate id for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRecord {
    pub name: String,
    pub driver: String,
    pub mount_point: String,
    pub created: Option<DateTime<Utc>>,
}

impl Resource for VolumeRecord {
    const KIND: ResourceKind = ResourceKind::Volume;

    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One resource picked for a batch action, detached from the snapshot it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    pub state: Option<ContainerState>,
}

impl Target {
    pub fn of<R: Resource>(resource: &R) -> Self {
        Self {
            kind: R::KIND,
            id: resource.id().to_string(),
            name: resource.name().to_string(),
            state: resource.lifecycle(),
        }
    }
}

/// Latest snapshot of each resource kind. Each vector is replaced wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub containers: Vec<ContainerRecord>,
    pub images: Vec<ImageRecord>,
    pub volumes: Vec<VolumeRecord>,
}

impl Inventory {
    pub fn len_of(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Container => self.containers.len(),
            ResourceKind::Image => self.images.len(),
            ResourceKind::Volume => self.volumes.len(),
        }
    }

    pub fn target_at(&self, kind: ResourceKind, index: usize) -> Option<Target> {
        match kind {
            ResourceKind::Container => self.containers.get(index).map(Target::of),
            ResourceKind::Image => self.images.get(index).map(Target::of),
            ResourceKind::Volume => self.volumes.get(index).map(Target::of),
        }
    }

    /// Observed lifecycle of `id`, `Some(None)` for kinds without one, `None` when absent.
    pub fn observe(&self, kind: ResourceKind, id: &str) -> Option<Option<ContainerState>> {
        match kind {
            ResourceKind::Container => self
                .containers
                .iter()
                .find(|c| c.id == id)
                .map(|c| Some(c.state)),
            ResourceKind::Image => self.images.iter().find(|i| i.id == id).map(|_| None),
            ResourceKind::Volume => self.volumes.iter().find(|v| v.name == id).map(|_| None),
        }
    }

    /// Running or paused containers created from the image with `image_id`.
    pub fn active_dependents(&self, image_id: &str) -> Vec<&ContainerRecord> {
        let Some(image) = self.images.iter().find(|i| i.id == image_id) else {
            return Vec::new();
        };
        self.containers
            .iter()
            .filter(|c| c.state.is_active() && c.descends_from(image))
            .collect()
    }

    /// Containers of any state that mount the named volume.
    pub fn volume_users(&self, volume_name: &str) -> Vec<&ContainerRecord> {
        self.containers
            .iter()
            .filter(|c| c.volumes.iter().any(|name| name == volume_name))
            .collect()
    }
}

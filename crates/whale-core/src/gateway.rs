use crate::{ContainerRecord, ImageRecord, ResourceKind, Verb, VolumeRecord};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("cannot reach container runtime: {0}")]
    Connect(String),
    #[error("runtime rejected request: {0}")]
    Runtime(String),
    #[error("runtime did not answer within {0} ms")]
    Timeout(u64),
    #[error("{verb} is not supported for {kind}s")]
    Unsupported { verb: Verb, kind: ResourceKind },
}

/// A single lifecycle call the session wants fired at the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub id: String,
}

/// Result of polling every resource kind once. Kinds fail independently.
#[derive(Debug)]
pub struct PollBatch {
    pub containers: Result<Vec<ContainerRecord>, GatewayError>,
    pub images: Result<Vec<ImageRecord>, GatewayError>,
    pub volumes: Result<Vec<VolumeRecord>, GatewayError>,
}

impl PollBatch {
    pub fn ok(
        containers: Vec<ContainerRecord>,
        images: Vec<ImageRecord>,
        volumes: Vec<VolumeRecord>,
    ) -> Self {
        Self {
            containers: Ok(containers),
            images: Ok(images),
            volumes: Ok(volumes),
        }
    }
}

/// Access to the container runtime. Every call may block on I/O and may fail.
pub trait ResourceGateway: Send + Sync + 'static {
    fn ping(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn list_containers(
        &self,
        include_stopped: bool,
    ) -> impl Future<Output = Result<Vec<ContainerRecord>, GatewayError>> + Send;

    fn list_images(
        &self,
        include_intermediate: bool,
    ) -> impl Future<Output = Result<Vec<ImageRecord>, GatewayError>> + Send;

    fn list_volumes(&self) -> impl Future<Output = Result<Vec<VolumeRecord>, GatewayError>> + Send;

    fn apply(&self, request: &ActionRequest)
        -> impl Future<Output = Result<(), GatewayError>> + Send;
}

//! Container runtime access over the Docker Engine API.

use bollard::container::{
    KillContainerOptions, ListContainersOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::models::{
    ContainerSummary, ImageSummary, MountPointTypeEnum, Port, Volume,
};
use bollard::volume::{ListVolumesOptions, RemoveVolumeOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use whale_core::{
    ActionRequest, ContainerRecord, ContainerState, GatewayError, ImageRecord, PortMapping,
    ResourceGateway, ResourceKind, Verb, VolumeRecord,
};

/// Seconds the engine waits for a graceful stop before killing.
const STOP_GRACE_SECS: i64 = 5;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const UNTAGGED: &str = "<none>:<none>";

#[derive(Clone)]
pub struct DockerGateway {
    docker: Docker,
}

impl DockerGateway {
    /// Connects to `host` when given, otherwise to whatever the environment points at.
    pub fn connect(host: Option<&str>) -> Result<Self, GatewayError> {
        let docker = match host {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_socket(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) => {
                return Err(GatewayError::Connect(format!(
                    "unsupported host scheme: {host}"
                )))
            }
            None => Docker::connect_with_defaults(),
        }
        .map_err(|err| GatewayError::Connect(err.to_string()))?;
        Ok(Self { docker })
    }
}

/// Images are removed by id, which the engine refuses without `force` when the image carries
/// several tags or is still referenced by a stopped container.
fn image_removal_options() -> RemoveImageOptions {
    RemoveImageOptions {
        force: true,
        ..Default::default()
    }
}

fn runtime_error(err: bollard::errors::Error) -> GatewayError {
    match err {
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            GatewayError::Runtime(message)
        }
        other => GatewayError::Connect(other.to_string()),
    }
}

impl ResourceGateway for DockerGateway {
    async fn ping(&self) -> Result<(), GatewayError> {
        self.docker.ping().await.map_err(runtime_error)?;
        Ok(())
    }

    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerRecord>, GatewayError> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(runtime_error)?;
        Ok(summaries.into_iter().filter_map(container_record).collect())
    }

    async fn list_images(&self, include_intermediate: bool) -> Result<Vec<ImageRecord>, GatewayError> {
        let options = ListImagesOptions::<String> {
            all: include_intermediate,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(runtime_error)?;
        Ok(summaries.into_iter().filter_map(image_record).collect())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, GatewayError> {
        let response = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await
            .map_err(runtime_error)?;
        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(volume_record)
            .collect())
    }

    async fn apply(&self, request: &ActionRequest) -> Result<(), GatewayError> {
        let id = request.id.as_str();
        debug!(event = "gateway_apply", verb = %request.verb, kind = %request.kind, id);
        match (request.kind, request.verb) {
            (ResourceKind::Container, Verb::Start) => self
                .docker
                .start_container(id, None::<StartContainerOptions<String>>)
                .await
                .map_err(runtime_error),
            (ResourceKind::Container, Verb::Stop) => self
                .docker
                .stop_container(id, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
                .await
                .map_err(runtime_error),
            (ResourceKind::Container, Verb::Restart) => self
                .docker
                .restart_container(
                    id,
                    Some(RestartContainerOptions {
                        t: STOP_GRACE_SECS as isize,
                    }),
                )
                .await
                .map_err(runtime_error),
            (ResourceKind::Container, Verb::Pause) => {
                self.docker.pause_container(id).await.map_err(runtime_error)
            }
            (ResourceKind::Container, Verb::Unpause) => {
                self.docker.unpause_container(id).await.map_err(runtime_error)
            }
            (ResourceKind::Container, Verb::Kill) => self
                .docker
                .kill_container(id, None::<KillContainerOptions<String>>)
                .await
                .map_err(runtime_error),
            (ResourceKind::Container, Verb::Remove) => self
                .docker
                .remove_container(
                    id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
                .map_err(runtime_error),
            (ResourceKind::Image, Verb::Remove) => self
                .docker
                .remove_image(id, Some(image_removal_options()), None)
                .await
                .map(|_| ())
                .map_err(runtime_error),
            (ResourceKind::Volume, Verb::Remove) => self
                .docker
                .remove_volume(id, None::<RemoveVolumeOptions>)
                .await
                .map_err(runtime_error),
            (kind, verb) => Err(GatewayError::Unsupported { verb, kind }),
        }
    }
}

fn container_record(summary: ContainerSummary) -> Option<ContainerRecord> {
    let id = summary.id?;
    let name = summary
        .names
        .as_deref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_else(|| id.chars().take(12).collect());
    let state = summary
        .state
        .as_deref()
        .and_then(|state| state.parse().ok())
        .unwrap_or(ContainerState::Unknown);
    let volumes = summary
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter(|mount| mount.typ == Some(MountPointTypeEnum::VOLUME))
        .filter_map(|mount| mount.name)
        .collect();
    let mut networks: Vec<(String, String)> = summary
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(network, endpoint)| {
            endpoint
                .ip_address
                .filter(|ip| !ip.is_empty())
                .map(|ip| (network, ip))
        })
        .collect();
    networks.sort();

    Some(ContainerRecord {
        id,
        name,
        state,
        image: summary.image.unwrap_or_default(),
        image_id: summary.image_id.unwrap_or_default(),
        command: summary.command.unwrap_or_default(),
        ip_addresses: networks.into_iter().map(|(_, ip)| ip).collect(),
        status: summary.status.unwrap_or_default(),
        ports: summary
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(port_mapping)
            .collect(),
        volumes,
    })
}

fn port_mapping(port: Port) -> PortMapping {
    PortMapping {
        private_port: port.private_port,
        public_port: port.public_port,
        protocol: port
            .typ
            .map(|typ| typ.to_string())
            .unwrap_or_else(|| "tcp".to_string()),
    }
}

/// Untagged images are left out of the listing.
fn image_record(summary: ImageSummary) -> Option<ImageRecord> {
    let tags: Vec<String> = summary
        .repo_tags
        .into_iter()
        .filter(|tag| tag != UNTAGGED)
        .collect();
    if tags.is_empty() {
        return None;
    }
    Some(ImageRecord {
        id: summary.id,
        tags,
        size: u64::try_from(summary.size).unwrap_or(0),
        created: Utc.timestamp_opt(summary.created, 0).single(),
    })
}

fn volume_record(volume: Volume) -> VolumeRecord {
    VolumeRecord {
        created: volume
            .created_at
            .as_deref()
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .map(|at| at.with_timezone(&Utc)),
        name: volume.name,
        driver: volume.driver,
        mount_point: volume.mountpoint,
    }
}

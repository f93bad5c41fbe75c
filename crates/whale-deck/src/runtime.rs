//! Background work: the inventory poller and fire-and-forget action calls.

use crate::state::SessionEvent;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use whale_core::{ActionRequest, GatewayError, PollBatch, ResourceGateway};

#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
    pub include_intermediate_images: bool,
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Lists every resource kind concurrently. Stopped containers are always included.
pub async fn poll_inventory<G: ResourceGateway>(gateway: &G, options: &PollOptions) -> PollBatch {
    let (containers, images, volumes) = tokio::join!(
        bounded(options.timeout, gateway.list_containers(true)),
        bounded(
            options.timeout,
            gateway.list_images(options.include_intermediate_images)
        ),
        bounded(options.timeout, gateway.list_volumes()),
    );
    PollBatch {
        containers,
        images,
        volumes,
    }
}

/// Polls on every interval and forwards each batch as a tick. Stops once the receiver is gone.
pub fn spawn_poller<G: ResourceGateway>(
    gateway: Arc<G>,
    options: PollOptions,
    tx: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let batch = poll_inventory(gateway.as_ref(), &options).await;
            if tx.send(SessionEvent::Tick(batch)).await.is_err() {
                debug!(event = "poller_stopped");
                break;
            }
        }
    })
}

/// Fires action requests without waiting on them; the ledger learns the outcome from polls.
pub struct ActionExecutor<G> {
    gateway: Arc<G>,
}

impl<G: ResourceGateway> ActionExecutor<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn submit(&self, request: ActionRequest) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.apply(&request).await {
                warn!(
                    event = "action_failed",
                    verb = %request.verb,
                    kind = %request.kind,
                    id = %request.id,
                    error = %err
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use whale_core::{
        ContainerRecord, ContainerState, ImageRecord, ResourceKind, Verb, VolumeRecord,
    };

    #[derive(Default)]
    struct FakeGateway {
        applied: Mutex<Vec<ActionRequest>>,
        hang_images: bool,
        fail_volumes: bool,
    }

    impl ResourceGateway for FakeGateway {
        async fn ping(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn list_containers(
            &self,
            include_stopped: bool,
        ) -> Result<Vec<ContainerRecord>, GatewayError> {
            assert!(include_stopped);
            Ok(vec![ContainerRecord {
                id: "c1".to_string(),
                name: "web".to_string(),
                state: ContainerState::Exited,
                image: "nginx".to_string(),
                image_id: String::new(),
                command: String::new(),
                ip_addresses: Vec::new(),
                status: String::new(),
                ports: Vec::new(),
                volumes: Vec::new(),
            }])
        }

        async fn list_images(&self, _: bool) -> Result<Vec<ImageRecord>, GatewayError> {
            if self.hang_images {
                std::future::pending::<()>().await;
            }
            Ok(Vec::new())
        }

        async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, GatewayError> {
            if self.fail_volumes {
                return Err(GatewayError::Runtime("volume plugin down".to_string()));
            }
            Ok(Vec::new())
        }

        async fn apply(&self, request: &ActionRequest) -> Result<(), GatewayError> {
            if let Ok(mut applied) = self.applied.lock() {
                applied.push(request.clone());
            }
            if request.verb == Verb::Kill {
                return Err(GatewayError::Runtime("no such container".to_string()));
            }
            Ok(())
        }
    }

    fn options() -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
            include_intermediate_images: false,
        }
    }

    #[tokio::test]
    async fn kinds_fail_independently() {
        let gateway = FakeGateway {
            hang_images: true,
            fail_volumes: true,
            ..Default::default()
        };
        let batch = poll_inventory(&gateway, &options()).await;

        assert_eq!(batch.containers.map(|c| c.len()), Ok(1));
        assert_eq!(batch.images, Err(GatewayError::Timeout(50)));
        assert!(matches!(batch.volumes, Err(GatewayError::Runtime(_))));
    }

    #[tokio::test]
    async fn poller_delivers_ticks_until_receiver_drops() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_poller(Arc::new(FakeGateway::default()), options(), tx);

        for _ in 0..2 {
            match rx.recv().await {
                Some(SessionEvent::Tick(batch)) => assert!(batch.containers.is_ok()),
                other => panic!("expected tick, got {other:?}"),
            }
        }
        drop(rx);
        handle.await.expect("poller exits cleanly");
    }

    #[tokio::test]
    async fn executor_forwards_requests_and_swallows_failures() {
        let gateway = Arc::new(FakeGateway::default());
        let executor = ActionExecutor::new(Arc::clone(&gateway));
        let requests = [
            ActionRequest {
                verb: Verb::Start,
                kind: ResourceKind::Container,
                id: "c1".to_string(),
            },
            ActionRequest {
                verb: Verb::Kill,
                kind: ResourceKind::Container,
                id: "gone".to_string(),
            },
        ];
        for request in requests.clone() {
            executor.submit(request).await.expect("task completes");
        }

        let applied = gateway.applied.lock().expect("lock");
        assert_eq!(applied.as_slice(), &requests);
    }
}

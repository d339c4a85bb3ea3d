// ── Generic polling adapter ──
//
// Most CI servers only offer request/response APIs, so most adapters are
// "fetch every selected project every N seconds, diff against the last
// snapshot". `PollingService` implements that once; a backend only has to
// know how to fetch one project and how to list the selectable ones.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{BuildService, SERVICE_EVENT_CHANNEL_SIZE};
use crate::error::ServiceError;
use crate::model::{Build, BuildInfo, ServiceEvent, ServiceProjects, ServiceSettings};

/// The backend-specific half of a polling adapter.
pub trait BuildBackend: Send + Sync + 'static {
    /// Current state of one selected project.
    fn fetch_build(&self, project: &str)
    -> impl Future<Output = Result<Build, ServiceError>> + Send;

    /// Every project the server offers for selection.
    fn list_builds(&self) -> impl Future<Output = Result<Vec<BuildInfo>, ServiceError>> + Send;
}

/// Adapter that polls a [`BuildBackend`] every `updateInterval` seconds.
///
/// The start signal settles after the first poll. Projects that fail to
/// update keep their last known state with `error` set.
pub struct PollingService<B: BuildBackend> {
    settings: ServiceSettings,
    backend: Arc<B>,
    events: broadcast::Sender<ServiceEvent>,
    projects: watch::Sender<ServiceProjects>,
    /// Token of the current polling run, replaced on every start.
    run: Mutex<Option<CancellationToken>>,
}

impl<B: BuildBackend> PollingService<B> {
    pub fn new(settings: ServiceSettings, backend: B) -> Self {
        let (events, _) = broadcast::channel(SERVICE_EVENT_CHANNEL_SIZE);
        let (projects, _) = watch::channel(ServiceProjects::empty(settings.name.clone()));
        Self {
            settings,
            backend: Arc::new(backend),
            events,
            projects,
            run: Mutex::new(None),
        }
    }

    fn period(&self) -> Duration {
        Duration::from_secs(self.settings.update_interval.max(1))
    }

    fn replace_run(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut guard = self
            .run
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

impl<B: BuildBackend> BuildService for PollingService<B> {
    fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn start(&self) -> BoxFuture<'static, Result<(), ServiceError>> {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.replace_run(Some(cancel.clone())) {
            previous.cancel();
        }

        let ctx = PollContext {
            name: self.settings.name.clone(),
            project_ids: self.settings.projects.clone(),
            backend: Arc::clone(&self.backend),
            events: self.events.clone(),
            projects: self.projects.clone(),
            period: self.period(),
            cancel,
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(poll_task(ctx, ready_tx));

        async move { ready_rx.await.unwrap_or(Err(ServiceError::Stopped)) }.boxed()
    }

    fn stop(&self) {
        if let Some(run) = self.replace_run(None) {
            run.cancel();
            let _ = self.events.send(ServiceEvent::ServiceStopped);
            debug!(service = %self.settings.name, "polling service stopped");
        }
    }

    fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    fn projects(&self) -> watch::Receiver<ServiceProjects> {
        self.projects.subscribe()
    }

    fn available_builds(&self) -> BoxFuture<'static, Result<Vec<BuildInfo>, ServiceError>> {
        let backend = Arc::clone(&self.backend);
        async move { backend.list_builds().await }.boxed()
    }
}

impl<B: BuildBackend> Drop for PollingService<B> {
    fn drop(&mut self) {
        if let Some(run) = self.replace_run(None) {
            run.cancel();
        }
    }
}

// ── Background task ──────────────────────────────────────────────

struct PollContext<B: BuildBackend> {
    name: String,
    project_ids: Vec<String>,
    backend: Arc<B>,
    events: broadcast::Sender<ServiceEvent>,
    projects: watch::Sender<ServiceProjects>,
    period: Duration,
    cancel: CancellationToken,
}

impl<B: BuildBackend> PollContext<B> {
    /// Fetch every selected project concurrently, in selection order.
    async fn poll(&self) -> Vec<Build> {
        let previous = self.projects.borrow().items.clone();
        let results = join_all(
            self.project_ids
                .iter()
                .map(|id| self.backend.fetch_build(id)),
        )
        .await;

        self.project_ids
            .iter()
            .zip(results)
            .map(|(id, result)| match result {
                Ok(mut build) => {
                    if build.id.is_empty() {
                        build.id.clone_from(id);
                    }
                    build
                }
                Err(e) => {
                    warn!(service = %self.name, project = %id, error = %e, "project update failed");
                    let mut build = previous
                        .iter()
                        .find(|b| &b.id == id)
                        .cloned()
                        .unwrap_or_else(|| Build::new(id.clone(), id.clone()));
                    build.error = Some(e.payload());
                    build
                }
            })
            .collect()
    }

    /// Replace the published state, then emit transition events.
    fn publish(&self, builds: Vec<Build>) {
        let previous = self.projects.borrow().items.clone();
        let events = diff_events(&previous, &builds);
        self.projects.send_replace(ServiceProjects {
            name: self.name.clone(),
            items: builds,
        });
        for event in events {
            let _ = self.events.send(event);
        }
    }
}

async fn poll_task<B: BuildBackend>(
    ctx: PollContext<B>,
    ready: oneshot::Sender<Result<(), ServiceError>>,
) {
    let mut ready = Some(ready);
    let mut interval = tokio::time::interval(ctx.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let builds = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            builds = ctx.poll() => builds,
        };
        ctx.publish(builds);

        if let Some(tx) = ready.take() {
            let _ = ctx.events.send(ServiceEvent::ServiceStarted);
            let _ = tx.send(Ok(()));
        }
    }

    debug!(service = %ctx.name, "poll loop exited");
}

// ── Diffing ──────────────────────────────────────────────────────

/// Transition events between two consecutive snapshots of one service.
///
/// Projects without a previous state only report a failed update.
pub fn diff_events(previous: &[Build], current: &[Build]) -> Vec<ServiceEvent> {
    let mut events = Vec::new();
    for build in current {
        let Some(old) = previous.iter().find(|b| b.id == build.id) else {
            if let Some(ref error) = build.error {
                events.push(ServiceEvent::UpdateFailed {
                    error: error.clone(),
                });
            }
            continue;
        };

        if !old.is_broken && build.is_broken {
            events.push(ServiceEvent::BuildBroken {
                build: build.clone(),
            });
        } else if old.is_broken && !build.is_broken {
            events.push(ServiceEvent::BuildFixed {
                build: build.clone(),
            });
        }

        if !old.is_running && build.is_running {
            events.push(ServiceEvent::BuildStarted {
                build: build.clone(),
            });
        } else if old.is_running && !build.is_running {
            events.push(ServiceEvent::BuildFinished {
                build: build.clone(),
            });
        }

        if old.error.is_none() {
            if let Some(ref error) = build.error {
                events.push(ServiceEvent::UpdateFailed {
                    error: error.clone(),
                });
            }
        }
    }
    events
}

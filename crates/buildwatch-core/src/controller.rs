// ── Service controller ──
//
// Owns the lifecycle of every configured adapter. Each call to `start`
// begins a new generation: one reconciliation task that consumes the
// configuration stream, diffs each snapshot against the running adapters,
// and publishes the merged projects view and aggregate event stream.

use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, join_all};
use futures_util::{Stream, StreamExt};
use indexmap::IndexMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::model::{
    ActiveProjects, ControllerEvent, ServiceEvent, ServiceProjects, ServiceSettings,
};
use crate::registry::{ServiceRegistry, ServiceType};
use crate::service::BuildService;
use crate::stream::ProjectsStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// One ordered configuration snapshot.
pub type ServicesSnapshot = Arc<Vec<ServiceSettings>>;

// ── Controller ───────────────────────────────────────────────────

/// Entry point for UI surfaces and the CLI.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. The event stream and the
/// projects view survive across generations; adapters do not.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    registry: Arc<ServiceRegistry>,
    event_tx: broadcast::Sender<ControllerEvent>,
    projects_tx: watch::Sender<ActiveProjects>,
    cancel: CancellationToken,
    /// The running generation, replaced on every `start`.
    generation: Mutex<Option<Generation>>,
}

struct Generation {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Controller {
    /// Create a controller over `registry`. Nothing runs until
    /// [`start()`](Self::start).
    pub fn new(registry: ServiceRegistry) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (projects_tx, _) = watch::channel(ActiveProjects::default());

        Self {
            inner: Arc::new(ControllerInner {
                registry: Arc::new(registry),
                event_tx,
                projects_tx,
                cancel: CancellationToken::new(),
                generation: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Follow a new configuration stream.
    ///
    /// The previous generation (if any) is cancelled and fully torn down
    /// before the first snapshot of `configs` is reconciled. Must be called
    /// from within a tokio runtime.
    pub fn start<S>(&self, configs: S)
    where
        S: Stream<Item = ServicesSnapshot> + Send + 'static,
    {
        let mut slot = self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = slot.take().map(|g| {
            g.cancel.cancel();
            g.handle
        });

        let cancel = self.inner.cancel.child_token();
        let ctx = GenerationContext {
            registry: Arc::clone(&self.inner.registry),
            event_tx: self.inner.event_tx.clone(),
            projects_tx: self.inner.projects_tx.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(generation_task(ctx, previous, configs));

        *slot = Some(Generation { cancel, handle });
        debug!("controller generation started");
    }

    /// Stop every adapter and stop following the configuration stream.
    /// The projects view is left empty.
    pub async fn shutdown(&self) {
        let generation = self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(generation) = generation {
            generation.cancel.cancel();
            let _ = generation.handle.await;
            info!("controller shut down");
        }
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to the aggregate event stream. No replay.
    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Subscribe to the active projects view; the current view is
    /// available immediately.
    pub fn active_projects(&self) -> ProjectsStream {
        ProjectsStream::new(self.inner.projects_tx.subscribe())
    }

    pub fn active_projects_snapshot(&self) -> ActiveProjects {
        self.inner.projects_tx.borrow().clone()
    }

    pub(crate) fn projects_receiver(&self) -> watch::Receiver<ActiveProjects> {
        self.inner.projects_tx.subscribe()
    }

    // ── Registry delegation ──────────────────────────────────────

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn register_type(&self, service_type: ServiceType) {
        self.inner.registry.register_type(service_type);
    }

    pub fn all_types(&self) -> Arc<IndexMap<String, ServiceType>> {
        self.inner.registry.all_types()
    }

    pub fn clear(&self) {
        self.inner.registry.clear();
    }
}

// ── Generation task ──────────────────────────────────────────────

struct GenerationContext {
    registry: Arc<ServiceRegistry>,
    event_tx: broadcast::Sender<ControllerEvent>,
    projects_tx: watch::Sender<ActiveProjects>,
    cancel: CancellationToken,
}

/// Project state pushed by an adapter's forwarding task.
struct ProjectsUpdate {
    name: String,
    instance: u64,
    projects: ServiceProjects,
}

/// A started adapter as tracked by the reconciliation task.
struct RunningService {
    instance: u64,
    settings: ServiceSettings,
    service: Arc<dyn BuildService>,
    /// Cancels this adapter's forwarding tasks.
    cancel: CancellationToken,
    projects: ServiceProjects,
}

impl RunningService {
    fn stop(&self) {
        self.cancel.cancel();
        self.service.stop();
    }
}

async fn generation_task<S>(
    ctx: GenerationContext,
    previous: Option<JoinHandle<()>>,
    configs: S,
) where
    S: Stream<Item = ServicesSnapshot> + Send + 'static,
{
    if let Some(handle) = previous {
        let _ = handle.await;
    }

    let cancel = ctx.cancel.clone();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let mut reconciler = Reconciler {
        ctx,
        update_tx,
        running: IndexMap::new(),
        next_instance: 0,
    };

    let mut configs = pin!(configs);
    let mut configs_open = true;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(update) = update_rx.recv() => reconciler.apply_update(update),
            next = configs.next(), if configs_open => match next {
                Some(snapshot) => reconciler.reconcile(&snapshot),
                None => {
                    debug!("configuration stream ended; keeping current services");
                    configs_open = false;
                }
            },
        }
    }

    reconciler.stop_all();
    debug!("controller generation exited");
}

struct Reconciler {
    ctx: GenerationContext,
    update_tx: mpsc::UnboundedSender<ProjectsUpdate>,
    /// Running adapters in snapshot order.
    running: IndexMap<String, RunningService>,
    next_instance: u64,
}

impl Reconciler {
    fn reconcile(&mut self, snapshot: &[ServiceSettings]) {
        let _ = self.ctx.event_tx.send(ControllerEvent::ServicesInitializing);

        let mut wanted: IndexMap<&str, &ServiceSettings> = IndexMap::new();
        for settings in snapshot {
            if wanted.contains_key(settings.name.as_str()) {
                warn!(service = %settings.name, "duplicate service name; keeping the first");
                continue;
            }
            wanted.insert(settings.name.as_str(), settings);
        }

        // Stop whatever is gone, disabled, or changed.
        self.running.retain(|name, running| {
            let keep = wanted
                .get(name.as_str())
                .is_some_and(|s| s.is_enabled() && **s == running.settings);
            if !keep {
                debug!(service = %name, "stopping service");
                running.stop();
            }
            keep
        });

        // Start new ones in snapshot order, carrying untouched ones over.
        let mut next = IndexMap::with_capacity(wanted.len());
        let mut pending = Vec::new();
        for (name, settings) in wanted {
            if !settings.is_enabled() {
                continue;
            }
            if let Some(running) = self.running.shift_remove(name) {
                next.insert(name.to_owned(), running);
                continue;
            }
            let Some(service_type) = self.ctx.registry.get(&settings.base_url) else {
                debug!(
                    service = %name,
                    base_url = %settings.base_url,
                    "no registered type; skipping service"
                );
                continue;
            };

            let running = self.launch(service_type.create(settings.clone()));
            debug!(service = %name, "starting service");
            pending.push((name.to_owned(), running.service.start()));
            next.insert(name.to_owned(), running);
        }
        self.running = next;
        self.publish();

        if pending.is_empty() {
            let _ = self.ctx.event_tx.send(ControllerEvent::ServicesInitialized);
        } else {
            tokio::spawn(await_started(
                pending,
                self.ctx.event_tx.clone(),
                self.ctx.cancel.clone(),
            ));
        }
    }

    /// Subscribe to a fresh adapter and spawn its forwarding tasks.
    fn launch(&mut self, service: Arc<dyn BuildService>) -> RunningService {
        let instance = self.next_instance;
        self.next_instance += 1;

        let settings = service.settings().clone();
        let cancel = self.ctx.cancel.child_token();
        let events = service.events();
        let mut projects_rx = service.projects();
        let mut projects = projects_rx.borrow_and_update().clone();
        projects.name.clone_from(&settings.name);

        tokio::spawn(forward_events(
            settings.name.clone(),
            events,
            self.ctx.event_tx.clone(),
            cancel.clone(),
        ));
        tokio::spawn(forward_projects(
            settings.name.clone(),
            instance,
            projects_rx,
            self.update_tx.clone(),
            cancel.clone(),
        ));

        RunningService {
            instance,
            settings,
            service,
            cancel,
            projects,
        }
    }

    fn apply_update(&mut self, update: ProjectsUpdate) {
        let Some(running) = self.running.get_mut(&update.name) else {
            return;
        };
        if running.instance != update.instance {
            return;
        }
        running.projects = update.projects;
        running.projects.name = update.name;
        self.publish();
    }

    fn publish(&self) {
        let view: Vec<ServiceProjects> = self
            .running
            .values()
            .map(|r| r.projects.clone())
            .collect();
        self.ctx.projects_tx.send_replace(Arc::new(view));
    }

    fn stop_all(&mut self) {
        for (name, running) in self.running.drain(..) {
            debug!(service = %name, "stopping service");
            running.stop();
        }
        self.publish();
    }
}

// ── Forwarding tasks ─────────────────────────────────────────────

async fn forward_events(
    source: String,
    mut events: broadcast::Receiver<ServiceEvent>,
    event_tx: broadcast::Sender<ControllerEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = events.recv() => match result {
                Ok(event) => {
                    if let ServiceEvent::UpdateFailed { ref error } = event {
                        warn!(service = %source, error = %error.message, "service update failed");
                    }
                    let _ = event_tx.send(ControllerEvent::service(source.clone(), event));
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(service = %source, skipped = n, "event forwarder lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn forward_projects(
    name: String,
    instance: u64,
    mut projects: watch::Receiver<ServiceProjects>,
    update_tx: mpsc::UnboundedSender<ProjectsUpdate>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = projects.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = ProjectsUpdate {
                    name: name.clone(),
                    instance,
                    projects: projects.borrow_and_update().clone(),
                };
                if update_tx.send(update).is_err() {
                    break;
                }
            }
        }
    }
}

/// Wait for every start signal of one reconciliation, then announce it.
async fn await_started(
    pending: Vec<(String, BoxFuture<'static, Result<(), ServiceError>>)>,
    event_tx: broadcast::Sender<ControllerEvent>,
    cancel: CancellationToken,
) {
    let settled = join_all(pending.into_iter().map(|(name, start)| {
        let event_tx = event_tx.clone();
        async move {
            match start.await {
                Ok(()) => debug!(service = %name, "service started"),
                Err(ServiceError::Stopped) => {
                    debug!(service = %name, "service stopped before start");
                }
                Err(e) => {
                    warn!(service = %name, error = %e, "service failed to start");
                    let _ = event_tx.send(ControllerEvent::service(
                        name,
                        ServiceEvent::StartFailed { error: e.payload() },
                    ));
                }
            }
        }
    }));

    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        _ = settled => {
            let _ = event_tx.send(ControllerEvent::ServicesInitialized);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;
    use crate::model::Build;
    use crate::service::testing::{FakeProbe, StartMode, fake_type};

    fn controller() -> (Controller, FakeProbe) {
        let registry = ServiceRegistry::new();
        let (service_type, probe) = fake_type("test");
        registry.register_type(service_type);
        (Controller::new(registry), probe)
    }

    fn svc(name: &str) -> ServiceSettings {
        ServiceSettings::new("test", name)
    }

    fn disabled(name: &str) -> ServiceSettings {
        ServiceSettings {
            disabled: true,
            ..svc(name)
        }
    }

    struct Feed(mpsc::UnboundedSender<ServicesSnapshot>);

    impl Feed {
        fn push(&self, snapshot: Vec<ServiceSettings>) {
            self.0.send(Arc::new(snapshot)).unwrap();
        }
    }

    fn start(controller: &Controller) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        controller.start(UnboundedReceiverStream::new(rx));
        Feed(tx)
    }

    async fn next(events: &mut broadcast::Receiver<ControllerEvent>) -> ControllerEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn until_initialized(
        events: &mut broadcast::Receiver<ControllerEvent>,
    ) -> Vec<ControllerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = next(events).await;
            let done = event == ControllerEvent::ServicesInitialized;
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    fn view_names(controller: &Controller) -> Vec<String> {
        controller
            .active_projects_snapshot()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn enable_then_disable_single_service() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a")]);
        let seen = until_initialized(&mut events).await;
        assert_eq!(seen[0], ControllerEvent::ServicesInitializing);
        assert_eq!(
            controller.active_projects_snapshot().as_slice(),
            &[ServiceProjects::empty("a")]
        );
        assert_eq!(probe.instance("a").start_count(), 1);

        feed.push(vec![disabled("a")]);
        assert_eq!(next(&mut events).await, ControllerEvent::ServicesInitializing);
        assert_eq!(next(&mut events).await, ControllerEvent::ServicesInitialized);
        assert!(controller.active_projects_snapshot().is_empty());
        assert_eq!(probe.instance("a").stop_count(), 1);
    }

    #[tokio::test]
    async fn view_follows_enabled_entries_in_snapshot_order() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("b"), disabled("a"), svc("c")]);
        until_initialized(&mut events).await;

        assert_eq!(view_names(&controller), vec!["b", "c"]);
        assert_eq!(probe.created_names(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn untouched_services_are_not_restarted() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a"), svc("b")]);
        until_initialized(&mut events).await;
        feed.push(vec![svc("a"), svc("b"), svc("c")]);
        until_initialized(&mut events).await;

        assert_eq!(probe.created_names(), vec!["a", "b", "c"]);
        for name in ["a", "b"] {
            let service = probe.instance(name);
            assert_eq!(service.start_count(), 1);
            assert_eq!(service.stop_count(), 0);
        }
        assert_eq!(view_names(&controller), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn removed_and_changed_services_are_replaced() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a"), svc("b"), svc("c")]);
        until_initialized(&mut events).await;
        let first_b = probe.instance("b");

        feed.push(vec![svc("b").with_projects(["x"]), svc("c")]);
        until_initialized(&mut events).await;

        assert_eq!(probe.instance("a").stop_count(), 1);
        assert_eq!(first_b.stop_count(), 1);
        assert_eq!(probe.instance("b").settings.projects, vec!["x"]);
        assert_eq!(probe.instance("c").stop_count(), 0);
        assert_eq!(probe.created_names(), vec!["a", "b", "c", "b"]);
        assert_eq!(view_names(&controller), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn initialized_waits_for_every_start_signal() {
        let (controller, probe) = controller();
        let gate = probe.gate("slow");
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("fast"), svc("slow")]);
        assert_eq!(next(&mut events).await, ControllerEvent::ServicesInitializing);
        settle().await;
        while let Ok(event) = events.try_recv() {
            assert_ne!(event, ControllerEvent::ServicesInitialized);
        }

        gate.send_replace(true);
        until_initialized(&mut events).await;
        assert_eq!(probe.instance("slow").start_count(), 1);
        assert_eq!(view_names(&controller), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn start_failure_is_forwarded_and_still_settles() {
        let (controller, probe) = controller();
        probe.start_with("a", StartMode::Fail("boom".into()));
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a"), svc("b")]);
        let seen = until_initialized(&mut events).await;

        let failed = seen
            .iter()
            .find_map(|e| match e {
                ControllerEvent::Service {
                    source,
                    event: ServiceEvent::StartFailed { error },
                } => Some((source.clone(), error.message.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(failed, ("a".to_owned(), "boom".to_owned()));
        assert_eq!(probe.instance("b").start_count(), 1);
        assert_eq!(view_names(&controller), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn empty_snapshot_initializes_immediately() {
        let (controller, _probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![]);
        assert_eq!(next(&mut events).await, ControllerEvent::ServicesInitializing);
        assert_eq!(next(&mut events).await, ControllerEvent::ServicesInitialized);
        assert!(controller.active_projects_snapshot().is_empty());
    }

    #[tokio::test]
    async fn superseded_transition_still_fires_initialized() {
        let (controller, probe) = controller();
        let _gate = probe.gate("a");
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a")]);
        feed.push(vec![]);

        let mut initializing = 0;
        let mut initialized = 0;
        while initialized < 2 {
            match next(&mut events).await {
                ControllerEvent::ServicesInitializing => initializing += 1,
                ControllerEvent::ServicesInitialized => initialized += 1,
                ControllerEvent::Service { .. } => {}
            }
        }
        assert_eq!(initializing, 2);
        assert_eq!(probe.instance("a").stop_count(), 1);
    }

    #[tokio::test]
    async fn late_subscriber_sees_current_view() {
        let (controller, _probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![svc("a")]);
        until_initialized(&mut events).await;

        let stream = controller.active_projects();
        assert_eq!(stream.current().len(), 1);
        assert_eq!(stream.current()[0].name, "a");
    }

    #[tokio::test]
    async fn project_updates_reach_the_view() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);
        feed.push(vec![svc("a"), svc("b")]);
        until_initialized(&mut events).await;
        let mut view = controller.active_projects();

        probe.instance("b").push_projects(vec![Build::new("x", "x")]);
        let updated = tokio::time::timeout(Duration::from_secs(5), view.changed())
            .await
            .unwrap()
            .unwrap();

        assert!(updated[0].items.is_empty());
        assert_eq!(updated[1].name, "b");
        assert_eq!(updated[1].items, vec![Build::new("x", "x")]);
    }

    #[tokio::test]
    async fn adapter_events_are_tagged_with_source() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);
        feed.push(vec![svc("a")]);
        until_initialized(&mut events).await;
        settle().await;
        while events.try_recv().is_ok() {}

        let build = Build::new("x", "x");
        probe
            .instance("a")
            .emit(ServiceEvent::BuildBroken { build: build.clone() });

        assert_eq!(
            next(&mut events).await,
            ControllerEvent::service("a", ServiceEvent::BuildBroken { build })
        );
    }

    #[tokio::test]
    async fn unknown_type_and_duplicate_names_are_skipped() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);

        feed.push(vec![
            ServiceSettings::new("missing", "ghost"),
            svc("a"),
            svc("a").with_projects(["ignored"]),
        ]);
        until_initialized(&mut events).await;

        assert_eq!(view_names(&controller), vec!["a"]);
        assert_eq!(probe.created_names(), vec!["a"]);
        assert!(probe.instance("a").settings.projects.is_empty());
    }

    #[tokio::test]
    async fn restart_tears_down_previous_generation() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let first = start(&controller);
        first.push(vec![svc("a")]);
        until_initialized(&mut events).await;

        let second = start(&controller);
        second.push(vec![svc("b")]);
        until_initialized(&mut events).await;
        settle().await;
        while events.try_recv().is_ok() {}

        let old = probe.instance("a");
        assert_eq!(old.stop_count(), 1);
        assert_eq!(view_names(&controller), vec!["b"]);

        // The old generation no longer reacts to its stream or its adapters.
        first.0.send(Arc::new(vec![svc("c")])).ok();
        old.emit(ServiceEvent::ServiceStarted);
        probe.instance("b").emit(ServiceEvent::ServiceStopped);
        assert_eq!(
            next(&mut events).await,
            ControllerEvent::service("b", ServiceEvent::ServiceStopped)
        );
        assert!(!probe.created_names().contains(&"c".to_owned()));
    }

    #[tokio::test]
    async fn shutdown_stops_everything_and_empties_view() {
        let (controller, probe) = controller();
        let mut events = controller.events();
        let feed = start(&controller);
        feed.push(vec![svc("a"), svc("b")]);
        until_initialized(&mut events).await;

        controller.shutdown().await;

        assert!(controller.active_projects_snapshot().is_empty());
        assert_eq!(probe.instance("a").stop_count(), 1);
        assert_eq!(probe.instance("b").stop_count(), 1);
    }

    #[tokio::test]
    async fn registry_operations_delegate() {
        let (controller, _probe) = controller();
        controller.register_type(fake_type("other").0);
        assert_eq!(
            controller.all_types().keys().collect::<Vec<_>>(),
            vec!["test", "other"]
        );
        controller.clear();
        assert!(controller.all_types().is_empty());
    }
}

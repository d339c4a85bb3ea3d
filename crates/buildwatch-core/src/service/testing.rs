// Scriptable in-memory adapter for controller, registry and bridge tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::{BuildService, SERVICE_EVENT_CHANNEL_SIZE};
use crate::error::ServiceError;
use crate::model::{
    Build, BuildInfo, ServiceEvent, ServiceProjects, ServiceSettings, ServiceTypeSettings,
};
use crate::registry::ServiceType;

/// How a fake instance's start signal settles.
#[derive(Clone)]
pub(crate) enum StartMode {
    Ready,
    Fail(String),
    /// Settles `Ok` once the gate flips to `true`.
    Gated(watch::Receiver<bool>),
}

/// How `available_builds` answers.
#[derive(Clone)]
pub(crate) enum DiscoveryMode {
    Builds(Vec<BuildInfo>),
    Fail(String),
    Never,
}

struct ProbeState {
    created: Vec<Arc<FakeService>>,
    start: HashMap<String, StartMode>,
    discovery: DiscoveryMode,
}

/// Test-side handle onto every instance a fake type has created.
#[derive(Clone)]
pub(crate) struct FakeProbe(Arc<Mutex<ProbeState>>);

#[allow(clippy::unwrap_used)]
impl FakeProbe {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ProbeState {
            created: Vec::new(),
            start: HashMap::new(),
            discovery: DiscoveryMode::Builds(Vec::new()),
        })))
    }

    pub(crate) fn created(&self) -> Vec<Arc<FakeService>> {
        self.0.lock().unwrap().created.clone()
    }

    pub(crate) fn created_names(&self) -> Vec<String> {
        self.created()
            .iter()
            .map(|s| s.settings.name.clone())
            .collect()
    }

    /// Most recently created instance with this name.
    pub(crate) fn instance(&self, name: &str) -> Arc<FakeService> {
        self.created()
            .into_iter()
            .rev()
            .find(|s| s.settings.name == name)
            .unwrap()
    }

    pub(crate) fn start_with(&self, name: &str, mode: StartMode) {
        self.0.lock().unwrap().start.insert(name.to_owned(), mode);
    }

    /// Instances named `name` created from now on wait for the returned gate.
    pub(crate) fn gate(&self, name: &str) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        self.start_with(name, StartMode::Gated(rx));
        tx
    }

    pub(crate) fn discover_with(&self, mode: DiscoveryMode) {
        self.0.lock().unwrap().discovery = mode;
    }

    fn spawn(&self, settings: ServiceSettings) -> Arc<FakeService> {
        let mut state = self.0.lock().unwrap();
        let start = state
            .start
            .get(&settings.name)
            .cloned()
            .unwrap_or(StartMode::Ready);
        let service = Arc::new(FakeService::new(settings, start, state.discovery.clone()));
        state.created.push(Arc::clone(&service));
        service
    }
}

/// A service type named `Fake {base_url}` whose factory records instances.
pub(crate) fn fake_type(base_url: &str) -> (ServiceType, FakeProbe) {
    let probe = FakeProbe::new();
    let settings = ServiceTypeSettings {
        type_name: format!("Fake {base_url}"),
        base_url: base_url.to_owned(),
        url_hint: None,
        icon: None,
        logo: None,
        fields: Vec::new(),
        default_config: ServiceSettings::new(base_url, ""),
    };
    let factory_probe = probe.clone();
    let service_type = ServiceType::new(settings, move |settings| {
        let service: Arc<dyn BuildService> = factory_probe.spawn(settings);
        service
    });
    (service_type, probe)
}

pub(crate) struct FakeService {
    pub(crate) settings: ServiceSettings,
    events: broadcast::Sender<ServiceEvent>,
    projects: watch::Sender<ServiceProjects>,
    start_mode: StartMode,
    discovery: DiscoveryMode,
    stopped: CancellationToken,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeService {
    fn new(settings: ServiceSettings, start_mode: StartMode, discovery: DiscoveryMode) -> Self {
        let (events, _) = broadcast::channel(SERVICE_EVENT_CHANNEL_SIZE);
        let (projects, _) = watch::channel(ServiceProjects::empty(settings.name.clone()));
        Self {
            settings,
            events,
            projects,
            start_mode,
            discovery,
            stopped: CancellationToken::new(),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub(crate) fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn push_projects(&self, items: Vec<Build>) {
        self.projects.send_replace(ServiceProjects {
            name: self.settings.name.clone(),
            items,
        });
    }

    pub(crate) fn emit(&self, event: ServiceEvent) {
        let _ = self.events.send(event);
    }
}

impl BuildService for FakeService {
    fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn start(&self) -> BoxFuture<'static, Result<(), ServiceError>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_mode.clone() {
            StartMode::Ready => {
                self.emit(ServiceEvent::ServiceStarted);
                futures_util::future::ready(Ok(())).boxed()
            }
            StartMode::Fail(message) => {
                futures_util::future::ready(Err(ServiceError::Failed { message })).boxed()
            }
            StartMode::Gated(mut gate) => {
                let events = self.events.clone();
                let stopped = self.stopped.clone();
                async move {
                    tokio::select! {
                        () = stopped.cancelled() => Err(ServiceError::Stopped),
                        opened = gate.wait_for(|open| *open).map(|r| r.is_ok()) => {
                            if !opened {
                                return Err(ServiceError::Stopped);
                            }
                            let _ = events.send(ServiceEvent::ServiceStarted);
                            Ok(())
                        }
                    }
                }
                .boxed()
            }
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stopped.cancel();
        self.emit(ServiceEvent::ServiceStopped);
    }

    fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    fn projects(&self) -> watch::Receiver<ServiceProjects> {
        self.projects.subscribe()
    }

    fn available_builds(&self) -> BoxFuture<'static, Result<Vec<BuildInfo>, ServiceError>> {
        match self.discovery.clone() {
            DiscoveryMode::Builds(builds) => futures_util::future::ready(Ok(builds)).boxed(),
            DiscoveryMode::Fail(message) => {
                futures_util::future::ready(Err(ServiceError::Failed { message })).boxed()
            }
            DiscoveryMode::Never => futures_util::future::pending().boxed(),
        }
    }
}

// Adapter stand-in for settings a backend refused to build from.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, watch};

use super::{BuildService, SERVICE_EVENT_CHANNEL_SIZE};
use crate::error::ServiceError;
use crate::model::{BuildInfo, ServiceEvent, ServiceProjects, ServiceSettings};

/// Service whose settings could not be turned into a working backend
/// (bad URL, missing field). Every operation fails with the same
/// `InvalidSettings` error; it publishes an empty project list.
pub struct MisconfiguredService {
    settings: ServiceSettings,
    reason: String,
    events: broadcast::Sender<ServiceEvent>,
    projects: watch::Sender<ServiceProjects>,
}

impl MisconfiguredService {
    pub fn new(settings: ServiceSettings, reason: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(SERVICE_EVENT_CHANNEL_SIZE);
        let (projects, _) = watch::channel(ServiceProjects::empty(settings.name.clone()));
        Self {
            settings,
            reason: reason.into(),
            events,
            projects,
        }
    }

    fn error(&self) -> ServiceError {
        ServiceError::InvalidSettings {
            service: self.settings.name.clone(),
            message: self.reason.clone(),
        }
    }
}

impl BuildService for MisconfiguredService {
    fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn start(&self) -> BoxFuture<'static, Result<(), ServiceError>> {
        futures_util::future::ready(Err(self.error())).boxed()
    }

    fn stop(&self) {}

    fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    fn projects(&self) -> watch::Receiver<ServiceProjects> {
        self.projects.subscribe()
    }

    fn available_builds(&self) -> BoxFuture<'static, Result<Vec<BuildInfo>, ServiceError>> {
        futures_util::future::ready(Err(self.error())).boxed()
    }
}

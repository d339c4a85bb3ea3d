// ── Lifecycle and build events ──

use serde::{Deserialize, Serialize};

use super::build::Build;
use crate::error::ErrorPayload;

/// Event published by a single service adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventName", rename_all = "camelCase")]
pub enum ServiceEvent {
    ServiceStarted,
    ServiceStopped,
    BuildBroken { build: Build },
    BuildFixed { build: Build },
    BuildStarted { build: Build },
    BuildFinished { build: Build },
    /// A poll failed after the service had started.
    UpdateFailed { error: ErrorPayload },
    /// The start signal settled with an error.
    StartFailed { error: ErrorPayload },
}

impl ServiceEvent {
    /// Wire name of the event (`buildBroken`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServiceStarted => "serviceStarted",
            Self::ServiceStopped => "serviceStopped",
            Self::BuildBroken { .. } => "buildBroken",
            Self::BuildFixed { .. } => "buildFixed",
            Self::BuildStarted { .. } => "buildStarted",
            Self::BuildFinished { .. } => "buildFinished",
            Self::UpdateFailed { .. } => "updateFailed",
            Self::StartFailed { .. } => "startFailed",
        }
    }
}

/// Event on the controller's aggregate stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "eventName", rename_all = "camelCase")]
pub enum ControllerEvent {
    /// A configuration snapshot arrived and reconciliation began.
    ServicesInitializing,
    /// Every service started by that reconciliation has settled.
    ServicesInitialized,
    /// Forwarded from the adapter named `source`.
    #[serde(untagged)]
    Service {
        source: String,
        #[serde(flatten)]
        event: ServiceEvent,
    },
}

impl ControllerEvent {
    pub fn service(source: impl Into<String>, event: ServiceEvent) -> Self {
        Self::Service {
            source: source.into(),
            event,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ServicesInitializing => "servicesInitializing",
            Self::ServicesInitialized => "servicesInitialized",
            Self::Service { event, .. } => event.name(),
        }
    }
}

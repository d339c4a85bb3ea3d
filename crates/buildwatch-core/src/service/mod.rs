// ── Service adapter contract ──
//
// One adapter per configured CI service. The controller only ever talks to
// adapters through `BuildService`; concrete backends plug in through the
// registry's factories.

pub mod jenkins;
pub mod misconfigured;
pub mod polling;

#[cfg(test)]
pub(crate) mod testing;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, watch};

use crate::error::ServiceError;
use crate::model::{BuildInfo, ServiceEvent, ServiceProjects, ServiceSettings};

pub use misconfigured::MisconfiguredService;
pub use polling::{BuildBackend, PollingService};

/// Capacity of each adapter's event broadcast channel.
pub const SERVICE_EVENT_CHANNEL_SIZE: usize = 64;

/// A running (or startable) adapter for one CI service.
pub trait BuildService: Send + Sync {
    /// The settings this instance was built from.
    fn settings(&self) -> &ServiceSettings;

    /// Begin watching. The returned future is the completion signal: it
    /// settles once the first state is known, or with an error if the
    /// service cannot start. Stopping the service settles it.
    fn start(&self) -> BoxFuture<'static, Result<(), ServiceError>>;

    /// Stop watching. Idempotent.
    fn stop(&self);

    /// Lifecycle and build events.
    fn events(&self) -> broadcast::Receiver<ServiceEvent>;

    /// Latest per-project state; receivers see the current value first.
    fn projects(&self) -> watch::Receiver<ServiceProjects>;

    /// Projects the user could select for this service. Resolves or fails
    /// exactly once; needs no prior `start`.
    fn available_builds(&self) -> BoxFuture<'static, Result<Vec<BuildInfo>, ServiceError>>;
}

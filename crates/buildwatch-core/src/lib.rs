//! Service orchestration between `buildwatch-api` and UI consumers.
//!
//! This crate owns the business logic, domain model, and reactive data
//! infrastructure for the buildwatch workspace:
//!
//! - **[`Controller`]**: central facade. [`start()`](Controller::start)
//!   follows a stream of configuration snapshots and reconciles the set of
//!   running adapters against each one, publishing a merged
//!   [`ActiveProjects`] view and an aggregate [`ControllerEvent`] stream.
//!
//! - **[`ServiceRegistry`]**: service types keyed by `baseUrl`, each a
//!   descriptor plus a factory producing [`BuildService`] adapters.
//!
//! - **[`BuildService`]**: the adapter contract. [`PollingService`] turns
//!   any [`BuildBackend`] into an adapter; Jenkins ships built in.
//!
//! - **[`Bridge`]**: JSON message dispatch and named push channels for UI
//!   surfaces, backed by the [`config_store`] traits.
//!
//! - **[`SnapshotStream<T>`]**: replay-latest subscription handle exposing
//!   `current()` / `latest()` / `changed()`.

pub mod bridge;
pub mod config_store;
pub mod controller;
pub mod error;
pub mod model;
pub mod registry;
pub mod service;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, Channel, Connection, Reply, Request};
pub use config_store::{
    ServiceConfigStore, ServiceConfiguration, ViewConfigStore, ViewConfiguration,
};
pub use controller::{Controller, ServicesSnapshot};
pub use error::{CoreError, ErrorPayload, ServiceError};
pub use registry::{ServiceFactory, ServiceRegistry, ServiceType};
pub use service::{BuildBackend, BuildService, MisconfiguredService, PollingService};
pub use stream::{ProjectsStream, SnapshotStream};

pub use buildwatch_api::{TlsMode, TransportConfig};

pub use model::{
    ActiveProjects, Build, BuildInfo, Change, ControllerEvent, FieldKind, FieldSpec,
    ProjectsSummary, ServiceEvent, ServiceProjects, ServiceSettings, ServiceTypeSettings, Tag,
    ViewSettings,
};

// ── Domain model ──
//
// Settings flow in, builds and events flow out. Everything here is plain
// data with serde derives; the wire shape is camelCase throughout.

pub mod build;
pub mod event;
pub mod settings;
pub mod view;

pub use build::{Build, BuildInfo, Change, ProjectsSummary, ServiceProjects, Tag};
pub use event::{ControllerEvent, ServiceEvent};
pub use settings::{
    DEFAULT_UPDATE_INTERVAL, FieldKind, FieldSpec, ServiceSettings, ServiceTypeSettings,
};
pub use view::ViewSettings;

/// The merged, ordered per-service project state shown to UI surfaces.
pub type ActiveProjects = std::sync::Arc<Vec<ServiceProjects>>;

// ── Build / project state ──
//
// What adapters report and what the dashboard renders: one `Build` per
// watched project, grouped per service into `ServiceProjects`.

use serde::{Deserialize, Serialize};

use crate::error::ErrorPayload;

/// Current state of one watched project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Build {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default)]
    pub is_broken: bool,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_waiting: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Set when the last poll of this project failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Build {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Small label shown next to a build (`Unstable`, `Canceled`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            description: None,
        }
    }
}

/// One commit that went into the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub name: String,
    pub message: String,
}

/// A project the user could select when configuring a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
}

// ── Per-service view ─────────────────────────────────────────────────

/// One entry of the active projects view: a service and its builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProjects {
    pub name: String,
    pub items: Vec<Build>,
}

impl ServiceProjects {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }
}

/// Counts over a whole view, e.g. for a badge or a status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectsSummary {
    pub total: usize,
    pub broken: usize,
    pub running: usize,
    pub errors: usize,
}

impl ProjectsSummary {
    pub fn of(view: &[ServiceProjects]) -> Self {
        view.iter()
            .flat_map(|s| s.items.iter())
            .filter(|b| !b.is_disabled)
            .fold(Self::default(), |mut acc, b| {
                acc.total += 1;
                acc.broken += usize::from(b.is_broken);
                acc.running += usize::from(b.is_running);
                acc.errors += usize::from(b.error.is_some());
                acc
            })
    }

    pub fn is_green(&self) -> bool {
        self.broken == 0 && self.errors == 0
    }
}

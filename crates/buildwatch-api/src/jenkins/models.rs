// Jenkins API response types
//
// Jenkins serializes whatever the `tree=` query asks for, and omits
// fields that are null on the server. Everything optional carries
// `#[serde(default)]` so partial payloads still decode.

use serde::{Deserialize, Serialize};

// ── Job listing ──────────────────────────────────────────────────────

/// Root of `GET /api/json?tree=jobs[...]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// One entry of the job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub buildable: Option<bool>,
}

impl JobSummary {
    /// Folders and multibranch containers carry no color and cannot be built.
    pub fn is_folder(&self) -> bool {
        self.color.is_none() && self.buildable.is_none()
    }
}

// ── Job detail ───────────────────────────────────────────────────────

/// Single job from `GET /job/{name}/api/json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub buildable: Option<bool>,
    #[serde(default)]
    pub in_queue: bool,
    #[serde(default)]
    pub last_build: Option<JobBuild>,
    #[serde(default)]
    pub last_completed_build: Option<JobBuild>,
}

impl Job {
    /// Parsed status color (`blue_anime` becomes `Blue`).
    pub fn color(&self) -> JobColor {
        self.color.as_deref().map_or(JobColor::NotBuilt, JobColor::parse)
    }

    /// A build is in progress, either per the color animation suffix or
    /// per the last build's `building` flag.
    pub fn is_building(&self) -> bool {
        self.color.as_deref().is_some_and(|c| c.ends_with("_anime"))
            || self.last_build.as_ref().is_some_and(|b| b.building)
    }

    /// Result of the most recent finished build.
    pub fn last_result(&self) -> Option<&str> {
        self.last_completed_build
            .as_ref()
            .or(self.last_build.as_ref())
            .and_then(|b| b.result.as_deref())
    }
}

/// A build record embedded in a job payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobBuild {
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
    /// `SUCCESS`, `FAILURE`, `UNSTABLE`, `ABORTED`, or null while running.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub building: bool,
    /// Start time, milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub change_set: Option<ChangeSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub items: Vec<ChangeSetItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeSetItem {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub full_name: String,
}

// ── Color ────────────────────────────────────────────────────────────

/// Jenkins ball color, the server's compact status encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobColor {
    Blue,
    Yellow,
    Red,
    Aborted,
    Disabled,
    NotBuilt,
}

impl JobColor {
    pub fn parse(raw: &str) -> Self {
        match raw.trim_end_matches("_anime") {
            "blue" | "green" => Self::Blue,
            "yellow" => Self::Yellow,
            "red" => Self::Red,
            "aborted" => Self::Aborted,
            "disabled" => Self::Disabled,
            _ => Self::NotBuilt,
        }
    }

    /// Red and yellow both count as broken on a dashboard.
    pub fn is_broken(self) -> bool {
        matches!(self, Self::Red | Self::Yellow)
    }
}

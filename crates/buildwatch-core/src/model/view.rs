// ── Dashboard view settings ──

use serde::{Deserialize, Serialize};

/// Layout preferences for the dashboard and popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ViewSettings {
    pub columns: u8,
    pub full_width_groups: bool,
    pub single_group_rows: bool,
    pub show_commits: bool,
    pub show_commits_when_green: bool,
    pub theme: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            columns: 2,
            full_width_groups: true,
            single_group_rows: false,
            show_commits: true,
            show_commits_when_green: false,
            theme: "dark".into(),
        }
    }
}

// ── Service settings ──
//
// One `ServiceSettings` per configured adapter instance, plus the type
// descriptor metadata the settings UI renders its forms from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default polling interval, seconds.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 60;

/// Settings of one configured service.
///
/// `name` is the unique key within a configuration; `base_url` selects the
/// service type in the registry. Backend-specific fields the core does not
/// understand (credentials, branch filters, ...) are kept in `extra` so a
/// load/save cycle preserves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    pub base_url: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub disabled: bool,
    /// Selected project identifiers, in display order.
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL
}

impl ServiceSettings {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            name: name.into(),
            url: String::new(),
            disabled: false,
            projects: Vec::new(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            extra: Map::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// A backend-specific string field, treating `""` as absent.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ── Type descriptor ──────────────────────────────────────────────────

/// Metadata describing a service type to the settings UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTypeSettings {
    pub type_name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    pub default_config: ServiceSettings,
}

/// One input the settings form shows for a service type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl From<FieldKind> for FieldSpec {
    fn from(kind: FieldKind) -> Self {
        Self {
            kind,
            name: None,
            help: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Url,
    Username,
    Password,
    Token,
    Branch,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_round_trip_through_extra() {
        let raw = json!({
            "baseUrl": "jenkins",
            "name": "CI",
            "url": "https://ci.example.com/",
            "projects": ["core"],
            "username": "bot",
            "branch": "main"
        });

        let settings: ServiceSettings = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(settings.extra_str("username"), Some("bot"));
        assert_eq!(settings.update_interval, DEFAULT_UPDATE_INTERVAL);
        assert!(settings.is_enabled());

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["branch"], "main");
        assert_eq!(back["disabled"], false);
    }

    #[test]
    fn empty_extra_string_counts_as_absent() {
        let settings = ServiceSettings::new("jenkins", "CI").with_extra("password", "");
        assert_eq!(settings.extra_str("password"), None);
    }

    #[test]
    fn settings_equality_sees_extra_fields() {
        let a = ServiceSettings::new("jenkins", "CI");
        let b = a.clone().with_extra("username", "bot");
        assert_ne!(a, b);
    }
}

// ── Jenkins adapter ──
//
// A `BuildBackend` over `buildwatch_api::JenkinsClient`, wrapped in the
// generic `PollingService`. Job names may be folder paths (`team/app`).

use std::sync::Arc;

use buildwatch_api::jenkins::{Job, JobColor};
use buildwatch_api::{BasicAuth, JenkinsClient, TransportConfig};
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use super::{BuildBackend, BuildService, MisconfiguredService, PollingService};
use crate::error::ServiceError;
use crate::model::{
    Build, BuildInfo, Change, FieldKind, ServiceSettings, ServiceTypeSettings, Tag,
};
use crate::registry::ServiceType;

pub const BASE_URL: &str = "jenkins";

pub struct JenkinsBackend {
    client: JenkinsClient,
}

impl JenkinsBackend {
    pub fn new(client: JenkinsClient) -> Self {
        Self { client }
    }

    /// Build a backend from `url` plus optional `username`/`password`
    /// extras.
    pub fn from_settings(
        settings: &ServiceSettings,
        transport: &TransportConfig,
    ) -> Result<Self, ServiceError> {
        let invalid = |message: String| ServiceError::InvalidSettings {
            service: settings.name.clone(),
            message,
        };

        let mut base_url =
            Url::parse(&settings.url).map_err(|e| invalid(format!("url: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let auth = settings.extra_str("username").map(|username| BasicAuth {
            username: username.to_owned(),
            password: SecretString::from(
                settings.extra_str("password").unwrap_or_default().to_owned(),
            ),
        });

        let client = JenkinsClient::new(base_url, auth, transport)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl BuildBackend for JenkinsBackend {
    async fn fetch_build(&self, project: &str) -> Result<Build, ServiceError> {
        let job = self.client.job(project).await?;
        Ok(job_to_build(project, &job))
    }

    async fn list_builds(&self) -> Result<Vec<BuildInfo>, ServiceError> {
        let jobs = self.client.list_jobs().await?;
        debug!(count = jobs.len(), "listed jenkins jobs");
        Ok(jobs
            .into_iter()
            .map(|job| BuildInfo {
                is_disabled: job.buildable == Some(false)
                    || job.color.as_deref().map(JobColor::parse) == Some(JobColor::Disabled),
                id: job.name.clone(),
                name: job.name,
                group: None,
            })
            .collect())
    }
}

/// Map a Jenkins job payload onto the dashboard's build state.
pub fn job_to_build(id: &str, job: &Job) -> Build {
    let color = job.color();
    let mut tags = Vec::new();
    match job.last_result() {
        Some("UNSTABLE") => tags.push(Tag::new("Unstable")),
        Some("ABORTED") => tags.push(Tag::new("Canceled")),
        _ => {}
    }

    let changes = job
        .last_build
        .as_ref()
        .and_then(|b| b.change_set.as_ref())
        .map(|set| {
            set.items
                .iter()
                .map(|item| Change {
                    name: item
                        .author
                        .as_ref()
                        .map(|a| a.full_name.clone())
                        .unwrap_or_default(),
                    message: item.msg.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Build {
        id: id.to_owned(),
        name: job.display_name.clone().unwrap_or_else(|| job.name.clone()),
        group: id.rsplit_once('/').map(|(folder, _)| folder.to_owned()),
        web_url: job.url.clone(),
        is_broken: color.is_broken(),
        is_running: job.is_building(),
        is_waiting: job.in_queue,
        is_disabled: color == JobColor::Disabled || job.buildable == Some(false),
        tags,
        changes,
        error: None,
    }
}

/// Registry entry for Jenkins.
pub fn service_type() -> ServiceType {
    service_type_with(TransportConfig::default())
}

/// The Jenkins service type, with every adapter it creates sharing
/// `transport` (timeouts, TLS mode).
pub fn service_type_with(transport: TransportConfig) -> ServiceType {
    let default_config = ServiceSettings::new(BASE_URL, "")
        .with_extra("username", "")
        .with_extra("password", "");
    let settings = ServiceTypeSettings {
        type_name: "Jenkins".into(),
        base_url: BASE_URL.into(),
        url_hint: Some("https://ci.example.com/jenkins/".into()),
        icon: Some("services/jenkins/icon.png".into()),
        logo: Some("services/jenkins/logo.png".into()),
        fields: vec![
            FieldKind::Url.into(),
            FieldKind::Username.into(),
            FieldKind::Password.into(),
        ],
        default_config,
    };

    ServiceType::new(settings, move |settings| -> Arc<dyn BuildService> {
        match JenkinsBackend::from_settings(&settings, &transport) {
            Ok(backend) => Arc::new(PollingService::new(settings, backend)),
            Err(e) => {
                debug!(service = %settings.name, error = %e, "jenkins settings rejected");
                Arc::new(MisconfiguredService::new(settings, e.to_string()))
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn job(value: serde_json::Value) -> Job {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn red_job_is_broken_with_changes() {
        let build = job_to_build(
            "core",
            &job(json!({
                "name": "core",
                "url": "https://ci/job/core/",
                "color": "red",
                "lastBuild": {
                    "number": 7,
                    "result": "FAILURE",
                    "changeSet": {"items": [{"msg": "fix tests", "author": {"fullName": "Ann"}}]}
                }
            })),
        );

        assert!(build.is_broken);
        assert!(!build.is_running);
        assert_eq!(build.web_url.as_deref(), Some("https://ci/job/core/"));
        assert_eq!(
            build.changes,
            vec![Change {
                name: "Ann".into(),
                message: "fix tests".into()
            }]
        );
    }

    #[test]
    fn animated_color_means_running() {
        let build = job_to_build("core", &job(json!({"name": "core", "color": "blue_anime"})));
        assert!(build.is_running);
        assert!(!build.is_broken);
    }

    #[test]
    fn unstable_and_aborted_become_tags() {
        let unstable = job_to_build(
            "a",
            &job(json!({
                "name": "a",
                "color": "yellow",
                "lastCompletedBuild": {"number": 1, "result": "UNSTABLE"}
            })),
        );
        assert_eq!(unstable.tags, vec![Tag::new("Unstable")]);

        let aborted = job_to_build(
            "a",
            &job(json!({
                "name": "a",
                "color": "aborted",
                "lastCompletedBuild": {"number": 1, "result": "ABORTED"}
            })),
        );
        assert_eq!(aborted.tags, vec![Tag::new("Canceled")]);
        assert!(!aborted.is_broken);
    }

    #[test]
    fn folder_path_sets_group() {
        let build = job_to_build("team/app", &job(json!({"name": "app", "color": "disabled"})));
        assert_eq!(build.group.as_deref(), Some("team"));
        assert_eq!(build.name, "app");
        assert!(build.is_disabled);
    }

    #[test]
    fn bad_url_yields_misconfigured_service() {
        let service =
            service_type().create(ServiceSettings::new(BASE_URL, "ci").with_url("not a url"));
        assert_eq!(service.settings().name, "ci");

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt.block_on(service.start()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSettings { .. }));
    }

    #[tokio::test]
    async fn polls_selected_jobs_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/core/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "core",
                "color": "red",
                "inQueue": true
            })))
            .mount(&server)
            .await;

        let settings = ServiceSettings::new(BASE_URL, "ci")
            .with_url(server.uri())
            .with_projects(["core"]);
        let service = service_type().create(settings);

        service.start().await.unwrap();
        let projects = service.projects().borrow().clone();
        service.stop();

        assert_eq!(projects.name, "ci");
        assert_eq!(projects.items.len(), 1);
        assert!(projects.items[0].is_broken);
        assert!(projects.items[0].is_waiting);
    }

    #[tokio::test]
    async fn missing_job_is_reported_on_the_build() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/gone/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let settings = ServiceSettings::new(BASE_URL, "ci")
            .with_url(server.uri())
            .with_projects(["gone"]);
        let service = service_type().create(settings);

        service.start().await.unwrap();
        let item = service.projects().borrow().items[0].clone();
        service.stop();

        let error = item.error.unwrap();
        assert_eq!(error.name, "NotFound");
        assert!(error.message.contains("job 'gone'"));
    }

    #[tokio::test]
    async fn available_builds_lists_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobs": [
                    {"name": "core", "color": "blue"},
                    {"name": "old", "color": "disabled", "buildable": false}
                ]
            })))
            .mount(&server)
            .await;

        let service =
            service_type().create(ServiceSettings::new(BASE_URL, "ci").with_url(server.uri()));
        let builds = service.available_builds().await.unwrap();

        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].id, "core");
        assert!(!builds[0].is_disabled);
        assert!(builds[1].is_disabled);
    }
}

// Jenkins HTTP client
//
// Wraps `reqwest::Client` with Jenkins URL construction (nested `job/`
// segments for folders), optional basic auth, and status mapping.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::jenkins::models::{Job, JobList, JobSummary};
use crate::transport::TransportConfig;

const JOB_LIST_TREE: &str = "jobs[name,url,color,buildable]";
const JOB_TREE: &str = "name,displayName,url,color,buildable,inQueue,\
    lastBuild[number,url,result,building,timestamp,changeSet[items[msg,author[fullName]]]],\
    lastCompletedBuild[number,url,result,timestamp]";

/// Username plus API token (or password) for Jenkins basic auth.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

/// Read-only client for the Jenkins JSON API.
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Option<BasicAuth>,
}

impl JenkinsClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the Jenkins root (e.g. `https://ci.example.com/jenkins/`).
    pub fn new(
        base_url: Url,
        auth: Option<BasicAuth>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, auth))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: Option<BasicAuth>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List the top-level jobs, skipping folders.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, Error> {
        let mut url = self.url_for(&["api", "json"])?;
        url.query_pairs_mut().append_pair("tree", JOB_LIST_TREE);

        let list: JobList = self.get(url).await?;
        Ok(list.jobs.into_iter().filter(|j| !j.is_folder()).collect())
    }

    /// Fetch one job with its last and last-completed builds.
    ///
    /// `name` may be a folder path (`team/app`); each component becomes a
    /// `job/{component}` URL segment.
    pub async fn job(&self, name: &str) -> Result<Job, Error> {
        let mut url = self.job_url(name)?;
        url.query_pairs_mut().append_pair("tree", JOB_TREE);

        self.get(url).await.map_err(|e| match e {
            Error::NotFound { .. } => Error::NotFound {
                resource: format!("job '{name}'"),
            },
            other => other,
        })
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/job/{a}/job/{b}/api/json`
    pub(crate) fn job_url(&self, name: &str) -> Result<Url, Error> {
        let mut segments = Vec::new();
        for part in name.split('/').filter(|p| !p.is_empty()) {
            segments.push("job");
            segments.push(part);
        }
        segments.extend(["api", "json"]);
        self.url_for(&segments)
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let mut request = self.http.get(url.clone());
        if let Some(ref auth) = self.auth {
            request = request.basic_auth(&auth.username, Some(auth.password.expose_secret()));
        }
        let resp = request.send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("server answered {status} for {}", url.path()),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource: url.path().to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> JenkinsClient {
        JenkinsClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap(), None)
    }

    #[test]
    fn job_url_nests_folders() {
        let c = client("https://ci.example.com/jenkins/");
        let url = c.job_url("team/app").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/jenkins/job/team/job/app/api/json"
        );
    }

    #[test]
    fn job_url_without_trailing_slash() {
        let c = client("https://ci.example.com");
        let url = c.job_url("core").unwrap();
        assert_eq!(url.as_str(), "https://ci.example.com/job/core/api/json");
    }

    #[test]
    fn job_url_encodes_spaces() {
        let c = client("https://ci.example.com/");
        let url = c.job_url("nightly build").unwrap();
        assert_eq!(url.path(), "/job/nightly%20build/api/json");
    }
}

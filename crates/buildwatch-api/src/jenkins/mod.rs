// Jenkins JSON API client modules
//
// Covers the two read paths buildwatch needs: the job listing used for
// project discovery and the per-job status used for polling.

pub mod client;
pub mod models;

pub use client::{BasicAuth, JenkinsClient};
pub use models::{Author, ChangeSet, ChangeSetItem, Job, JobBuild, JobColor, JobSummary};

#![allow(clippy::unwrap_used)]
// Integration tests for `JenkinsClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use buildwatch_api::{BasicAuth, Error, JenkinsClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, JenkinsClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = JenkinsClient::with_client(reqwest::Client::new(), base_url, None);
    (server, client)
}

// ── Job listing ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_jobs_skips_folders() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .and(query_param("tree", "jobs[name,url,color,buildable]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [
                { "name": "core", "url": "http://ci/job/core/", "color": "blue", "buildable": true },
                { "name": "team" },
                { "name": "docs", "color": "red_anime", "buildable": true }
            ]
        })))
        .mount(&server)
        .await;

    let jobs = client.list_jobs().await.unwrap();
    let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["core", "docs"]);
}

#[tokio::test]
async fn test_list_jobs_sends_basic_auth() {
    let server = MockServer::start().await;
    let client = JenkinsClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Some(BasicAuth {
            username: "ci-bot".into(),
            password: "token".to_string().into(),
        }),
    );

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .and(basic_auth("ci-bot", "token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [] })))
        .mount(&server)
        .await;

    assert!(client.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_jobs().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_invalid_json_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    match client.list_jobs().await {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>login</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Job detail ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_job_in_folder() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/job/team/job/app/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "app",
            "color": "red",
            "lastBuild": {
                "number": 7,
                "result": "FAILURE",
                "building": false,
                "changeSet": { "items": [{ "msg": "break it", "author": { "fullName": "Dana" } }] }
            }
        })))
        .mount(&server)
        .await;

    let job = client.job("team/app").await.unwrap();
    assert_eq!(job.name, "app");
    assert!(job.color().is_broken());
    let changes = job.last_build.unwrap().change_set.unwrap().items;
    assert_eq!(changes[0].author.as_ref().unwrap().full_name, "Dana");
}

#[tokio::test]
async fn test_missing_job_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/job/gone/api/json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.job("gone").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Not found: job 'gone'");
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/job/core/api/json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("restarting"))
        .mount(&server)
        .await;

    let err = client.job("core").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
}

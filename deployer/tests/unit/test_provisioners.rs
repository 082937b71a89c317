//! Platform provisioner tests against mocked upstream APIs

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deployer::deploy::repository::{GithubProvisioner, RepositoryOptions, RepositoryProvisioner};
use deployer::deploy::site::{RenderProvisioner, SiteOptions, SiteProvisioner, SiteRequest};
use deployer::errors::DeployError;
use deployer::http::client::{HttpClient, HttpOptions};
use deployer::models::deployment::DeploymentStatus;

fn token() -> SecretString {
    SecretString::from("test-token".to_string())
}

fn github(server: &MockServer) -> GithubProvisioner {
    let client = HttpClient::new(&server.uri(), &HttpOptions::default()).unwrap();
    GithubProvisioner::new(
        client,
        RepositoryOptions {
            raw_content_base_url: "https://raw.example.com".to_string(),
            ..Default::default()
        },
    )
}

fn impatient(server: &MockServer) -> HttpClient {
    HttpClient::new(
        &server.uri(),
        &HttpOptions {
            timeout: Duration::from_millis(200),
            ..Default::default()
        },
    )
    .unwrap()
}

fn render(server: &MockServer) -> RenderProvisioner {
    let client = HttpClient::new(&server.uri(), &HttpOptions::default()).unwrap();
    RenderProvisioner::new(client, SiteOptions::default())
}

fn repository_body(name: &str) -> serde_json::Value {
    repository_body_on(name, "main")
}

fn repository_body_on(name: &str, default_branch: &str) -> serde_json::Value {
    json!({
        "name": name,
        "full_name": format!("octo/{}", name),
        "html_url": format!("https://github.com/octo/{}", name),
        "owner": { "login": "octo" },
        "default_branch": default_branch,
        "private": false
    })
}

async fn mock_owner(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "owner": { "id": "own-1", "name": "Octo", "type": "user" }, "cursor": "c1" }
        ])))
        .mount(server)
        .await;
}

// ============================== SOURCE CONTROL =================================== //

#[tokio::test]
async fn test_github_create_pushes_content() {
    let server = MockServer::start().await;
    let content = "<h1>Hello</h1>";

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({ "name": "site-demo-1", "auto_init": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(repository_body("site-demo-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/octo/site-demo-1/contents/index.html"))
        .and(body_partial_json(json!({
            "content": STANDARD.encode(content),
            "branch": "main"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "content": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let created = github(&server)
        .create("site-demo-1", content, &token())
        .await
        .unwrap();

    assert_eq!(created.repo_url, "https://github.com/octo/site-demo-1");
    assert_eq!(
        created.public_content_url,
        "https://raw.example.com/octo/site-demo-1/main/index.html"
    );
    assert_eq!(created.branch, "main");
}

#[tokio::test]
async fn test_site_deploys_the_branch_holding_the_content() {
    let github_server = MockServer::start().await;
    let render_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(repository_body_on("site-legacy-1", "master")),
        )
        .mount(&github_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/octo/site-legacy-1/contents/index.html"))
        .and(body_partial_json(json!({ "branch": "master" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "content": {} })))
        .expect(1)
        .mount(&github_server)
        .await;

    mock_owner(&render_server).await;
    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .and(body_partial_json(json!({ "branch": "master" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "service": { "id": "srv-legacy", "name": "legacy" }
        })))
        .expect(1)
        .mount(&render_server)
        .await;

    let repo = github(&github_server)
        .create("site-legacy-1", "<p/>", &token())
        .await
        .unwrap();
    assert_eq!(repo.branch, "master");
    assert!(repo.public_content_url.contains("/master/"));

    let key = token();
    let site = render(&render_server)
        .create(SiteRequest {
            name: "legacy",
            repo_url: &repo.repo_url,
            branch: &repo.branch,
            api_key: &key,
        })
        .await
        .unwrap();
    assert_eq!(site.service_id, "srv-legacy");
}

#[tokio::test]
async fn test_github_timeout_is_a_creation_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(repository_body("site-slow-1"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let provisioner = GithubProvisioner::new(impatient(&server), RepositoryOptions::default());
    let err = provisioner
        .create("site-slow-1", "<p/>", &token())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::RepoCreation(_)));
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
async fn test_github_name_collision_is_a_creation_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Repository creation failed.",
            "errors": [{ "message": "name already exists on this account" }]
        })))
        .mount(&server)
        .await;

    let err = github(&server)
        .create("site-demo-1", "<p/>", &token())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::RepoCreation(_)));
    assert!(err.to_string().contains("repository name unavailable"));
}

#[tokio::test]
async fn test_github_failed_push_removes_the_repository() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(repository_body("site-demo-1")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/octo/site-demo-1/contents/index.html"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "conflict" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/site-demo-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = github(&server)
        .create("site-demo-1", "<p/>", &token())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::RepoCreation(_)));
}

#[tokio::test]
async fn test_github_delete_of_missing_repository_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octo" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/site-gone-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(2)
        .mount(&server)
        .await;

    let provisioner = github(&server);
    provisioner.delete("site-gone-1", &token()).await.unwrap();
    // login is cached, the second call only issues the delete
    provisioner.delete("site-gone-1", &token()).await.unwrap();
}

#[tokio::test]
async fn test_github_delete_failure_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octo" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/site-demo-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Must have admin rights to Repository."
        })))
        .mount(&server)
        .await;

    let err = github(&server)
        .delete("site-demo-1", &token())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::RepoDeletion(_)));
    assert!(err.to_string().contains("admin rights"));
}

// ============================== STATIC HOSTING =================================== //

#[tokio::test]
async fn test_render_create_static_site() {
    let server = MockServer::start().await;
    mock_owner(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .and(body_partial_json(json!({
            "type": "static_site",
            "name": "my-site",
            "ownerId": "own-1",
            "repo": "https://github.com/octo/site-my-site-1",
            "branch": "main",
            "autoDeploy": "yes",
            "serviceDetails": { "publishPath": "./" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "service": { "id": "srv-abc", "name": "my-site" },
            "deployId": "dep-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = token();
    let created = render(&server)
        .create(SiteRequest {
            name: "my-site",
            repo_url: "https://github.com/octo/site-my-site-1",
            branch: "main",
            api_key: &key,
        })
        .await
        .unwrap();

    assert_eq!(created.service_id, "srv-abc");
    assert_eq!(created.status, DeploymentStatus::Building);
}

#[tokio::test]
async fn test_render_create_failure_carries_upstream_message() {
    let server = MockServer::start().await;
    mock_owner(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "invalid repo url" })),
        )
        .mount(&server)
        .await;

    let key = token();
    let err = render(&server)
        .create(SiteRequest {
            name: "my-site",
            repo_url: "https://github.com/octo/missing",
            branch: "main",
            api_key: &key,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "site_creation_failed");
    assert!(err.to_string().contains("400 - invalid repo url"));
}

#[tokio::test]
async fn test_render_timeout_is_a_creation_failure() {
    let server = MockServer::start().await;
    mock_owner(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "service": { "id": "srv-late", "name": "late" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let key = token();
    let err = RenderProvisioner::new(impatient(&server), SiteOptions::default())
        .create(SiteRequest {
            name: "late",
            repo_url: "https://github.com/octo/site-late-1",
            branch: "main",
            api_key: &key,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "site_creation_failed");
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
async fn test_render_status_maps_latest_deploy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/services/srv-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "srv-abc",
            "name": "my-site",
            "serviceDetails": { "url": "https://my-site.onrender.com" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/srv-abc/deploys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "deploy": { "id": "dep-2", "status": "live" }, "cursor": "c" }
        ])))
        .mount(&server)
        .await;

    let status = render(&server)
        .get_status("srv-abc", &token())
        .await
        .unwrap();

    assert_eq!(status.status, DeploymentStatus::Live);
    assert_eq!(status.url.as_deref(), Some("https://my-site.onrender.com"));
}

#[tokio::test]
async fn test_render_status_defaults_to_building() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/services/srv-new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "srv-new", "name": "n" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/srv-new/deploys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/srv-odd"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "srv-odd", "name": "o" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/services/srv-odd/deploys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "deploy": { "id": "dep-9", "status": "teleporting" } }
        ])))
        .mount(&server)
        .await;

    let provisioner = render(&server);
    let fresh = provisioner.get_status("srv-new", &token()).await.unwrap();
    assert_eq!(fresh.status, DeploymentStatus::Building);
    assert!(fresh.url.is_none());

    let odd = provisioner.get_status("srv-odd", &token()).await.unwrap();
    assert_eq!(odd.status, DeploymentStatus::Building);
}

#[tokio::test]
async fn test_render_delete_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/services/srv-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/services/srv-busy"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let provisioner = render(&server);
    provisioner.delete("srv-gone", &token()).await.unwrap();

    let err = provisioner
        .delete("srv-busy", &token())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::SiteDeletion(_)));
}

//! Orchestrator tests over fake platforms

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deployer::deploy::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use deployer::deploy::site::{RenderProvisioner, SiteOptions, SiteStatus};
use deployer::errors::DeployError;
use deployer::http::client::{HttpClient, HttpOptions};
use deployer::models::deployment::{DeploymentStatus, MAX_ERROR_MESSAGE_LEN};
use deployer::ratelimit::{RateLimitOptions, RateLimiter};

use crate::support::{request, Harness, ReadOnlyStore, ALICE};

#[tokio::test]
async fn test_successful_deploy_records_one_building_deployment() {
    let h = Harness::new().await;

    let deployment = h
        .orchestrator
        .deploy(ALICE, &request("My Portfolio Site"))
        .await
        .unwrap();

    assert_eq!(deployment.status, DeploymentStatus::Building);
    assert_eq!(deployment.service_name, "my-portfolio-site");
    assert!(!deployment.repo_url.as_deref().unwrap_or_default().is_empty());
    assert!(!deployment
        .external_service_id
        .as_deref()
        .unwrap_or_default()
        .is_empty());

    // repo name is <prefix>-<normalized>-<unix millis>
    let created = h.repos.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    let millis = created[0]
        .strip_prefix("site-my-portfolio-site-")
        .expect("prefixed repo name");
    assert!(millis.parse::<i64>().is_ok());
    assert_eq!(deployment.repo_name.as_deref(), Some(created[0].as_str()));

    // the site is bound to the repository that was just created
    let sites = h.sites.created.lock().unwrap().clone();
    assert_eq!(sites.len(), 1);
    assert_eq!(Some(sites[0].1.as_str()), deployment.repo_url.as_deref());

    let records = h.records(ALICE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, deployment.id);
    assert_eq!(records[0].page_id.as_deref(), Some("page-1"));
    assert!(h.repos.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_requests_make_no_external_calls() {
    let h = Harness::new().await;

    let mut empty = request("valid-name");
    empty.content = "   \n".to_string();
    let cases = [empty, request("ab"), request("!!"), request("   ")];

    for case in &cases {
        let err = h.orchestrator.deploy(ALICE, case).await.unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)), "{err}");
        assert_eq!(err.code(), "validation_failed");
    }

    assert!(h.repos.created.lock().unwrap().is_empty());
    assert!(h.sites.created.lock().unwrap().is_empty());
    assert!(h.records(ALICE).await.is_empty());

    // rejected requests do not consume the rate limit
    for i in 0..5 {
        h.orchestrator
            .deploy(ALICE, &request(&format!("site-{i}")))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_sixth_deploy_in_window_is_rate_limited() {
    let h = Harness::new().await;

    for i in 0..5 {
        h.orchestrator
            .deploy(ALICE, &request(&format!("site-{i}")))
            .await
            .unwrap();
    }

    let err = h
        .orchestrator
        .deploy(ALICE, &request("site-6"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::RateLimited(_)));
    assert_eq!(err.status_code(), 429);

    assert_eq!(h.repos.created.lock().unwrap().len(), 5);
    assert_eq!(h.records(ALICE).await.len(), 5);
    assert!(h.orchestrator.rate_limiter().retry_after(ALICE).is_some());
}

#[tokio::test]
async fn test_missing_credentials_are_reported() {
    let h = Harness::new().await;

    let err = h
        .orchestrator
        .deploy("bob", &request("bobs-site"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "deployment_config_missing");
    assert!(err.to_string().contains("GitHub token"));
    assert!(h.repos.created.lock().unwrap().is_empty());
    assert!(h.records("bob").await.is_empty());
}

#[tokio::test]
async fn test_repo_failure_records_failed_deployment_without_site_call() {
    let h = Harness::new().await;
    *h.repos.create_error.lock().unwrap() = Some(DeployError::RepoCreation(
        "repository name unavailable: name already exists".to_string(),
    ));

    let err = h
        .orchestrator
        .deploy(ALICE, &request("taken"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "repo_creation_failed");

    assert!(h.sites.created.lock().unwrap().is_empty());
    assert!(h.repos.deleted.lock().unwrap().is_empty());

    let records = h.records(ALICE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Failed);
    assert!(records[0].repo_url.is_none());
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("name already exists"));
}

#[tokio::test]
async fn test_unexpected_repo_errors_become_repo_creation_failures() {
    let h = Harness::new().await;
    *h.repos.create_error.lock().unwrap() =
        Some(DeployError::Internal("connection reset".to_string()));

    let err = h
        .orchestrator
        .deploy(ALICE, &request("flaky"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::RepoCreation(_)));
}

#[tokio::test]
async fn test_site_failure_deletes_the_repository() {
    let h = Harness::new().await;
    *h.sites.create_error.lock().unwrap() =
        Some(DeployError::SiteCreation("400 - invalid repo".to_string()));

    let err = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "site_creation_failed");

    let created = h.repos.created.lock().unwrap().clone();
    let deleted = h.repos.deleted.lock().unwrap().clone();
    assert_eq!(deleted, created);

    let records = h.records(ALICE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Failed);
    assert!(records[0].external_service_id.is_none());
}

#[tokio::test]
async fn test_rollback_failure_keeps_site_error() {
    let h = Harness::new().await;
    h.repos.fail_delete.store(true, Ordering::SeqCst);
    *h.sites.create_error.lock().unwrap() =
        Some(DeployError::SiteCreation("500 - upstream down".to_string()));

    let err = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::SiteCreation(_)));
    assert!(err.to_string().contains("upstream down"));
    assert_eq!(h.repos.deleted.lock().unwrap().len(), 1);

    let records = h.records(ALICE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_site_timeout_is_compensated_like_a_failure() {
    let h = Harness::new().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "owner": { "id": "own-1", "name": "Octo", "type": "user" } }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "service": { "id": "srv-late", "name": "my-site" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(
        &server.uri(),
        &HttpOptions {
            timeout: Duration::from_millis(200),
            ..Default::default()
        },
    )
    .unwrap();
    let orchestrator = DeploymentOrchestrator::new(
        OrchestratorOptions::default(),
        Arc::new(RateLimiter::new(RateLimitOptions::default())),
        h.credentials.clone(),
        h.repos.clone(),
        Arc::new(RenderProvisioner::new(client, SiteOptions::default())),
        h.store.clone(),
    );

    let err = orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "site_creation_failed");
    assert!(err.to_string().contains("timed out"), "{err}");

    let created = h.repos.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(*h.repos.deleted.lock().unwrap(), created);

    let records = h.records(ALICE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_stored_error_messages_are_bounded() {
    let h = Harness::new().await;
    *h.repos.create_error.lock().unwrap() =
        Some(DeployError::RepoCreation("x".repeat(5_000)));

    h.orchestrator
        .deploy(ALICE, &request("long-error"))
        .await
        .unwrap_err();

    let records = h.records(ALICE).await;
    let message = records[0].error_message.as_deref().unwrap_or_default();
    assert!(message.chars().count() <= MAX_ERROR_MESSAGE_LEN);
}

#[tokio::test]
async fn test_unrecorded_success_is_fully_compensated() {
    let h = Harness::with_store(Arc::new(ReadOnlyStore)).await;

    let err = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Storage(_)));

    assert_eq!(*h.sites.deleted.lock().unwrap(), vec!["srv-1".to_string()]);
    assert_eq!(
        *h.repos.deleted.lock().unwrap(),
        *h.repos.created.lock().unwrap()
    );
}

#[tokio::test]
async fn test_listing_only_polls_when_asked() {
    let h = Harness::new().await;
    let deployment = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap();
    let service_id = deployment.external_service_id.clone().unwrap();

    h.sites.statuses.lock().unwrap().insert(
        service_id.clone(),
        SiteStatus {
            status: DeploymentStatus::Live,
            url: Some("https://my-site.onrender.com".to_string()),
        },
    );

    let listed = h.orchestrator.list(ALICE, false).await.unwrap();
    assert_eq!(listed[0].status, DeploymentStatus::Building);
    assert_eq!(h.sites.status_calls.load(Ordering::SeqCst), 0);

    let listed = h.orchestrator.list(ALICE, true).await.unwrap();
    assert_eq!(listed[0].status, DeploymentStatus::Live);
    assert_eq!(
        listed[0].site_url.as_deref(),
        Some("https://my-site.onrender.com")
    );
    assert_eq!(h.sites.status_calls.load(Ordering::SeqCst), 1);

    // live is terminal, later observations are ignored
    h.sites.statuses.lock().unwrap().insert(
        service_id,
        SiteStatus {
            status: DeploymentStatus::Failed,
            url: None,
        },
    );
    assert_eq!(h.orchestrator.refresh_all().await.unwrap(), 0);
    let fetched = h.orchestrator.get(ALICE, &deployment.id).await.unwrap();
    assert_eq!(fetched.status, DeploymentStatus::Live);
}

#[tokio::test]
async fn test_refresh_failure_leaves_record_unchanged() {
    let h = Harness::new().await;
    let deployment = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap();

    // no status registered, the fake answers 404
    assert_eq!(h.orchestrator.refresh(ALICE).await.unwrap(), 0);
    let fetched = h.orchestrator.get(ALICE, &deployment.id).await.unwrap();
    assert_eq!(fetched.status, DeploymentStatus::Building);
}

#[tokio::test]
async fn test_deployments_are_owner_scoped() {
    let h = Harness::new().await;
    let deployment = h
        .orchestrator
        .deploy(ALICE, &request("my-site"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .get("mallory", &deployment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::NotFound(_)));
    assert!(h.orchestrator.list("mallory", false).await.unwrap().is_empty());
}

//! End-to-end tests of the pinning API over an in-memory database and
//!  a recording backend. Requests go through the full router, including
//!  authentication and error mapping.

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::prelude::{Owner, OrchestratorConfig, Principal, QuotaLedger};
use common::testkit::{wait_for, RecordingBackend, V0_CID, V1_CID};
use pinsvc_daemon::http_server::router;
use pinsvc_daemon::{Database, ServiceState};

struct Harness {
    router: Router,
    db: Database,
    backend: RecordingBackend,
    human: String,
    agent: String,
    sibling: String,
    stranger: String,
}

async fn harness(backend: RecordingBackend) -> Harness {
    let db = Database::memory().await.unwrap();
    let human = db
        .create_principal(&Principal::human("h1"), 10_000)
        .await
        .unwrap();
    let agent = db
        .create_principal(&Principal::agent("a1", Some("h1".into())), 10_000)
        .await
        .unwrap();
    let sibling = db
        .create_principal(&Principal::agent("a2", Some("h1".into())), 10_000)
        .await
        .unwrap();
    let stranger = db
        .create_principal(&Principal::agent("a3", Some("h2".into())), 10_000)
        .await
        .unwrap();

    let state = ServiceState::new(
        db.clone(),
        Arc::new(backend.clone()),
        OrchestratorConfig::default(),
    );

    Harness {
        router: router(state),
        db,
        backend,
        human,
        agent,
        sibling,
        stranger,
    }
}

impl Harness {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header("authorization", format!("Bearer {}", key));
        }
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(&self, key: &str, cid: &str) -> (StatusCode, Value) {
        self.send("POST", "/api/v0/pins", Some(key), Some(json!({ "cid": cid })))
            .await
    }

    async fn wait_for_status(&self, key: &str, id: &str, status: &str) -> Value {
        let uri = format!("/api/v0/pins/{}", id);
        wait_for(|| {
            let uri = uri.clone();
            async move {
                let (_, body) = self.send("GET", &uri, Some(key), None).await;
                (body["status"] == status).then_some(body)
            }
        })
        .await
        .unwrap_or_else(|| panic!("pin {} never reached {}", id, status))
    }
}

#[tokio::test]
async fn test_pin_round_trip() {
    let h = harness(RecordingBackend::new().with_size(V1_CID, 1024)).await;

    let (status, body) = h.create(&h.agent, V1_CID).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["pin"]["cid"], V1_CID);
    assert_eq!(body["delegates"], json!([]));

    let id = body["requestid"].as_str().unwrap().to_string();
    let pinned = h.wait_for_status(&h.agent, &id, "pinned").await;
    assert_eq!(pinned["info"]["size_bytes"], 1024);
    assert_eq!(h.backend.pinned(), vec![V1_CID.to_string()]);

    let (status, usage) = h.send("GET", "/api/v0/storage", Some(&h.agent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["used"], 1024);
    assert_eq!(usage["quota"], 10_000);

    let (status, list) = h.send("GET", "/api/v0/pins", Some(&h.agent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["requestid"], id.as_str());
}

#[tokio::test]
async fn test_duplicate_pin_conflicts() {
    let h = harness(RecordingBackend::new()).await;
    let (status, _) = h.create(&h.agent, V0_CID).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = h.create(&h.agent, V0_CID).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_CONTENT");
}

#[tokio::test]
async fn test_invalid_cid_is_rejected() {
    let h = harness(RecordingBackend::new()).await;
    let (status, body) = h.create(&h.agent, "not-a-cid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_whitespace_around_cid_is_rejected() {
    let h = harness(RecordingBackend::new()).await;
    let (status, body) = h.create(&h.agent, &format!("  {V0_CID}\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = h.send("GET", "/api/v0/pins", Some(&h.agent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_agent_listing_follows_relationships() {
    let h = harness(RecordingBackend::new()).await;
    h.create(&h.agent, V1_CID).await;

    let (status, list) = h
        .send("GET", "/api/v0/agents/a1/pins", Some(&h.sibling), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);

    let (status, _) = h
        .send("GET", "/api/v0/agents/a1/pins", Some(&h.human), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .send("GET", "/api/v0/agents/a1/pins", Some(&h.stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = h
        .send("GET", "/api/v0/agents/ghost/pins", Some(&h.human), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_storage_is_limited_to_self_and_claimer() {
    let h = harness(RecordingBackend::new()).await;

    let (status, _) = h
        .send("GET", "/api/v0/agents/a1/storage", Some(&h.human), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send("GET", "/api/v0/agents/a1/storage", Some(&h.sibling), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_releases_quota_and_unpins() {
    let h = harness(RecordingBackend::new().with_size(V1_CID, 2000)).await;
    h.db.adjust_usage(&Owner::agent("a1"), 3000).await.unwrap();

    let (_, body) = h.create(&h.agent, V1_CID).await;
    let id = body["requestid"].as_str().unwrap().to_string();
    h.wait_for_status(&h.agent, &id, "pinned").await;

    let (_, usage) = h.send("GET", "/api/v0/storage", Some(&h.agent), None).await;
    assert_eq!(usage["used"], 5000);

    // only the owner may delete
    let uri = format!("/api/v0/pins/{}", id);
    let (status, _) = h.send("DELETE", &uri, Some(&h.sibling), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h.send("DELETE", &uri, Some(&h.agent), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, usage) = h.send("GET", "/api/v0/storage", Some(&h.agent), None).await;
    assert_eq!(usage["used"], 3000);

    let (status, _) = h.send("GET", &uri, Some(&h.agent), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let backend = h.backend.clone();
    let unpinned = wait_for(|| {
        let backend = backend.clone();
        async move { (!backend.unpinned().is_empty()).then(|| backend.unpinned()) }
    })
    .await;
    assert_eq!(unpinned, Some(vec![V1_CID.to_string()]));
}

#[tokio::test]
async fn test_authentication_is_required() {
    let h = harness(RecordingBackend::new()).await;

    let (status, body) = h.send("GET", "/api/v0/pins", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = h.send("GET", "/api/v0/pins", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_exhausted_quota_is_payment_required() {
    let h = harness(RecordingBackend::new()).await;
    h.db.adjust_usage(&Owner::agent("a1"), 10_000).await.unwrap();

    let (status, body) = h.create(&h.agent, V1_CID).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");

    let (_, list) = h.send("GET", "/api/v0/pins", Some(&h.agent), None).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let h = harness(RecordingBackend::new()).await;
    let (status, body) = h.send("GET", "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use portal_gate::{
    ApiError, ApiRequest, ApiResponse, AuthEvents, ClientRouter, GateConfig, InterceptorLayer,
    RequestInterceptor, ResponseInterceptor, Right, RouteGuard, RouteTable, SessionRecord,
    TransportFailure,
    routes::{LOGIN_PATH, NavigatorState},
    session::{MemorySessionStore, Rights, SessionState, SessionStore},
    watch_auth_changes,
};
use reqwest::{StatusCode, header::HeaderMap};
use serde_json::json;
use tokio::task::JoinSet;
use tower::{Service, ServiceBuilder, ServiceExt, service_fn, util::BoxCloneService};

type Pipeline = BoxCloneService<ApiRequest, ApiResponse, ApiError>;

// --- Test harness ---

/// Everything a pipeline test needs to look at after the call.
struct Harness {
    store: Arc<MemorySessionStore>,
    events: AuthEvents,
    router: Arc<ClientRouter>,
    seen: Arc<Mutex<Vec<ApiRequest>>>,
}

impl Harness {
    fn new(session: SessionRecord) -> Self {
        let store = Arc::new(MemorySessionStore::with_session(&session));
        let guard = RouteGuard::new(store.clone() as SessionState, Arc::new(RouteTable::portal()));
        Self {
            store,
            events: AuthEvents::new(),
            router: Arc::new(ClientRouter::new(guard)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builds the pipeline over a fake transport answering with `status`.
    fn pipeline(&self, status: StatusCode) -> Pipeline {
        let layer = InterceptorLayer::new(
            RequestInterceptor::from_config(self.store.clone(), &GateConfig::default()),
            ResponseInterceptor::new(
                self.store.clone(),
                self.events.clone(),
                self.router.clone() as NavigatorState,
            ),
        );

        let seen = self.seen.clone();
        let transport = service_fn(move |req: ApiRequest| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(req.clone());
                if status.is_success() {
                    Ok(ApiResponse {
                        status,
                        headers: HeaderMap::new(),
                        body: br#"{"ok":true}"#.to_vec(),
                    })
                } else {
                    Err(TransportFailure::Status {
                        status,
                        body: Some(json!({"message": format!("status {}", status.as_u16())})),
                    })
                }
            }
        });

        BoxCloneService::new(ServiceBuilder::new().layer(layer).service(transport))
    }

    fn last_seen(&self) -> ApiRequest {
        self.seen.lock().unwrap().last().cloned().expect("transport was called")
    }
}

fn signed_in(rights: &[Right]) -> SessionRecord {
    SessionRecord {
        rights: rights
            .iter()
            .fold(Rights::default(), |acc, right| acc.with(*right, true)),
        ..SessionRecord::with_token("abc")
    }
}

// --- Request stage ---

#[tokio::test]
async fn test_transport_receives_intercepted_request() {
    let harness = Harness::new(SessionRecord::with_token("abc"));
    let pipeline = harness.pipeline(StatusCode::OK);

    let response = pipeline
        .oneshot(ApiRequest::post("/Students").json(json!({"name": "x"})))
        .await
        .unwrap();

    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"ok": true}));
    let sent = harness.last_seen();
    assert_eq!(sent.headers["authorization"], "Bearer abc");
    assert_eq!(sent.headers["content-type"], "application/json");
}

#[tokio::test]
async fn test_strict_request_reaches_transport_sanitized() {
    let harness = Harness::new(SessionRecord::with_token("abc"));
    let pipeline = harness.pipeline(StatusCode::OK);

    pipeline
        .oneshot(ApiRequest::get("/Dogovor?foo=1&nomer=  7 "))
        .await
        .unwrap();

    let sent = harness.last_seen();
    assert_eq!(sent.target(), "/Dogovor?nomer=7");
    assert!(sent.headers.get("authorization").is_none());
    assert!(sent.headers.get("token").is_none());
    assert!(sent.headers.get("x-auth-token").is_none());
}

// --- Response stage ---

#[tokio::test]
async fn test_server_error_is_normalized_and_session_kept() {
    let harness = Harness::new(signed_in(&[Right::Students]));
    harness.router.push("/students");
    let pipeline = harness.pipeline(StatusCode::INTERNAL_SERVER_ERROR);

    let error = pipeline.oneshot(ApiRequest::get("/Students")).await.unwrap_err();

    assert_eq!(error.status, Some(500));
    assert_eq!(error.message, "status 500");
    assert!(harness.store.read_session().is_some());
    assert_eq!(harness.router.current(), "/students");
}

#[tokio::test]
async fn test_unauthorized_logs_out_and_returns_error() {
    let harness = Harness::new(signed_in(&[Right::Contracts]));
    harness.router.push("/contracts");
    let mut listener = harness.events.subscribe();
    let pipeline = harness.pipeline(StatusCode::UNAUTHORIZED);

    let error = pipeline.oneshot(ApiRequest::get("/Contracts")).await.unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(harness.store.read_session(), None);
    assert_eq!(harness.router.current(), LOGIN_PATH);
    assert!(listener.try_recv().is_ok());
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_redirect_once() {
    let harness = Harness::new(signed_in(&[Right::Students, Right::Teachers]));
    harness.router.push("/students");
    harness.router.push("/teachers");
    let pipeline = harness.pipeline(StatusCode::UNAUTHORIZED);

    let mut calls = JoinSet::new();
    for path in ["/Students", "/Teachers", "/Groups", "/Rooms"] {
        let pipeline = pipeline.clone();
        calls.spawn(async move { pipeline.oneshot(ApiRequest::get(path)).await });
    }
    while let Some(result) = calls.join_next().await {
        assert!(result.unwrap().unwrap_err().is_unauthorized());
    }

    // The teachers entry was replaced by login once; nothing else was stacked.
    assert_eq!(
        harness.router.history(),
        vec!["/".to_string(), "/students".to_string(), LOGIN_PATH.to_string()]
    );
    assert_eq!(harness.store.read_session(), None);
}

#[tokio::test]
async fn test_poll_ready_delegates_to_transport() {
    let harness = Harness::new(SessionRecord::with_token("abc"));
    let mut pipeline = harness.pipeline(StatusCode::OK);

    let ready = pipeline.ready().await.unwrap();
    let response = ready.call(ApiRequest::get("/Teachers")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
}

// --- Listeners ---

#[tokio::test]
async fn test_auth_listener_revalidates_router() {
    let harness = Harness::new(signed_in(&[Right::Analysis]));
    harness.router.push("/analysis/mol");
    let watcher = watch_auth_changes(&harness.events, harness.router.clone());

    harness.store.clear_session();
    harness.events.notify();

    let mut settled = false;
    for _ in 0..50 {
        if harness.router.current() == LOGIN_PATH {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(settled, "router did not react to the auth change");

    watcher.abort();
}

//! End-to-end tests for the control API
//!
//! The router is served on an ephemeral port; every remote collaborator is a
//! wiremock server.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use triad_control::api::{router, AppState};
use triad_control::config::{Config, ProviderEndpoints};

struct TestServer {
    base: String,
    http: reqwest::Client,
    state: Arc<AppState>,
}

impl TestServer {
    async fn start(orchestrator: &MockServer, gemini: &MockServer, openai: &MockServer) -> Self {
        let endpoints = ProviderEndpoints {
            gemini_base_url: gemini.uri(),
            openai_base_url: openai.uri(),
            request_timeout: Duration::from_secs(5),
            ..ProviderEndpoints::default()
        };
        let config = Config::new(&orchestrator.uri(), endpoints);
        let state = Arc::new(AppState::new(config).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            http: reqwest::Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(self.url(path)).send().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.http.post(self.url(path)).json(&body).send().await.unwrap()
    }

    /// Poll the conversation until no send is in flight.
    async fn settled_chat(&self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let chat: Value = self.get("/api/chat").await.json().await.unwrap();
                if chat["responding"] == false {
                    return chat;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("conversation never settled")
    }
}

async fn mock_servers() -> (MockServer, MockServer, MockServer) {
    (
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
    )
}

#[tokio::test]
async fn test_health_and_personas() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    let server = TestServer::start(&orchestrator, &gemini, &openai).await;

    let health: Value = server.get("/api/health").await.json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["orchestrator"], orchestrator.uri());
    assert_eq!(health["default_persona"], "LYRA");

    let personas: Value = server.get("/api/personas").await.json().await.unwrap();
    assert_eq!(personas.as_array().unwrap().len(), 9);
    assert_eq!(personas[0]["name"], "LYRA");

    let lyra: Value = server.get("/api/personas/lyra").await.json().await.unwrap();
    let html = lyra["bio_html"].as_str().unwrap();
    assert!(html.contains(r#"<span class="neon-chip">Gemini</span>"#));
    assert!(html.contains(r#"class="neon-callout p info""#));
    assert_eq!(lyra["blocks"][0]["kind"], "paragraph");

    let missing = server.get("/api/personas/nobody").await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_chat_flow_without_credentials() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    let server = TestServer::start(&orchestrator, &gemini, &openai).await;

    let empty = server.post("/api/chat/messages", json!({ "text": "   " })).await;
    assert_eq!(empty.status(), 400);

    let sent = server.post("/api/chat/messages", json!({ "text": "hello" })).await;
    assert_eq!(sent.status(), 202);
    let sent: Value = sent.json().await.unwrap();
    assert_eq!(sent["index"], 0);

    let chat = server.settled_chat().await;
    let responses = &chat["turns"][0]["responses"];
    assert_eq!(responses["gemini"]["state"], "unconfigured");
    assert_eq!(
        responses["openai"]["text"],
        "OpenAI API Key not provided. Please set it in the Custom Instructions panel."
    );
    assert_eq!(
        responses["abacus"]["text"],
        "Gemini API Key (used for Abacus simulation) not provided. Please set it in the Custom Instructions panel."
    );

    let bookmark: Value = server
        .post("/api/chat/turns/0/bookmark", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(bookmark["bookmarked"], true);

    let bookmarks: Value = server.get("/api/chat/bookmarks").await.json().await.unwrap();
    assert_eq!(bookmarks[0]["excerpt"], "hello");

    let vote: Value = server
        .post("/api/chat/turns/0/vote", json!({ "vote": "up" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(vote["vote"], "up");
    let vote: Value = server
        .post("/api/chat/turns/0/vote", json!({ "vote": "up" }))
        .await
        .json()
        .await
        .unwrap();
    assert!(vote["vote"].is_null());

    let copy: Value = server.get("/api/chat/turns/0/copy").await.json().await.unwrap();
    assert!(copy["text"].as_str().unwrap().starts_with("User: hello\n\n--- Gemini Response ---"));

    let out_of_range = server.get("/api/chat/turns/5/copy").await;
    assert_eq!(out_of_range.status(), 404);
}

#[tokio::test]
async fn test_credentials_enable_provider_calls() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "from gemini" }] } }]
        })))
        .expect(2)
        .mount(&gemini)
        .await;

    let server = TestServer::start(&orchestrator, &gemini, &openai).await;

    let status: Value = server
        .http
        .put(server.url("/api/credentials"))
        .json(&json!({ "gemini": "g-key" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({ "gemini": true, "openai": false }));

    server.post("/api/chat/messages", json!({ "text": "status?" })).await;
    let chat = server.settled_chat().await;
    let responses = &chat["turns"][0]["responses"];
    assert_eq!(responses["gemini"]["text"], "from gemini");
    assert_eq!(responses["abacus"]["text"], "from gemini");
    assert_eq!(responses["openai"]["state"], "unconfigured");
}

#[tokio::test]
async fn test_switch_persona_resets_history() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    let server = TestServer::start(&orchestrator, &gemini, &openai).await;

    server.post("/api/chat/messages", json!({ "text": "hi" })).await;
    server.settled_chat().await;

    let chat: Value = server
        .post("/api/chat/persona", json!({ "name": "dan" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(chat["persona"]["name"], "DAN");
    assert!(chat["turns"].as_array().unwrap().is_empty());

    let unknown = server.post("/api/chat/persona", json!({ "name": "nobody" })).await;
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_mission_submit_guard_and_start_failure() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    Mock::given(method("POST"))
        .and(path("/workflows/start"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "orchestrator offline" })),
        )
        .mount(&orchestrator)
        .await;

    let server = TestServer::start(&orchestrator, &gemini, &openai).await;
    let mut notices = server.state.notifier.subscribe();

    let rejected = server
        .post(
            "/api/mission",
            json!({ "objective": "ship", "agents": [], "llmStrategy": "TRIPLE_DYNAMIC" }),
        )
        .await;
    assert_eq!(rejected.status(), 400);
    let mission: Value = server.get("/api/mission").await.json().await.unwrap();
    assert_eq!(mission["status"], "idle");

    let failed = server
        .post(
            "/api/mission",
            json!({ "objective": "ship", "agents": ["LYRA"], "llmStrategy": "TRIPLE_DYNAMIC" }),
        )
        .await;
    assert_eq!(failed.status(), 502);
    let mission: Value = server.get("/api/mission").await.json().await.unwrap();
    assert_eq!(mission["status"], "failed");
    assert_eq!(notices.recv().await.unwrap().message, "API Error: orchestrator offline");
}

#[tokio::test]
async fn test_overtaken_mission_submit_conflicts() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    Mock::given(method("POST"))
        .and(path("/workflows/start"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "instanceId": "inst-slow" }))
                .set_delay(Duration::from_millis(300)),
        )
        .up_to_n_times(1)
        .mount(&orchestrator)
        .await;
    Mock::given(method("POST"))
        .and(path("/workflows/start"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "instanceId": "inst-fast" })),
        )
        .mount(&orchestrator)
        .await;

    let server = Arc::new(TestServer::start(&orchestrator, &gemini, &openai).await);
    let mission = json!({
        "objective": "ship",
        "agents": ["LYRA"],
        "llmStrategy": "TRIPLE_DYNAMIC"
    });

    let slow = tokio::spawn({
        let server = Arc::clone(&server);
        let mission = mission.clone();
        async move { server.post("/api/mission", mission).await.status() }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fast = server.post("/api/mission", mission).await;
    assert_eq!(fast.status(), 201);
    let fast: Value = fast.json().await.unwrap();
    assert_eq!(fast["instanceId"], "inst-fast");

    assert_eq!(slow.await.unwrap(), 409);
    let snapshot: Value = server.get("/api/mission").await.json().await.unwrap();
    assert_eq!(snapshot["instanceId"], "inst-fast");
}

#[tokio::test]
async fn test_replay_loads_draft() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    Mock::given(method("POST"))
        .and(path("/ledger/spas/rec-1/replay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "objective": "Rebuild the index",
            "agents": ["DAN", "STAN"],
            "llmStrategy": "OPENAI_PRIMARY"
        })))
        .mount(&orchestrator)
        .await;

    let server = TestServer::start(&orchestrator, &gemini, &openai).await;
    let replay = server.post("/api/ledger/rec-1/replay", json!({})).await;
    assert_eq!(replay.status(), 200);

    let mission: Value = server.get("/api/mission").await.json().await.unwrap();
    assert_eq!(mission["status"], "idle");
    assert_eq!(mission["draft"]["objective"], "Rebuild the index");
    assert_eq!(mission["draft"]["llmStrategy"], "OPENAI_PRIMARY");
    assert!(mission["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_failure_is_reported() {
    let (orchestrator, gemini, openai) = mock_servers().await;
    Mock::given(method("GET"))
        .and(path("/ledger/spas"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({})))
        .mount(&orchestrator)
        .await;

    let server = TestServer::start(&orchestrator, &gemini, &openai).await;
    let mut notices = server.state.notifier.subscribe();

    let response = server.get("/api/ledger").await;
    assert_eq!(response.status(), 502);
    let notice = notices.recv().await.unwrap();
    assert_eq!(
        notice.message,
        "Failed to load ledger: Failed to fetch ledger SPAs with status 500"
    );
}

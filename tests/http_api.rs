use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};

use bundlr::api::routes::{create_router, AppState};
use bundlr::policy::{PolicySources, RuleMatchCompiler, RuleMatchEvaluator};

async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Arc::new(RuleMatchCompiler::new()),
        Arc::new(RuleMatchEvaluator::new()),
        PolicySources::embedded(),
        Duration::from_secs(5),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn rule(role: &str, action: &str) -> Value {
    json!({
        "country": "ANY",
        "city": "ANY",
        "building": "ANY",
        "role": role,
        "device_type": "ANY",
        "action": action
    })
}

#[tokio::test]
async fn bundle_follows_rule_changes() {
    let (addr, _state) = spawn_server().await;
    let client = Client::new();
    let base = format!("http://{addr}");

    let created: Value = client
        .post(format!("{base}/v1/rules"))
        .json(&rule("guest", "deny"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let resp = client.get(format!("{base}/v1/bundle")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = resp.headers()[header::ETAG].to_str().unwrap().to_string();
    let bundle: Value = resp.json().await.unwrap();
    assert_eq!(bundle["data"]["rules"][0]["id"], id.as_str());

    let resp = client
        .get(format!("{base}/v1/bundle"))
        .header(header::IF_NONE_MATCH, &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

    let resp = client
        .patch(format!("{base}/v1/rules/{id}"))
        .json(&json!({"action": "allow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base}/v1/bundle"))
        .header(header::IF_NONE_MATCH, &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_ne!(resp.headers()[header::ETAG].to_str().unwrap(), etag);
}

#[tokio::test]
async fn replay_recorded_decision() {
    let (addr, state) = spawn_server().await;
    let client = Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/v1/rules"))
        .json(&rule("guest", "deny"))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/v1/logs"))
        .json(&json!([
            {"decision_id": "d1", "input": {"role": "guest", "country": "Norway"}},
            {"decision_id": "d2", "input": {"role": "admin", "country": "Norway"}}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let accepted: Value = resp.json().await.unwrap();
    assert_eq!(accepted["accepted"], 2);

    let logs: Vec<Value> = client
        .get(format!("{base}/v1/logs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);

    let result: Value = client
        .get(format!("{base}/v1/replay/d1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["allow"], false);
    assert_eq!(result["action"], "deny");

    let result: Value = client
        .post(format!("{base}/v1/replay/d1"))
        .json(&json!([rule("guest", "allow")]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["allow"], true);

    let resp = client
        .get(format!("{base}/v1/replay/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    assert_eq!(state.rules.len(), 1);
    assert_eq!(state.decisions.len(), 2);
}

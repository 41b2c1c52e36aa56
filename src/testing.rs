//! In-process device fakes shared by unit and router tests.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::adapters::tplink::{decrypt, encrypt};

/// In-process Kasa plug: relay state plus a schedule rule list.
#[derive(Default)]
pub struct FakePlugState {
    pub relay_state: u8,
    pub rules: Vec<Value>,
    pub next_rule: u32,
    pub requests: usize,
}

pub async fn start_fake_plug() -> (String, Arc<Mutex<FakePlugState>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state = Arc::new(Mutex::new(FakePlugState::default()));

    let shared = state.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let state = shared.clone();
            tokio::spawn(async move {
                let mut len = [0u8; 4];
                if stream.read_exact(&mut len).await.is_err() {
                    return;
                }
                let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
                stream.read_exact(&mut body).await.unwrap();
                let request: Value = serde_json::from_slice(&decrypt(&body)).unwrap();
                let reply = answer(&state, &request);
                let bytes = serde_json::to_vec(&reply).unwrap();
                stream.write_all(&encrypt(&bytes)).await.unwrap();
            });
        }
    });

    (addr, state)
}

fn answer(state: &Mutex<FakePlugState>, request: &Value) -> Value {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    let mut reply = Map::new();

    if let Some(system) = request.get("system") {
        if let Some(params) = system.get("set_relay_state") {
            state.relay_state = params["state"].as_u64().unwrap() as u8;
            reply.insert(
                "system".into(),
                json!({ "set_relay_state": { "err_code": 0 } }),
            );
        } else {
            reply.insert(
                "system".into(),
                json!({ "get_sysinfo": {
                    "err_code": 0,
                    "alias": "Christmas Tree",
                    "model": "HS103(US)",
                    "feature": "TIM",
                    "mac": "AA:BB:CC:DD:EE:FF",
                    "relay_state": state.relay_state,
                }}),
            );
        }
    }

    if let Some(schedule) = request.get("schedule") {
        if schedule.get("get_rules").is_some() {
            reply.insert(
                "schedule".into(),
                json!({ "get_rules": { "rule_list": state.rules, "enable": 1, "err_code": 0 } }),
            );
        } else if let Some(rule) = schedule.get("add_rule") {
            state.next_rule += 1;
            let id = format!("RULE{}", state.next_rule);
            let mut rule = rule.clone();
            rule["id"] = json!(id);
            state.rules.push(rule);
            reply.insert(
                "schedule".into(),
                json!({ "add_rule": { "id": id, "err_code": 0 },
                        "set_overall_enable": { "err_code": 0 } }),
            );
        } else if let Some(delete) = schedule.get("delete_rule") {
            let id = delete["id"].as_str().unwrap().to_string();
            let before = state.rules.len();
            state.rules.retain(|r| r["id"] != json!(id));
            let err_code = if state.rules.len() < before { 0 } else { -14 };
            reply.insert(
                "schedule".into(),
                json!({ "delete_rule": { "err_code": err_code, "err_msg": "entry not exist" } }),
            );
        }
    }

    Value::Object(reply)
}

/// An address nothing listens on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

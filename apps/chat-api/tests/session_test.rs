mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

use chatroom_common::{ChatMessage, SessionUser};

fn users(resp: &axum_test::TestResponse) -> Vec<String> {
    let body: serde_json::Value = resp.json();
    serde_json::from_value(body["users"].clone()).unwrap()
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
}

// ---------------------------------------------------------------------------
// POST /session/join
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_returns_current_members_in_join_order() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let room = common::unique_room();

    let resp = server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await;
    resp.assert_status_ok();
    assert_eq!(users(&resp), vec!["alice"]);

    let resp = server
        .post("/session/join")
        .json(&common::member_body(&room, "bob"))
        .await;
    resp.assert_status_ok();
    assert_eq!(users(&resp), vec!["alice", "bob"]);
}

#[tokio::test]
async fn join_twice_returns_same_members() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let room = common::unique_room();

    let first = server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await;
    let second = server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await;

    second.assert_status_ok();
    assert_eq!(users(&first), users(&second));

    let resp = server
        .post("/session/join")
        .json(&common::member_body(&room, "bob"))
        .await;
    assert_eq!(users(&resp), vec!["alice", "bob"]);
}

#[tokio::test]
async fn join_with_malformed_body_is_bad_request() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/session/join")
        .json(&serde_json::json!(["not", "an", "object"]))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn join_with_missing_fields_lists_each_field() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/session/join")
        .json(&serde_json::json!({ "room_id": "r1", "username": "  " }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["username", "user_id"]);
}

// ---------------------------------------------------------------------------
// POST /session/exit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_without_live_connection_is_bad_request() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let room = common::unique_room();

    server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await
        .assert_status_ok();

    let resp = server
        .post("/session/exit")
        .json(&common::member_body(&room, "alice"))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // Membership is untouched.
    let resp = server
        .post("/session/join")
        .json(&common::member_body(&room, "bob"))
        .await;
    assert_eq!(users(&resp), vec!["alice", "bob"]);
}

#[tokio::test]
async fn exit_with_missing_fields_is_validation_error() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/session/exit")
        .json(&serde_json::json!({}))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// GET /session/messages/{room_id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn messages_for_unknown_room_are_empty() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get(&format!("/session/messages/{}", common::unique_room())).await;

    resp.assert_status_ok();
    let messages: Vec<ChatMessage> = resp.json();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn messages_without_room_id_is_bad_request() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    server
        .get("/session/messages/")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/session/messages/%20")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn messages_skip_room_actions_and_keep_order() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let room = common::unique_room();
    let alice = SessionUser::new("alice", "id-alice");

    server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await
        .assert_status_ok();
    for content in ["one", "two", "three"] {
        state
            .sessions
            .save_message(&room, ChatMessage::new(alice.clone(), content))
            .await
            .unwrap();
    }

    let resp = server.get(&format!("/session/messages/{room}")).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    assert_eq!(body[0]["username"], "alice");
    assert_eq!(body[0]["user_id"], "id-alice");
    assert!(body[0]["created_at"].is_string());
}

#[tokio::test]
async fn messages_limit_is_clamped_and_validated() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let room = common::unique_room();
    let alice = SessionUser::new("alice", "id-alice");

    server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await
        .assert_status_ok();
    for content in ["one", "two"] {
        state
            .sessions
            .save_message(&room, ChatMessage::new(alice.clone(), content))
            .await
            .unwrap();
    }

    // A zero limit still scans the newest event.
    let resp = server.get(&format!("/session/messages/{room}?limit=0")).await;
    resp.assert_status_ok();
    let messages: Vec<ChatMessage> = resp.json();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "two");

    server
        .get(&format!("/session/messages/{room}?limit=lots"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn configured_window_above_limit_cap_is_honoured() {
    let state = common::test_state_with(|config| config.message_window = 200);
    let server = TestServer::new(common::app_for(&state)).unwrap();
    let room = common::unique_room();
    let alice = SessionUser::new("alice", "id-alice");

    server
        .post("/session/join")
        .json(&common::member_body(&room, "alice"))
        .await
        .assert_status_ok();
    for i in 0..150 {
        state
            .sessions
            .save_message(&room, ChatMessage::new(alice.clone(), format!("m{i}")))
            .await
            .unwrap();
    }

    // Without ?limit= the configured 200-event window applies unclamped.
    let messages: Vec<ChatMessage> = server.get(&format!("/session/messages/{room}")).await.json();
    assert_eq!(messages.len(), 150);
    assert_eq!(messages[0].content, "m0");

    // A caller-supplied limit is still capped.
    let messages: Vec<ChatMessage> = server
        .get(&format!("/session/messages/{room}?limit=500"))
        .await
        .json();
    assert_eq!(messages.len(), 100);
    assert_eq!(messages[0].content, "m50");
}

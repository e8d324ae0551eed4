//! Integration tests for `retro chat` against a mock backend.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn temp_retro_home() -> TempDir {
    TempDir::new().expect("create temp retro home")
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

async fn mount_agents(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/agents"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"agents": ["yapper", "definer"]})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chat_sends_and_persists() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_retro_home();
    let server = MockServer::start().await;
    mount_agents(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({
            "message": "hello",
            "active_agent": "definer",
            "enabled_agents": ["definer"],
            "model_name": "gpt-4o-mini",
            "session_id": "ada::Study"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"active_agent": "definer", "response": "hi there"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .env("RETRO_API_BASE_URL", server.uri())
        .args(["chat", "--user", "ada", "--room", "Study", "--agent", "definer"])
        .write_stdin("hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("No previous messages in Study."))
        .stdout(predicate::str::contains("definer: hi there"));

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .args(["rooms", "show", "Study", "--user", "ada"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user: ada: hello"))
        .stdout(predicate::str::contains("assistant: definer: hi there"));
}

#[tokio::test]
async fn test_chat_backend_error_keeps_user_line() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_retro_home();
    let server = MockServer::start().await;
    mount_agents(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent crashed"))
        .mount(&server)
        .await;

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .env("RETRO_API_BASE_URL", server.uri())
        .args(["chat", "--user", "ada"])
        .write_stdin("hello\n/quit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Error: agent crashed"));

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .args(["rooms", "show", "--user", "ada", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"text\": \"ada: hello\""))
        .stdout(predicate::str::contains("assistant").not());
}

#[tokio::test]
async fn test_chat_room_commands() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_retro_home();
    let server = MockServer::start().await;
    mount_agents(&server).await;

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .env("RETRO_API_BASE_URL", server.uri())
        .args(["chat", "--user", "ada"])
        .write_stdin("/create Lab\n/create Lab\n/rooms\n/enter Nowhere\n/agent\n/dance\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Room: Lab"))
        .stdout(predicate::str::contains("* Lab"))
        .stdout(predicate::str::contains("* yapper"))
        .stderr(predicate::str::contains("Room already exists: Lab"))
        .stderr(predicate::str::contains("Room does not exist for this user: Nowhere"))
        .stderr(predicate::str::contains("Unknown command /dance"));
}

#[tokio::test]
async fn test_ephemeral_chat_writes_nothing() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_retro_home();
    let server = MockServer::start().await;
    mount_agents(&server).await;

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .env("RETRO_API_BASE_URL", server.uri())
        .args(["chat", "--user", "ada", "--ephemeral"])
        .write_stdin("/create Scratch\n:q\n")
        .assert()
        .success();

    assert!(!home.path().join("data").exists());
}

#[test]
fn test_chat_rejects_unknown_bucket() {
    let home = temp_retro_home();

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", home.path())
        .args(["chat", "--user", "ada", "--save-to", "attic"])
        .write_stdin(":q\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown save bucket attic"));
}

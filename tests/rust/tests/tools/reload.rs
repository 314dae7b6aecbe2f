use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{base_config, get_record_tool, TestGateway};

async fn tool_names(gateway: &TestGateway, session_id: &str) -> Vec<String> {
    let response = gateway.call(session_id, None, 2, "tools/list", json!({})).await;
    response.json()["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

fn list_notes_tool() -> serde_json::Value {
    json!({"name": "list_notes", "request": {"method": "GET", "path": "/notes"}})
}

#[tokio::test]
async fn test_new_session_sees_tools_added_after_startup() {
    let mut config = base_config("http://127.0.0.1:9");
    config["sessions"] = json!({"reload_tools_per_session": true});
    let gateway = TestGateway::start(config, &[("records.json", get_record_tool())]).await;

    let first = gateway.initialize(None).await;
    assert_eq!(tool_names(&gateway, &first).await, vec!["get_record"]);

    std::fs::write(
        gateway.tools_dir.path().join("notes.json"),
        list_notes_tool().to_string(),
    )
    .unwrap();

    let second = gateway.initialize(None).await;
    assert_eq!(
        tool_names(&gateway, &second).await,
        vec!["get_record", "list_notes"]
    );
    // Sessions keep the tool set they started with
    assert_eq!(tool_names(&gateway, &first).await, vec!["get_record"]);
}

#[tokio::test]
async fn test_shared_tools_ignore_later_changes() {
    let gateway = TestGateway::start(
        base_config("http://127.0.0.1:9"),
        &[("records.json", get_record_tool())],
    )
    .await;

    std::fs::write(
        gateway.tools_dir.path().join("notes.json"),
        list_notes_tool().to_string(),
    )
    .unwrap();

    let session_id = gateway.initialize(None).await;
    assert_eq!(tool_names(&gateway, &session_id).await, vec!["get_record"]);
}

use pretty_assertions::assert_eq;
use restgate_core::{load_tools, GatewayConfig, ToolFactories, ToolLoadError};
use serde_json::json;
use tempfile::TempDir;
use tests::get_record_tool;

fn config() -> GatewayConfig {
    serde_json::from_value(json!({"backend": {"base_url": "http://127.0.0.1:9"}})).unwrap()
}

fn names(tools: &[restgate_core::ToolDefinition]) -> Vec<&str> {
    let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_missing_directory_yields_no_tools() {
    let dir = TempDir::new().unwrap();
    let tools = load_tools(&config(), &dir.path().join("absent"), &ToolFactories::default())
        .await
        .unwrap();
    assert!(tools.is_empty());
}

#[tokio::test]
async fn test_one_bad_file_does_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a_records.json"), get_record_tool().to_string()).unwrap();
    std::fs::write(dir.path().join("b_broken.json"), "{ not json").unwrap();
    std::fs::write(
        dir.path().join("c_notes.json"),
        json!([
            {"name": "list_notes", "request": {"method": "GET", "path": "/notes"}},
            {"name": "no_request_block"},
            {"name": "mystery", "kind": "grpc"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

    let tools = load_tools(&config(), dir.path(), &ToolFactories::default())
        .await
        .unwrap();
    assert_eq!(names(&tools), vec!["get_record", "list_notes"]);
}

#[tokio::test]
async fn test_invalid_input_schema_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tools.json"),
        json!([
            {"name": "bad_schema", "inputSchema": {"type": "no-such-type"},
             "request": {"path": "/x"}},
            {"name": "good", "request": {"path": "/y"}}
        ])
        .to_string(),
    )
    .unwrap();

    let tools = load_tools(&config(), dir.path(), &ToolFactories::default())
        .await
        .unwrap();
    assert_eq!(names(&tools), vec!["good"]);
}

#[tokio::test]
async fn test_unreadable_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-directory");
    std::fs::write(&file, "").unwrap();

    let err = load_tools(&config(), &file, &ToolFactories::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolLoadError::ReadDir { .. }));
}

/// Tests for the startup wiring shared by the stdio and HTTP binaries
use fitness_planner::config::Config;
use fitness_planner_mcp::log_filter;

#[test]
fn test_log_env_priority() {
    let filter = log_filter(Some("warn".into()), Some("debug".into()));
    assert!(filter.starts_with("warn,"));
}

#[test]
fn test_blank_log_level_falls_back_to_info() {
    assert_eq!(
        log_filter(Some("  ".into()), None),
        "info,rmcp=warn,serve_inner=warn"
    );
}

#[test]
fn test_env_filter_creation() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let combined = log_filter(Some(level.into()), None);
        assert!(combined.contains("rmcp=warn"));
        assert!(tracing_subscriber::EnvFilter::try_new(combined).is_ok());
    }
}

#[test]
fn test_env_filter_fallback() {
    let env_filter = tracing_subscriber::EnvFilter::try_new("invalid[[[filter")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    assert!(!format!("{:?}", env_filter).is_empty());
}

#[tokio::test]
async fn test_handler_initialization() {
    use std::sync::Arc;

    let config = Config::from_env_with(|_| None).expect("config");
    let manager = config.open_manager().await.expect("manager");
    let handler = fitness_planner_mcp::FitnessMcpHandler::new(Arc::new(manager));

    assert_eq!(handler.tool_count(), 14);
    assert_eq!(handler.prompt_count(), 2);
}

#[tokio::test]
async fn test_seed_file_replaces_default_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seed = dir.path().join("seed.json");
    std::fs::write(
        &seed,
        r#"[{"id": "club-10k", "name": "Club 10K", "type": "run", "date": "2026-09-20"}]"#,
    )
    .expect("write seed");

    let seed_str = seed.to_string_lossy().into_owned();
    let config = Config::from_env_with(|k| match k {
        "FITNESS_PLANNER_SEED_PATH" => Some(seed_str.clone()),
        _ => None,
    })
    .expect("config");
    let manager = config.open_manager().await.expect("manager");
    let events = manager.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "club-10k");
}

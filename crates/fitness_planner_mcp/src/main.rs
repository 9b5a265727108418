use std::sync::Arc;

use fitness_planner::config::Config;
use fitness_planner_mcp::{FitnessMcpHandler, log_filter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_env = log_filter(
        std::env::var("FITNESS_PLANNER_LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("fitness_planner_mcp: log filter: {}", log_env);

    let config = Config::from_env()?;
    let manager = config.open_manager().await?;
    let handler = FitnessMcpHandler::new(Arc::new(manager));

    tracing::info!(
        "fitness_planner_mcp: registered {} tools and {} prompts",
        handler.tool_count(),
        handler.prompt_count()
    );

    tracing::info!("fitness_planner_mcp: starting stdio MCP server...");

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = rmcp::serve_server(handler, transport).await?;

    tracing::info!("fitness_planner_mcp: service initialized as server");

    server.waiting().await?;

    Ok(())
}

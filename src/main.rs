use anyhow::{Context, Result};
use clap::Parser;
use mcp_github_milestones::client::MilestonesClient;
use mcp_github_milestones::{config, server};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::EnvFilter;

/// MCP server for GitHub milestones: list, create, update, and delete them from an LLM
#[derive(Parser)]
#[command(name = "mcp-github-milestones", version, about)]
struct Cli {
    /// GitHub personal access token.
    /// Can also be set via GITHUB_TOKEN or GITHUB_PERSONAL_ACCESS_TOKEN.
    #[arg(long)]
    token: Option<String>,

    /// Read GitHub token from this environment variable before the defaults.
    #[arg(long = "token-env")]
    token_env: Option<String>,

    /// GitHub API base URL (for GitHub Enterprise Server)
    #[arg(long = "api-url", env = "GITHUB_API_URL")]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (token, source) =
        config::resolve_token(cli.token, cli.token_env.as_deref(), |name| {
            std::env::var(name).ok()
        })?;
    tracing::info!(source = %source, "Resolved GitHub token");

    let client = MilestonesClient::new(token, cli.api_url.as_deref())?;

    tracing::info!(
        api_url = cli.api_url.as_deref().unwrap_or("https://api.github.com"),
        "Starting github-milestones MCP server on stdio"
    );

    let service = server::McpMilestonesServer::new(client);
    let running = service
        .serve(stdio())
        .await
        .context("Server failed to start")?;
    running.waiting().await?;

    Ok(())
}

//! MCP server for Confluence form automation.
//!
//! Credentials come from flags or the `CONFLUENCE_*` environment variables;
//! the process refuses to start without them.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod convert;
mod error;
mod gateway;
mod markup;
mod server;
mod session;
mod tools;

use gateway::{ConfluenceGateway, Credentials};
use server::McpServer;
use session::McpSession;

/// MCP server for Confluence form automation.
///
/// Exposes form discovery and completion as MCP tools for AI agents.
/// Communicates via JSON-RPC 2.0 over stdin/stdout.
#[derive(Parser)]
#[command(name = "confluence-form-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Confluence site base URL, e.g. https://your-domain.atlassian.net/wiki.
    #[arg(long, env = "CONFLUENCE_BASE_URL", value_name = "URL")]
    base_url: String,

    /// Account email used for Basic auth.
    #[arg(long, env = "CONFLUENCE_USERNAME", value_name = "EMAIL")]
    username: String,

    /// API token used for Basic auth.
    #[arg(long, env = "CONFLUENCE_API_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    api_token: String,

    /// Upper bound in seconds on each Confluence call.
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    timeout_secs: u64,

    /// Enable debug logging to stderr.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // Set up logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive("confluence_form_mcp=debug".parse().unwrap()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let credentials = Credentials {
        base_url: args.base_url,
        username: args.username,
        api_token: args.api_token,
    };

    let gateway =
        match ConfluenceGateway::new(&credentials, Duration::from_secs(args.timeout_secs)) {
            Ok(gateway) => gateway,
            Err(e) => {
                eprintln!("Error: Failed to initialize Confluence gateway: {}", e);
                std::process::exit(1);
            }
        };

    // Create session and server
    let session = McpSession::new(gateway);
    let mut server = McpServer::new(session);

    // Run the server
    if let Err(e) = server.run().await {
        eprintln!("Error: Server error: {}", e);
        std::process::exit(1);
    }
}

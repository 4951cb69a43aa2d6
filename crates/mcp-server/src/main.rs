//! Helpdesk MCP Server
//!
//! Bounded access to a helpdesk (tickets, users, organizations, knowledge base) for AI agents via
//! the MCP protocol.
//!
//! ## Configuration
//!
//! - `HELPDESK_SNAPSHOT_PATH` - JSON export the tools read from
//! - `HELPDESK_MAX_RESPONSE_LENGTH` - default response budget in bytes (2000)
//! - `HELPDESK_DEFAULT_LIMIT` / `HELPDESK_MAX_LIMIT` - page sizes (10 / 20)
//! - `HELPDESK_CATEGORY_RULES` - category rule table replacing the built-in one
//! - `HELPDESK_KB_TTL_SECS` - knowledge base cache lifetime (3600)
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "helpdesk": {
//!       "command": "helpdesk-mcp",
//!       "env": { "HELPDESK_SNAPSHOT_PATH": "/path/to/helpdesk.json" }
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use helpdesk_mcp::{HelpdeskService, ServerConfig};
use rmcp::transport::stdio;
use rmcp::ServiceExt;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting helpdesk MCP server");

    let config = ServerConfig::from_env();
    let service = HelpdeskService::from_config(&config).await?;
    let server = service.serve(stdio()).await?;

    server.waiting().await?;

    log::info!("Helpdesk MCP server stopped");
    Ok(())
}

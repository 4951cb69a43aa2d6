//! Helpdesk MCP server
//!
//! Exposes tickets, comments, audits, users, organizations, satisfaction ratings and the help
//! center knowledge base as MCP tools. Every payload goes through `helpdesk-shaping`, so tool
//! responses stay within a byte budget while summaries still describe the whole result set.
//! Built-in prompts and a knowledge base resource are served alongside the tools.

pub mod cache;
pub mod config;
pub mod prompts;
pub mod source;
pub mod tools;

pub use cache::{Clock, SystemClock, TtlCache};
pub use config::ServerConfig;
pub use prompts::{PromptCatalog, PromptError};
pub use source::{Snapshot, SnapshotSource, SortOrder, SourceError, TicketRelation, TicketSource};
pub use tools::{HelpdeskService, KNOWLEDGE_BASE_URI};

//! MCP tools for the helpdesk
//!
//! Every tool fetches from the [`TicketSource`], projects the records and renders the result
//! through the shaping engine, so no response exceeds its `max_response_size`. Failures come back
//! as `Error: ...` tool text rather than protocol errors.
//!
//! The service also serves the built-in prompts and the knowledge base as a resource.

use anyhow::{Context as AnyhowContext, Result};
use helpdesk_shaping::{
    page_slice, resume_after, summarize, Categorizer, Paginator, Projection, RecordKind,
    ResponseAssembler, ShapingConfig, SummaryBuilder, TruncateRequest,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, GetPromptRequestParam, GetPromptResult, Implementation,
    ListPromptsResult, ListResourcesResult, PaginatedRequestParam, RawResource,
    ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents, ServerCapabilities,
    ServerInfo,
};
use rmcp::schemars;
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::ServerConfig;
use crate::prompts::PromptCatalog;
use crate::source::{SnapshotSource, SortOrder, TicketRelation, TicketSource};

/// Upper bound on satisfaction ratings fetched per call.
const RATINGS_FETCH_LIMIT: usize = 100;

pub const KNOWLEDGE_BASE_URI: &str = "helpdesk://knowledge-base";

/// Helpdesk MCP Service
#[derive(Clone)]
pub struct HelpdeskService {
    source: Arc<dyn TicketSource>,
    assembler: ResponseAssembler,
    categorizer: Arc<Categorizer>,
    kb_cache: Arc<TtlCache<Map<String, Value>>>,
    prompts: Arc<PromptCatalog>,
    tool_router: ToolRouter<Self>,
}

impl HelpdeskService {
    pub fn new(source: Arc<dyn TicketSource>, config: &ServerConfig) -> Self {
        Self {
            source,
            assembler: ResponseAssembler::new(config.shaping.clone()),
            categorizer: Arc::new(config.categorizer()),
            kb_cache: Arc::new(TtlCache::new(config.kb_ttl)),
            prompts: Arc::new(PromptCatalog::builtin()),
            tool_router: Self::tool_router(),
        }
    }

    /// Service over the configured snapshot, or over an empty helpdesk when none is set.
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let source = match &config.snapshot_path {
            Some(path) => SnapshotSource::load(path)
                .await
                .with_context(|| format!("Failed to open helpdesk snapshot {}", path.display()))?,
            None => {
                log::warn!("HELPDESK_SNAPSHOT_PATH is not set; serving an empty helpdesk");
                SnapshotSource::empty()
            }
        };
        Ok(Self::new(Arc::new(source), config))
    }

    fn shaping(&self) -> &ShapingConfig {
        self.assembler.config()
    }

    fn knowledge_base_resource() -> Resource {
        let mut raw = RawResource::new(KNOWLEDGE_BASE_URI, "Helpdesk Knowledge Base");
        raw.description = Some("Help center sections with their articles".to_string());
        raw.mime_type = Some("application/json".to_string());
        raw.no_annotation()
    }

    fn prompt_result(
        &self,
        request: &GetPromptRequestParam,
    ) -> Result<GetPromptResult, McpError> {
        self.prompts
            .render(&request.name, request.arguments.as_ref())
            .map_err(|err| {
                log::warn!("prompt '{}' failed: {err}", request.name);
                McpError::invalid_params(err.to_string(), None)
            })
    }

    async fn resource_contents(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        if uri != KNOWLEDGE_BASE_URI {
            log::warn!("unknown resource requested: {uri}");
            return Err(McpError::resource_not_found(
                format!("Unknown resource: {uri}"),
                None,
            ));
        }
        let kb = self
            .knowledge_base(false)
            .await
            .map_err(|err| McpError::internal_error(format!("{err:#}"), None))?;
        let sections = kb.len();
        let total_articles: usize = kb
            .values()
            .filter_map(|section| section.get("articles").and_then(Value::as_array))
            .map(Vec::len)
            .sum();
        let document = json!({
            "knowledge_base": kb,
            "metadata": {"sections": sections, "total_articles": total_articles},
        });
        let text = serde_json::to_string_pretty(&document)
            .map_err(|err| McpError::internal_error(err.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}

#[tool_handler]
impl ServerHandler for HelpdeskService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Helpdesk access for AI agents with bounded responses. Start with 'search_tickets' (use summary_mode for an overview), follow 'next_cursor' to page, and use 'get_ticket' / 'get_ticket_comments' for detail. Every response stays under max_response_size; summaries always cover the full result set.".into()),
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult::with_all_items(self.prompts.list()))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompt_result(&request)
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(vec![
            Self::knowledge_base_resource(),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.resource_contents(&request.uri).await
    }
}

// ============================================================================
// Tool Input Schemas
// ============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SearchTicketsRequest {
    /// Search query, e.g. `status:open priority:high refund`
    #[schemars(description = "Query with field:value filters and free-text terms")]
    pub query: String,

    #[schemars(description = "Field to sort by (default: created_at)")]
    pub sort_by: Option<String>,

    #[schemars(description = "Sort order: asc or desc (default: desc)")]
    pub sort_order: Option<SortOrder>,

    #[schemars(description = "Compact records (default: true)")]
    pub compact: Option<bool>,

    #[schemars(description = "Maximum tickets per page (1-20, default: 10)")]
    pub limit: Option<usize>,

    #[schemars(description = "Resume after this ticket id (next_cursor of a previous page)")]
    pub cursor: Option<String>,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,

    #[schemars(description = "Return only counts and distributions, no tickets")]
    pub summary_mode: Option<bool>,

    #[schemars(description = "Tag each ticket with categories and add a category distribution")]
    pub categorize: Option<bool>,

    #[schemars(description = "Force the full description in (true) or out (false) of each ticket")]
    pub include_description: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetTicketRequest {
    #[schemars(description = "Ticket id")]
    pub ticket_id: u64,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TicketThreadRequest {
    #[schemars(description = "Ticket id")]
    pub ticket_id: u64,

    #[schemars(description = "Compact records (default: false)")]
    pub compact: Option<bool>,

    #[schemars(description = "Resume after this id (next_cursor of a previous page)")]
    pub cursor: Option<String>,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UserTicketsRequest {
    #[schemars(description = "User id")]
    pub user_id: u64,

    #[schemars(description = "requested (default), assigned or ccd")]
    pub relation: Option<TicketRelation>,

    #[serde(flatten)]
    pub listing: ListingRequest,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OrganizationTicketsRequest {
    #[schemars(description = "Organization id")]
    pub organization_id: u64,

    #[serde(flatten)]
    pub listing: ListingRequest,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchUsersRequest {
    #[schemars(description = "Name or email fragment, or field:value filters such as role:agent")]
    pub query: String,

    #[serde(flatten)]
    pub listing: ListingRequest,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListingRequest {
    #[schemars(description = "Compact records (default: true)")]
    pub compact: Option<bool>,

    #[schemars(description = "Maximum records per page (1-20, default: 10)")]
    pub limit: Option<usize>,

    #[schemars(description = "Resume after this id (next_cursor of a previous page)")]
    pub cursor: Option<String>,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct TicketCountsRequest {
    #[schemars(description = "Optional query restricting the counted tickets")]
    pub query: Option<String>,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetUserRequest {
    #[schemars(description = "User id")]
    pub user_id: u64,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateCommentRequest {
    #[schemars(description = "Ticket to comment on")]
    pub ticket_id: u64,

    #[schemars(description = "Comment text")]
    pub comment: String,

    #[schemars(description = "Visible to the requester (default: true)")]
    pub public: Option<bool>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct CategorizeTicketsRequest {
    #[schemars(description = "Query selecting the tickets to categorize")]
    pub query: String,

    #[serde(flatten)]
    pub listing: ListingRequest,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct KnowledgeBaseRequest {
    #[schemars(description = "Only this section (by name)")]
    pub section: Option<String>,

    #[schemars(description = "Drop the cached copy and reload")]
    pub refresh: Option<bool>,

    #[schemars(description = "Response budget in bytes (default: 2000)")]
    pub max_response_size: Option<usize>,
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl HelpdeskService {
    #[tool(description = "Search tickets. Returns a page of compact tickets with pagination (follow next_cursor) and a summary of status/priority over all matches. Use summary_mode for counts only.")]
    pub async fn search_tickets(
        &self,
        Parameters(request): Parameters<SearchTicketsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.search_tickets_text(request).await))
    }

    #[tool(description = "Get one ticket with its full description, requester, assignee and tags.")]
    pub async fn get_ticket(
        &self,
        Parameters(request): Parameters<GetTicketRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.get_ticket_text(request).await))
    }

    #[tool(description = "Get the comments of a ticket, oldest first. Long threads are paginated; pass next_cursor to continue.")]
    pub async fn get_ticket_comments(
        &self,
        Parameters(request): Parameters<TicketThreadRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.thread_text(RecordKind::Comment, request).await))
    }

    #[tool(description = "Get the audit trail of a ticket (field changes and the channel they came from).")]
    pub async fn get_ticket_audits(
        &self,
        Parameters(request): Parameters<TicketThreadRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.thread_text(RecordKind::Audit, request).await))
    }

    #[tool(description = "Add a comment to an existing ticket. Public by default; pass public=false for an internal note.")]
    pub async fn create_ticket_comment(
        &self,
        Parameters(request): Parameters<CreateCommentRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.create_comment_text(request).await))
    }

    #[tool(description = "Get one user with name, email, role and organization.")]
    pub async fn get_user_by_id(
        &self,
        Parameters(request): Parameters<GetUserRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.get_user_text(request).await))
    }

    #[tool(description = "List tickets a user requested, is assigned to, or is CC'd on.")]
    pub async fn get_user_tickets(
        &self,
        Parameters(request): Parameters<UserTicketsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.user_tickets_text(request).await))
    }

    #[tool(description = "List the tickets of an organization.")]
    pub async fn get_organization_tickets(
        &self,
        Parameters(request): Parameters<OrganizationTicketsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.organization_tickets_text(request).await))
    }

    #[tool(description = "Search users by name, email or field:value filters. The summary includes the role distribution.")]
    pub async fn search_users(
        &self,
        Parameters(request): Parameters<SearchUsersRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.search_users_text(request).await))
    }

    #[tool(description = "List organizations.")]
    pub async fn list_organizations(
        &self,
        Parameters(request): Parameters<ListingRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.organizations_text(request).await))
    }

    #[tool(description = "Get recent customer satisfaction ratings with the score distribution.")]
    pub async fn get_satisfaction_ratings(
        &self,
        Parameters(request): Parameters<ListingRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.ratings_text(request).await))
    }

    #[tool(description = "Count tickets by status and priority, optionally restricted by a query.")]
    pub async fn get_ticket_counts(
        &self,
        Parameters(request): Parameters<TicketCountsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.ticket_counts_text(request).await))
    }

    #[tool(description = "Categorize matching tickets (billing, technical, account, ...) with auxiliary tags such as urgent_language, plus the category distribution over all matches.")]
    pub async fn categorize_tickets(
        &self,
        Parameters(request): Parameters<CategorizeTicketsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.categorize_text(request).await))
    }

    #[tool(description = "Get the help center knowledge base: sections with article counts and article titles. Cached for an hour.")]
    pub async fn get_knowledge_base(
        &self,
        Parameters(request): Parameters<KnowledgeBaseRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(self.knowledge_base_text(request).await))
    }
}

/// `include` forces the raw description in, otherwise it is removed.
fn set_description(ticket: &mut Value, raw: &Value, include: bool) {
    let Value::Object(fields) = ticket else {
        return;
    };
    if include {
        let description = raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        fields.insert("description".to_string(), description.into());
    } else {
        fields.remove("description");
    }
}

fn respond(result: Result<String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(err) => {
            log::warn!("tool call failed: {err:#}");
            CallToolResult::error(vec![Content::text(format!("Error: {err:#}"))])
        }
    }
}

/// Slice of a record list that follows the cursor.
///
/// The candidate set is what follows the resume point, so `total_count` and the summary describe
/// the records still ahead of the caller.
struct Window<'r> {
    candidates: &'r [Value],
    items: &'r [Value],
    offset: usize,
}

impl HelpdeskService {
    fn window<'r>(&self, records: &'r [Value], listing: &ListingRequest) -> Result<Window<'r>> {
        let limit = self.shaping().clamp_limit(listing.limit);
        let cursor = listing
            .cursor
            .as_deref()
            .map(str::trim)
            .filter(|cursor| !cursor.is_empty());

        let candidates = match cursor {
            Some(cursor) => resume_after(records, cursor)?,
            None => records,
        };
        let offset = records.len() - candidates.len();

        Ok(Window {
            candidates,
            items: page_slice(candidates, 1, limit),
            offset,
        })
    }

    /// Greedy page of `projected` under `key`, with `summary` describing every candidate.
    fn render_page(
        &self,
        key: &str,
        projected: Vec<Value>,
        window: &Window<'_>,
        mut base: Map<String, Value>,
        summary: Map<String, Value>,
        max_response_size: Option<usize>,
    ) -> String {
        let max_bytes = max_response_size.unwrap_or(self.shaping().max_response_length);
        if window.offset > 0 {
            base.insert("offset".to_string(), window.offset.into());
        }
        base.insert(key.to_string(), Value::Array(projected));
        let response = Value::Object(base);

        let request = TruncateRequest::new(key, max_bytes)
            .known_total(window.candidates.len())
            .summary(summary);
        match Paginator::new(self.shaping()).truncate(&response, request) {
            Some(envelope) => envelope.render(),
            None => self.assembler.shape(&response, Some(max_bytes)).into_text(),
        }
    }

    fn listing(
        &self,
        kind: RecordKind,
        records: &[Value],
        base: Map<String, Value>,
        listing: &ListingRequest,
    ) -> Result<String> {
        let window = self.window(records, listing)?;
        let projection = Projection::from_compact_flag(listing.compact.unwrap_or(true));
        let projected = kind.project_all(window.items, projection);
        let summary = summarize(window.candidates);
        Ok(self.render_page(
            kind.collection_key(),
            projected,
            &window,
            base,
            summary,
            listing.max_response_size,
        ))
    }

    fn categorized(&self, ticket: &Value, projection: Projection) -> Value {
        let mut projected = RecordKind::Ticket.project(ticket, projection);
        let categorization = self.categorizer.categorize(ticket);
        if let Value::Object(fields) = &mut projected {
            fields.insert("categories".to_string(), categorization.categories.into());
            fields.insert(
                "auxiliary_tags".to_string(),
                categorization.auxiliary_tags.into(),
            );
        }
        projected
    }

    async fn search_tickets_text(&self, request: SearchTicketsRequest) -> Result<String> {
        let tickets = self
            .source
            .search_tickets(
                &request.query,
                request.sort_by.as_deref(),
                request.sort_order.unwrap_or_default(),
            )
            .await
            .with_context(|| format!("Failed to search tickets with query '{}'", request.query))?;

        let listing = ListingRequest {
            compact: request.compact,
            limit: request.limit,
            cursor: request.cursor,
            max_response_size: request.max_response_size,
        };
        let window = self.window(&tickets, &listing)?;

        if request.summary_mode.unwrap_or(false) {
            let summary = SummaryBuilder::with_categories(&self.categorizer)
                .summarize(window.candidates);
            let overview = json!({
                "query": request.query,
                "total_count": window.candidates.len(),
                "summary": summary,
            });
            return Ok(self
                .assembler
                .shape(&overview, request.max_response_size)
                .into_text());
        }

        let categorize = request.categorize.unwrap_or(false);
        let projection = Projection::from_compact_flag(listing.compact.unwrap_or(true));
        let (mut projected, summary): (Vec<Value>, Map<String, Value>) = if categorize {
            (
                window
                    .items
                    .iter()
                    .map(|ticket| self.categorized(ticket, projection))
                    .collect(),
                SummaryBuilder::with_categories(&self.categorizer).summarize(window.candidates),
            )
        } else {
            (
                RecordKind::Ticket.project_all(window.items, projection),
                summarize(window.candidates),
            )
        };

        if let Some(include) = request.include_description {
            for (ticket, raw) in projected.iter_mut().zip(window.items) {
                set_description(ticket, raw, include);
            }
        }

        let mut base = Map::new();
        base.insert("query".to_string(), request.query.into());
        Ok(self.render_page(
            "tickets",
            projected,
            &window,
            base,
            summary,
            listing.max_response_size,
        ))
    }

    async fn get_ticket_text(&self, request: GetTicketRequest) -> Result<String> {
        let ticket = self
            .source
            .get_ticket(request.ticket_id)
            .await
            .with_context(|| format!("Failed to get ticket {}", request.ticket_id))?;
        let projected = RecordKind::Ticket.project(&ticket, Projection::Full);
        Ok(self
            .assembler
            .shape(&projected, request.max_response_size)
            .into_text())
    }

    async fn thread_text(&self, kind: RecordKind, request: TicketThreadRequest) -> Result<String> {
        let ticket_id = request.ticket_id;
        let records = match kind {
            RecordKind::Audit => self.source.ticket_audits(ticket_id).await,
            _ => self.source.ticket_comments(ticket_id).await,
        }
        .with_context(|| {
            format!(
                "Failed to get {} for ticket {ticket_id}",
                kind.collection_key()
            )
        })?;

        let projection = Projection::from_compact_flag(request.compact.unwrap_or(false));
        let mut thread = Map::new();
        thread.insert("ticket_id".to_string(), ticket_id.into());
        thread.insert(
            kind.collection_key().to_string(),
            Value::Array(kind.project_all(&records, projection)),
        );
        let data = Value::Object(thread);

        let cursor = request
            .cursor
            .as_deref()
            .map(str::trim)
            .filter(|cursor| !cursor.is_empty());
        let shaped = match cursor {
            Some(cursor) => self
                .assembler
                .shape_after(&data, cursor, request.max_response_size)?,
            None => self.assembler.shape(&data, request.max_response_size),
        };
        Ok(shaped.into_text())
    }

    async fn user_tickets_text(&self, request: UserTicketsRequest) -> Result<String> {
        let relation = request.relation.unwrap_or_default();
        let tickets = self
            .source
            .user_tickets(request.user_id, relation)
            .await
            .with_context(|| format!("Failed to get tickets for user {}", request.user_id))?;

        let mut base = Map::new();
        base.insert("user_id".to_string(), request.user_id.into());
        base.insert("relation".to_string(), relation.as_str().into());
        self.listing(RecordKind::Ticket, &tickets, base, &request.listing)
    }

    async fn organization_tickets_text(
        &self,
        request: OrganizationTicketsRequest,
    ) -> Result<String> {
        let org_id = request.organization_id;
        let tickets = self
            .source
            .organization_tickets(org_id)
            .await
            .with_context(|| format!("Failed to get tickets for organization {org_id}"))?;

        let mut base = Map::new();
        base.insert("organization_id".to_string(), org_id.into());
        self.listing(RecordKind::Ticket, &tickets, base, &request.listing)
    }

    async fn search_users_text(&self, request: SearchUsersRequest) -> Result<String> {
        let users = self
            .source
            .search_users(&request.query)
            .await
            .with_context(|| format!("Failed to search users with query '{}'", request.query))?;

        let mut base = Map::new();
        base.insert("query".to_string(), request.query.into());
        self.listing(RecordKind::User, &users, base, &request.listing)
    }

    async fn organizations_text(&self, request: ListingRequest) -> Result<String> {
        let organizations = self
            .source
            .organizations()
            .await
            .context("Failed to list organizations")?;
        self.listing(RecordKind::Organization, &organizations, Map::new(), &request)
    }

    async fn ratings_text(&self, request: ListingRequest) -> Result<String> {
        let ratings = self
            .source
            .satisfaction_ratings(RATINGS_FETCH_LIMIT)
            .await
            .context("Failed to get satisfaction ratings")?;
        self.listing(RecordKind::SatisfactionRating, &ratings, Map::new(), &request)
    }

    async fn ticket_counts_text(&self, request: TicketCountsRequest) -> Result<String> {
        let query = request.query.unwrap_or_default();
        let tickets = self
            .source
            .search_tickets(&query, None, SortOrder::default())
            .await
            .with_context(|| format!("Failed to count tickets for query '{query}'"))?;

        let summary = summarize(&tickets);
        let distribution = |key: &str| summary.get(key).cloned().unwrap_or_else(|| json!({}));
        let counts = json!({
            "query": query,
            "total": tickets.len(),
            "by_status": distribution("status_distribution"),
            "by_priority": distribution("priority_distribution"),
        });
        Ok(self
            .assembler
            .shape(&counts, request.max_response_size)
            .into_text())
    }

    async fn get_user_text(&self, request: GetUserRequest) -> Result<String> {
        let user = self
            .source
            .get_user(request.user_id)
            .await
            .with_context(|| format!("Failed to get user {}", request.user_id))?;
        let projected = RecordKind::User.project(&user, Projection::Full);
        Ok(self
            .assembler
            .shape(&projected, request.max_response_size)
            .into_text())
    }

    async fn create_comment_text(&self, request: CreateCommentRequest) -> Result<String> {
        let ticket_id = request.ticket_id;
        let body = request.comment.trim();
        if body.is_empty() {
            anyhow::bail!("Comment text must not be empty");
        }
        let comment = self
            .source
            .post_comment(ticket_id, body, request.public.unwrap_or(true))
            .await
            .with_context(|| format!("Failed to post comment on ticket {ticket_id}"))?;

        let created = json!({
            "ticket_id": ticket_id,
            "status": "created",
            "comment": RecordKind::Comment.project(&comment, Projection::Full),
        });
        Ok(self.assembler.shape(&created, None).into_text())
    }

    async fn categorize_text(&self, request: CategorizeTicketsRequest) -> Result<String> {
        let tickets = self
            .source
            .search_tickets(&request.query, None, SortOrder::default())
            .await
            .with_context(|| format!("Failed to search tickets with query '{}'", request.query))?;

        let window = self.window(&tickets, &request.listing)?;
        let projected = window
            .items
            .iter()
            .map(|ticket| self.categorized(ticket, Projection::Compact))
            .collect();
        let summary =
            SummaryBuilder::with_categories(&self.categorizer).summarize(window.candidates);

        let mut base = Map::new();
        base.insert("query".to_string(), request.query.into());
        Ok(self.render_page(
            "tickets",
            projected,
            &window,
            base,
            summary,
            request.listing.max_response_size,
        ))
    }

    /// Knowledge base through the TTL cache; `refresh` drops the cached copy first.
    async fn knowledge_base(&self, refresh: bool) -> Result<Map<String, Value>> {
        if refresh {
            self.kb_cache.invalidate().await;
        }
        let source = self.source.clone();
        self.kb_cache
            .get_or_try_populate(|| async move { source.knowledge_base().await })
            .await
            .context("Failed to fetch knowledge base")
    }

    async fn knowledge_base_text(&self, request: KnowledgeBaseRequest) -> Result<String> {
        let kb = self.knowledge_base(request.refresh.unwrap_or(false)).await?;

        let selected: Vec<(&String, &Value)> = match request.section.as_deref() {
            Some(name) => {
                let section = kb
                    .iter()
                    .find(|(key, _)| key.as_str() == name)
                    .with_context(|| format!("Unknown knowledge base section '{name}'"))?;
                vec![section]
            }
            None => kb.iter().collect(),
        };

        let mut sections = Vec::new();
        let mut articles = Vec::new();
        for (name, section) in selected {
            let section_articles = section
                .get("articles")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            sections.push(json!({
                "name": name,
                "section_id": section.get("section_id").cloned().unwrap_or(Value::Null),
                "description": section.get("description").cloned().unwrap_or(Value::Null),
                "article_count": section_articles.len(),
            }));
            for article in section_articles {
                articles.push(json!({
                    "id": article.get("id").cloned().unwrap_or(Value::Null),
                    "title": article.get("title").cloned().unwrap_or(Value::Null),
                    "section": name,
                    "updated_at": article.get("updated_at").cloned().unwrap_or(Value::Null),
                    "url": article.get("url").cloned().unwrap_or(Value::Null),
                }));
            }
        }

        let overview = json!({
            "section_count": sections.len(),
            "article_count": articles.len(),
            "sections": sections,
            "articles": articles,
        });
        Ok(self
            .assembler
            .shape(&overview, request.max_response_size)
            .into_text())
    }
}

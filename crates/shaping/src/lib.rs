//! # Helpdesk Response Shaping
//!
//! Fits helpdesk result sets (tickets, users, organizations, audits) into a hard response budget
//! without hiding how much was left out.
//!
//! ## Architecture
//!
//! ```text
//! Candidate records (borrowed, never mutated)
//!     │
//!     ├──> Projection (compact / full, per record kind)
//!     │
//!     └──> ResponseAssembler::shape(data, budget)
//!          ├─> PaginatedResponse given     → rendered unchanged
//!          ├─> rendering fits              → verbatim
//!          ├─> list / known collection key → BudgetPlanner + slice
//!          │                                 + summary over every candidate
//!          └─> anything else               → line-safe text cut with suffix
//! ```
//!
//! Categories and summaries are computed over the full candidate set, so a caller reading one
//! page still sees the distribution of everything that matched.
//!
//! ## Example
//!
//! ```rust
//! use helpdesk_shaping::{ResponseAssembler, ShapingConfig, Shaped};
//! use serde_json::json;
//!
//! let assembler = ResponseAssembler::new(ShapingConfig::default());
//! let tickets: Vec<_> = (1..=25)
//!     .map(|id| json!({"id": id, "subject": "Cannot reset password", "status": "open"}))
//!     .collect();
//!
//! let shaped = assembler.shape(&json!({ "tickets": tickets }), Some(500));
//! if let Shaped::Paginated(page) = &shaped {
//!     assert!(page.has_more());
//!     assert_eq!(page.summary()["total_items"], 25);
//! }
//! println!("{}", shaped.into_text());
//! ```

mod assembler;
mod categorize;
mod config;
mod envelope;
mod error;
mod paginate;
mod planner;
mod project;
mod summary;
mod truncate;

pub use assembler::{ResponseAssembler, ShapeInput, Shaped};
pub use categorize::{
    AuxiliaryRule, Categorization, CategoryRule, CategoryRules, Categorizer, DistinctKeywordHits,
    ScoringStrategy,
};
pub use config::{ShapingConfig, DEFAULT_COLLECTION_KEYS};
pub use envelope::{PageParts, PaginatedResponse};
pub use error::{Result, ShapingError};
pub use paginate::{page_slice, resume_after, Paginator, TruncateRequest};
pub use planner::plan_page_size;
pub use project::{
    record_id, AuditView, CommentView, OrganizationView, Projection, RatingView, RecordKind,
    RecordView, TicketView, UserView, COMPACT_TITLE_CHARS,
};
pub use summary::{summarize, SummaryBuilder};
pub use truncate::{truncate_text, TextTruncation};

pub use helpdesk_protocol::{estimate_size, BudgetTruncation, Pagination, TruncationInfo};

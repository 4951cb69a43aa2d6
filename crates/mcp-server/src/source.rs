//! Upstream boundary: where ticket, user and organization records come from.

use async_trait::async_trait;
use rmcp::schemars;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Failed to read snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// How a user is attached to a ticket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketRelation {
    #[default]
    Requested,
    Assigned,
    Ccd,
}

impl TicketRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Assigned => "assigned",
            Self::Ccd => "ccd",
        }
    }

    fn matches(self, ticket: &Value, user_id: u64) -> bool {
        match self {
            Self::Requested => numeric_field(ticket, "requester_id") == Some(user_id),
            Self::Assigned => numeric_field(ticket, "assignee_id") == Some(user_id),
            Self::Ccd => ticket
                .get("collaborator_ids")
                .and_then(Value::as_array)
                .is_some_and(|ids| ids.iter().any(|id| as_id(id) == Some(user_id))),
        }
    }
}

/// Access to the helpdesk.
///
/// Record lists come back in upstream order; the shaping layer never reorders them. The only
/// write is [`TicketSource::post_comment`].
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn search_tickets(
        &self,
        query: &str,
        sort_by: Option<&str>,
        sort_order: SortOrder,
    ) -> SourceResult<Vec<Value>>;

    async fn get_ticket(&self, ticket_id: u64) -> SourceResult<Value>;

    async fn ticket_comments(&self, ticket_id: u64) -> SourceResult<Vec<Value>>;

    async fn ticket_audits(&self, ticket_id: u64) -> SourceResult<Vec<Value>>;

    async fn user_tickets(
        &self,
        user_id: u64,
        relation: TicketRelation,
    ) -> SourceResult<Vec<Value>>;

    async fn organization_tickets(&self, org_id: u64) -> SourceResult<Vec<Value>>;

    async fn search_users(&self, query: &str) -> SourceResult<Vec<Value>>;

    async fn get_user(&self, user_id: u64) -> SourceResult<Value>;

    async fn organizations(&self) -> SourceResult<Vec<Value>>;

    async fn satisfaction_ratings(&self, limit: usize) -> SourceResult<Vec<Value>>;

    /// Help center sections keyed by name, each with its articles.
    async fn knowledge_base(&self) -> SourceResult<Map<String, Value>>;

    /// Adds a comment to an existing ticket and returns the stored comment.
    async fn post_comment(&self, ticket_id: u64, body: &str, public: bool)
        -> SourceResult<Value>;
}

/// Exported helpdesk data as one JSON document.
///
/// ```text
/// { "tickets": [...], "users": [...], "organizations": [...],
///   "comments": {"<ticket id>": [...]}, "audits": {"<ticket id>": [...]},
///   "satisfaction_ratings": [...],
///   "knowledge_base": {"<section>": {"section_id": 1, "articles": [...]}} }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tickets: Vec<Value>,
    pub users: Vec<Value>,
    pub organizations: Vec<Value>,
    pub comments: BTreeMap<String, Vec<Value>>,
    pub audits: BTreeMap<String, Vec<Value>>,
    pub satisfaction_ratings: Vec<Value>,
    pub knowledge_base: Map<String, Value>,
}

/// [`TicketSource`] over a [`Snapshot`] held in memory.
///
/// Posted comments are kept in memory only; the snapshot file is never written.
#[derive(Debug, Default)]
pub struct SnapshotSource {
    snapshot: RwLock<Snapshot>,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(path: &Path) -> SourceResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!(
            "Loaded snapshot {}: {} tickets, {} users, {} organizations",
            path.display(),
            snapshot.tickets.len(),
            snapshot.users.len(),
            snapshot.organizations.len()
        );
        Ok(Self::new(snapshot))
    }

    fn per_ticket(map: &BTreeMap<String, Vec<Value>>, ticket_id: u64) -> Vec<Value> {
        map.get(&ticket_id.to_string()).cloned().unwrap_or_default()
    }

    fn find_ticket(snapshot: &Snapshot, ticket_id: u64) -> SourceResult<&Value> {
        snapshot
            .tickets
            .iter()
            .find(|ticket| numeric_field(ticket, "id") == Some(ticket_id))
            .ok_or(SourceError::NotFound {
                kind: "ticket",
                id: ticket_id,
            })
    }
}

#[async_trait]
impl TicketSource for SnapshotSource {
    async fn search_tickets(
        &self,
        query: &str,
        sort_by: Option<&str>,
        sort_order: SortOrder,
    ) -> SourceResult<Vec<Value>> {
        let query = RecordQuery::parse(query, &["subject", "description", "tags"]);
        let snapshot = self.snapshot.read().await;
        let mut tickets: Vec<Value> = snapshot
            .tickets
            .iter()
            .filter(|ticket| query.matches(ticket))
            .cloned()
            .collect();
        sort_records(&mut tickets, sort_by.unwrap_or("created_at"), sort_order);
        Ok(tickets)
    }

    async fn get_ticket(&self, ticket_id: u64) -> SourceResult<Value> {
        let snapshot = self.snapshot.read().await;
        Self::find_ticket(&snapshot, ticket_id).cloned()
    }

    async fn ticket_comments(&self, ticket_id: u64) -> SourceResult<Vec<Value>> {
        let snapshot = self.snapshot.read().await;
        Self::find_ticket(&snapshot, ticket_id)?;
        Ok(Self::per_ticket(&snapshot.comments, ticket_id))
    }

    async fn ticket_audits(&self, ticket_id: u64) -> SourceResult<Vec<Value>> {
        let snapshot = self.snapshot.read().await;
        Self::find_ticket(&snapshot, ticket_id)?;
        Ok(Self::per_ticket(&snapshot.audits, ticket_id))
    }

    async fn user_tickets(
        &self,
        user_id: u64,
        relation: TicketRelation,
    ) -> SourceResult<Vec<Value>> {
        Ok(self
            .snapshot
            .read()
            .await
            .tickets
            .iter()
            .filter(|ticket| relation.matches(ticket, user_id))
            .cloned()
            .collect())
    }

    async fn organization_tickets(&self, org_id: u64) -> SourceResult<Vec<Value>> {
        Ok(self
            .snapshot
            .read()
            .await
            .tickets
            .iter()
            .filter(|ticket| numeric_field(ticket, "organization_id") == Some(org_id))
            .cloned()
            .collect())
    }

    async fn search_users(&self, query: &str) -> SourceResult<Vec<Value>> {
        let query = RecordQuery::parse(query, &["name", "email"]);
        Ok(self
            .snapshot
            .read()
            .await
            .users
            .iter()
            .filter(|user| query.matches(user))
            .cloned()
            .collect())
    }

    async fn get_user(&self, user_id: u64) -> SourceResult<Value> {
        self.snapshot
            .read()
            .await
            .users
            .iter()
            .find(|user| numeric_field(user, "id") == Some(user_id))
            .cloned()
            .ok_or(SourceError::NotFound {
                kind: "user",
                id: user_id,
            })
    }

    async fn organizations(&self) -> SourceResult<Vec<Value>> {
        Ok(self.snapshot.read().await.organizations.clone())
    }

    async fn satisfaction_ratings(&self, limit: usize) -> SourceResult<Vec<Value>> {
        Ok(self
            .snapshot
            .read()
            .await
            .satisfaction_ratings
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn knowledge_base(&self) -> SourceResult<Map<String, Value>> {
        Ok(self.snapshot.read().await.knowledge_base.clone())
    }

    async fn post_comment(
        &self,
        ticket_id: u64,
        body: &str,
        public: bool,
    ) -> SourceResult<Value> {
        let mut snapshot = self.snapshot.write().await;
        Self::find_ticket(&snapshot, ticket_id)?;

        let next_id = snapshot
            .comments
            .values()
            .flatten()
            .filter_map(|comment| numeric_field(comment, "id"))
            .max()
            .unwrap_or(0)
            + 1;
        let mut comment = Map::new();
        comment.insert("id".to_string(), next_id.into());
        comment.insert("body".to_string(), body.into());
        comment.insert("public".to_string(), public.into());
        let comment = Value::Object(comment);

        snapshot
            .comments
            .entry(ticket_id.to_string())
            .or_default()
            .push(comment.clone());
        log::info!("Added comment {next_id} to ticket {ticket_id}");
        Ok(comment)
    }
}

/// `field:value` filters plus free-text terms, all of which must match.
///
/// `type:` tokens are accepted and ignored; every record kind is searched separately anyway.
#[derive(Debug, Default, PartialEq)]
struct RecordQuery {
    filters: Vec<(String, String)>,
    terms: Vec<String>,
    text_fields: &'static [&'static str],
}

impl RecordQuery {
    fn parse(query: &str, text_fields: &'static [&'static str]) -> Self {
        let mut parsed = Self {
            text_fields,
            ..Self::default()
        };
        for token in query.split_whitespace() {
            match token.split_once(':') {
                Some((field, value)) if !field.is_empty() && !value.is_empty() => {
                    let field = field.to_lowercase();
                    if field == "type" {
                        continue;
                    }
                    let field = if field == "tag" { "tags".to_string() } else { field };
                    parsed.filters.push((field, value.to_lowercase()));
                }
                _ => parsed.terms.push(token.to_lowercase()),
            }
        }
        parsed
    }

    fn matches(&self, record: &Value) -> bool {
        let filters_hold = self
            .filters
            .iter()
            .all(|(field, expected)| field_matches(record.get(field), expected));
        if !filters_hold {
            return false;
        }
        if self.terms.is_empty() {
            return true;
        }

        let haystack = self
            .text_fields
            .iter()
            .filter_map(|field| record.get(*field))
            .map(|value| match value {
                Value::String(s) => s.to_lowercase(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase(),
                other => other.to_string().to_lowercase(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.terms.iter().all(|term| haystack.contains(term.as_str()))
    }
}

fn field_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(expected),
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        Some(Value::Array(items)) => items.iter().any(|item| field_matches(Some(item), expected)),
        _ => false,
    }
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn numeric_field(record: &Value, field: &str) -> Option<u64> {
    record.get(field).and_then(as_id)
}

/// Stable sort by `field`; records without the field go last in either order.
fn sort_records(records: &mut [Value], field: &str, order: SortOrder) {
    records.sort_by(|a, b| {
        let a = a.get(field).filter(|v| !v.is_null());
        let b = b.get(field).filter(|v| !v.is_null());
        match (a, b) {
            (Some(a), Some(b)) => {
                let ordering = compare_values(a, b);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => value_text(a).cmp(&value_text(b)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    fn snapshot() -> Snapshot {
        serde_json::from_value(json!({
            "tickets": [
                {"id": 1, "subject": "Refund for duplicate invoice", "status": "open",
                 "priority": "high", "created_at": "2024-05-02T09:00:00Z",
                 "requester_id": 10, "assignee_id": 20, "organization_id": 100,
                 "tags": ["billing"], "collaborator_ids": [30]},
                {"id": 2, "subject": "Login loop after password reset", "status": "pending",
                 "priority": "normal", "created_at": "2024-05-03T09:00:00Z",
                 "requester_id": 11, "assignee_id": 20, "organization_id": 101, "tags": []},
                {"id": 3, "subject": "Package never arrived", "status": "open",
                 "created_at": "2024-05-01T09:00:00Z", "requester_id": 10, "tags": ["shipping"]}
            ],
            "users": [
                {"id": 10, "name": "Ada Lovelace", "email": "ada@example.com", "role": "end-user"},
                {"id": 20, "name": "Grace Hopper", "email": "grace@example.com", "role": "agent"}
            ],
            "organizations": [{"id": 100, "name": "Acme"}],
            "comments": {"1": [{"id": 500, "author_id": 10, "body": "Please refund", "public": true}]},
            "satisfaction_ratings": [{"id": 1, "score": "good"}, {"id": 2, "score": "bad"}],
            "knowledge_base": {"Billing": {"section_id": 7, "articles": [{"id": 70, "title": "Refunds"}]}}
        }))
        .unwrap()
    }

    fn ids(records: &[Value]) -> Vec<u64> {
        records.iter().filter_map(|r| numeric_field(r, "id")).collect()
    }

    #[tokio::test]
    async fn search_filters_and_sorts() {
        let source = SnapshotSource::new(snapshot());

        let open = source
            .search_tickets("type:ticket status:open", None, SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(ids(&open), vec![1, 3]);

        let asc = source
            .search_tickets("", Some("created_at"), SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(ids(&asc), vec![3, 1, 2]);

        let by_priority = source
            .search_tickets("", Some("priority"), SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(ids(&by_priority), vec![1, 2, 3]);

        let text = source
            .search_tickets("password", None, SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(ids(&text), vec![2]);

        let tagged = source
            .search_tickets("tag:shipping", None, SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(ids(&tagged), vec![3]);
    }

    #[tokio::test]
    async fn relations_select_tickets() {
        let source = SnapshotSource::new(snapshot());
        let requested = source.user_tickets(10, TicketRelation::Requested).await.unwrap();
        assert_eq!(ids(&requested), vec![1, 3]);
        let assigned = source.user_tickets(20, TicketRelation::Assigned).await.unwrap();
        assert_eq!(ids(&assigned), vec![1, 2]);
        let ccd = source.user_tickets(30, TicketRelation::Ccd).await.unwrap();
        assert_eq!(ids(&ccd), vec![1]);
        let org = source.organization_tickets(101).await.unwrap();
        assert_eq!(ids(&org), vec![2]);
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let source = SnapshotSource::new(snapshot());
        let err = source.get_ticket(99).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { id: 99, .. }));
        assert_eq!(err.to_string(), "ticket 99 not found");
        assert!(source.ticket_comments(99).await.is_err());
        assert!(source.ticket_audits(1).await.unwrap().is_empty());
        assert_eq!(source.ticket_comments(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn users_ratings_and_knowledge_base() {
        let source = SnapshotSource::new(snapshot());
        let users = source.search_users("grace").await.unwrap();
        assert_eq!(ids(&users), vec![20]);
        let agents = source.search_users("role:agent").await.unwrap();
        assert_eq!(ids(&agents), vec![20]);
        assert_eq!(source.satisfaction_ratings(1).await.unwrap().len(), 1);
        let kb = source.knowledge_base().await.unwrap();
        assert_eq!(kb["Billing"]["articles"][0]["title"], "Refunds");
    }

    #[tokio::test]
    async fn users_are_found_by_id() {
        let source = SnapshotSource::new(snapshot());
        assert_eq!(source.get_user(20).await.unwrap()["name"], "Grace Hopper");
        let err = source.get_user(99).await.unwrap_err();
        assert_eq!(err.to_string(), "user 99 not found");
    }

    #[tokio::test]
    async fn posted_comments_join_the_thread() {
        let source = SnapshotSource::new(snapshot());
        let posted = source.post_comment(1, "Refund issued", false).await.unwrap();
        assert_eq!(posted["id"], 501);
        assert_eq!(posted["public"], false);

        let thread = source.ticket_comments(1).await.unwrap();
        assert_eq!(ids(&thread), vec![500, 501]);
        assert_eq!(thread[1]["body"], "Refund issued");

        let first_on_ticket_two = source.post_comment(2, "Looking into it", true).await.unwrap();
        assert_eq!(first_on_ticket_two["id"], 502);
        assert!(matches!(
            source.post_comment(99, "hello", true).await,
            Err(SourceError::NotFound { kind: "ticket", id: 99 })
        ));
    }

    #[tokio::test]
    async fn loads_from_file_and_reports_bad_json() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, "{}", json!({"tickets": [{"id": 5, "status": "new"}]})).unwrap();
        let source = SnapshotSource::load(good.path()).await.unwrap();
        assert_eq!(source.get_ticket(5).await.unwrap()["status"], "new");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{ not json").unwrap();
        let err = SnapshotSource::load(bad.path()).await.unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));

        let missing = SnapshotSource::load(Path::new("/nonexistent/snapshot.json"))
            .await
            .unwrap_err();
        assert!(matches!(missing, SourceError::Io { .. }));
    }
}

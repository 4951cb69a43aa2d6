//! Typed views over raw upstream records and their compact/full projections.
//!
//! Upstream records are loosely shaped JSON objects where almost every field is optional. Each
//! view reads a record exactly once in `from_record`, which is the only place a field default is
//! declared. Projections are pure: the raw record is borrowed, never modified.

use serde_json::{Map, Value};

/// Maximum characters of a title or snippet in a compact projection.
pub const COMPACT_TITLE_CHARS: usize = 80;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Ticket,
    Comment,
    User,
    Organization,
    Audit,
    SatisfactionRating,
}

impl RecordKind {
    /// Key under which a list of this kind travels in a tool payload.
    #[must_use]
    pub const fn collection_key(self) -> &'static str {
        match self {
            Self::Ticket => "tickets",
            Self::Comment => "comments",
            Self::User => "users",
            Self::Organization => "organizations",
            Self::Audit => "audits",
            Self::SatisfactionRating => "ratings",
        }
    }

    #[must_use]
    pub fn project(self, record: &Value, projection: Projection) -> Value {
        match self {
            Self::Ticket => TicketView::from_record(record).project(projection),
            Self::Comment => CommentView::from_record(record).project(projection),
            Self::User => UserView::from_record(record).project(projection),
            Self::Organization => OrganizationView::from_record(record).project(projection),
            Self::Audit => AuditView::from_record(record).project(projection),
            Self::SatisfactionRating => RatingView::from_record(record).project(projection),
        }
    }

    #[must_use]
    pub fn project_all(self, records: &[Value], projection: Projection) -> Vec<Value> {
        records
            .iter()
            .map(|record| self.project(record, projection))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Compact,
    Full,
}

impl Projection {
    #[must_use]
    pub const fn from_compact_flag(compact: bool) -> Self {
        if compact {
            Self::Compact
        } else {
            Self::Full
        }
    }
}

pub trait RecordView: Sized {
    fn from_record(record: &Value) -> Self;

    /// Identifier, short title, one or two categorical fields and the primary timestamp.
    fn compact(&self) -> Map<String, Value>;

    /// Fields added on top of the compact shape.
    fn detail(&self) -> Map<String, Value>;

    fn project(&self, projection: Projection) -> Value {
        let mut out = self.compact();
        if projection == Projection::Full {
            out.extend(self.detail());
        }
        Value::Object(out)
    }
}

/// Stable identifier of a record, rendered as a string (numbers included).
#[must_use]
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// First non-null string-ish field among `keys`.
pub(crate) fn first_text<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
}

fn text(record: &Value, key: &str, default: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

fn reference(record: &Value, key: &str) -> Value {
    match record.get(key) {
        Some(value @ (Value::Number(_) | Value::String(_))) => value.clone(),
        _ => Value::Null,
    }
}

fn flag(record: &Value, key: &str, default: bool) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn string_list(record: &Value, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn shorten(input: &str, max_chars: usize) -> String {
    let input = input.trim();
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", input[..cut].trim_end()),
        None => input.to_string(),
    }
}

fn object(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketView {
    pub id: Value,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_at: String,
    pub updated_at: String,
    pub requester_id: Value,
    pub assignee_id: Value,
    pub organization_id: Value,
    pub tags: Vec<String>,
}

impl RecordView for TicketView {
    fn from_record(record: &Value) -> Self {
        Self {
            id: reference(record, "id"),
            subject: first_text(record, &["subject", "title"])
                .unwrap_or_default()
                .to_string(),
            description: first_text(record, &["description", "body"])
                .unwrap_or_default()
                .to_string(),
            status: text(record, "status", UNKNOWN),
            priority: text(record, "priority", UNKNOWN),
            created_at: text(record, "created_at", ""),
            updated_at: text(record, "updated_at", ""),
            requester_id: reference(record, "requester_id"),
            assignee_id: reference(record, "assignee_id"),
            organization_id: reference(record, "organization_id"),
            tags: string_list(record, "tags"),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("subject", shorten(&self.subject, COMPACT_TITLE_CHARS).into()),
            ("status", self.status.clone().into()),
            ("priority", self.priority.clone().into()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        object(vec![
            ("subject", self.subject.clone().into()),
            ("description", self.description.clone().into()),
            ("updated_at", self.updated_at.clone().into()),
            ("requester_id", self.requester_id.clone()),
            ("assignee_id", self.assignee_id.clone()),
            ("organization_id", self.organization_id.clone()),
            ("tags", self.tags.clone().into()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentView {
    pub id: Value,
    pub author_id: Value,
    pub body: String,
    pub public: bool,
    pub created_at: String,
}

impl RecordView for CommentView {
    fn from_record(record: &Value) -> Self {
        Self {
            id: reference(record, "id"),
            author_id: reference(record, "author_id"),
            body: first_text(record, &["body", "plain_body", "html_body"])
                .unwrap_or_default()
                .to_string(),
            public: flag(record, "public", true),
            created_at: text(record, "created_at", ""),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("snippet", shorten(&self.body, COMPACT_TITLE_CHARS).into()),
            ("author_id", self.author_id.clone()),
            ("public", self.public.into()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        object(vec![("body", self.body.clone().into())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: Value,
    pub name: String,
    pub email: String,
    pub role: String,
    pub suspended: bool,
    pub organization_id: Value,
    pub created_at: String,
    pub last_login_at: String,
    pub tags: Vec<String>,
}

impl RecordView for UserView {
    fn from_record(record: &Value) -> Self {
        Self {
            id: reference(record, "id"),
            name: text(record, "name", ""),
            email: text(record, "email", ""),
            role: text(record, "role", UNKNOWN),
            suspended: flag(record, "suspended", false),
            organization_id: reference(record, "organization_id"),
            created_at: text(record, "created_at", ""),
            last_login_at: text(record, "last_login_at", ""),
            tags: string_list(record, "tags"),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("name", shorten(&self.name, COMPACT_TITLE_CHARS).into()),
            ("role", self.role.clone().into()),
            ("suspended", self.suspended.into()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        object(vec![
            ("email", self.email.clone().into()),
            ("organization_id", self.organization_id.clone()),
            ("last_login_at", self.last_login_at.clone().into()),
            ("tags", self.tags.clone().into()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationView {
    pub id: Value,
    pub name: String,
    pub details: String,
    pub notes: String,
    pub shared_tickets: bool,
    pub domain_names: Vec<String>,
    pub created_at: String,
    pub tags: Vec<String>,
}

impl RecordView for OrganizationView {
    fn from_record(record: &Value) -> Self {
        Self {
            id: reference(record, "id"),
            name: text(record, "name", ""),
            details: text(record, "details", ""),
            notes: text(record, "notes", ""),
            shared_tickets: flag(record, "shared_tickets", false),
            domain_names: string_list(record, "domain_names"),
            created_at: text(record, "created_at", ""),
            tags: string_list(record, "tags"),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("name", shorten(&self.name, COMPACT_TITLE_CHARS).into()),
            ("shared_tickets", self.shared_tickets.into()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        object(vec![
            ("details", self.details.clone().into()),
            ("notes", self.notes.clone().into()),
            ("domain_names", self.domain_names.clone().into()),
            ("tags", self.tags.clone().into()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditView {
    pub id: Value,
    pub ticket_id: Value,
    pub author_id: Value,
    pub channel: String,
    pub created_at: String,
    pub events: Vec<Value>,
}

impl AuditView {
    fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for event in &self.events {
            let kind = text(event, "type", UNKNOWN);
            if !types.contains(&kind) {
                types.push(kind);
            }
        }
        types
    }
}

impl RecordView for AuditView {
    fn from_record(record: &Value) -> Self {
        let channel = record
            .get("via")
            .map(|via| text(via, "channel", UNKNOWN))
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            id: reference(record, "id"),
            ticket_id: reference(record, "ticket_id"),
            author_id: reference(record, "author_id"),
            channel,
            created_at: text(record, "created_at", ""),
            events: record
                .get("events")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("ticket_id", self.ticket_id.clone()),
            ("event_types", self.event_types().into()),
            ("channel", self.channel.clone().into()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        let events: Vec<Value> = self
            .events
            .iter()
            .map(|event| {
                Value::Object(object(vec![
                    ("type", text(event, "type", UNKNOWN).into()),
                    ("field_name", reference(event, "field_name")),
                    ("value", event.get("value").cloned().unwrap_or(Value::Null)),
                    (
                        "previous_value",
                        event.get("previous_value").cloned().unwrap_or(Value::Null),
                    ),
                ]))
            })
            .collect();
        object(vec![
            ("author_id", self.author_id.clone()),
            ("events", events.into()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingView {
    pub id: Value,
    pub score: String,
    pub ticket_id: Value,
    pub comment: String,
    pub assignee_id: Value,
    pub requester_id: Value,
    pub created_at: String,
}

impl RecordView for RatingView {
    fn from_record(record: &Value) -> Self {
        Self {
            id: reference(record, "id"),
            score: text(record, "score", UNKNOWN),
            ticket_id: reference(record, "ticket_id"),
            comment: text(record, "comment", ""),
            assignee_id: reference(record, "assignee_id"),
            requester_id: reference(record, "requester_id"),
            created_at: text(record, "created_at", ""),
        }
    }

    fn compact(&self) -> Map<String, Value> {
        object(vec![
            ("id", self.id.clone()),
            ("score", self.score.clone().into()),
            ("ticket_id", self.ticket_id.clone()),
            ("created_at", self.created_at.clone().into()),
        ])
    }

    fn detail(&self) -> Map<String, Value> {
        object(vec![
            ("comment", self.comment.clone().into()),
            ("assignee_id", self.assignee_id.clone()),
            ("requester_id", self.requester_id.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw_ticket() -> Value {
        json!({
            "id": 42,
            "subject": "Refund for duplicate invoice",
            "description": "I was charged twice.",
            "status": "open",
            "priority": "high",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02T10:00:00Z",
            "requester_id": 7,
            "assignee_id": null,
            "tags": ["billing", "vip"],
            "via": {"channel": "email"}
        })
    }

    #[test]
    fn compact_ticket_keeps_stable_small_schema() {
        let projected = RecordKind::Ticket.project(&raw_ticket(), Projection::Compact);
        assert_eq!(
            projected,
            json!({
                "id": 42,
                "subject": "Refund for duplicate invoice",
                "status": "open",
                "priority": "high",
                "created_at": "2024-05-01T10:00:00Z"
            })
        );
    }

    #[test]
    fn full_ticket_adds_bodies_relations_and_tags() {
        let projected = RecordKind::Ticket.project(&raw_ticket(), Projection::Full);
        assert_eq!(projected["description"], "I was charged twice.");
        assert_eq!(projected["requester_id"], 7);
        assert_eq!(projected["assignee_id"], Value::Null);
        assert_eq!(projected["tags"], json!(["billing", "vip"]));
        assert!(projected.get("via").is_none());
    }

    #[test]
    fn missing_fields_take_declared_defaults() {
        let projected = RecordKind::Ticket.project(&json!({"id": "T-1"}), Projection::Full);
        assert_eq!(projected["status"], "unknown");
        assert_eq!(projected["priority"], "unknown");
        assert_eq!(projected["subject"], "");
        assert_eq!(projected["tags"], json!([]));
    }

    #[test]
    fn projection_does_not_touch_source() {
        let raw = raw_ticket();
        let before = raw.clone();
        let _ = RecordKind::Ticket.project(&raw, Projection::Full);
        assert_eq!(raw, before);
    }

    #[test]
    fn compact_title_is_shortened_on_char_boundary() {
        let long = "é".repeat(COMPACT_TITLE_CHARS + 10);
        let projected =
            RecordKind::Ticket.project(&json!({"id": 1, "subject": long}), Projection::Compact);
        let subject = projected["subject"].as_str().unwrap();
        assert_eq!(subject.chars().count(), COMPACT_TITLE_CHARS + 1);
        assert!(subject.ends_with('…'));
    }

    #[test]
    fn audit_compact_lists_distinct_event_types() {
        let raw = json!({
            "id": 9,
            "ticket_id": 42,
            "author_id": 3,
            "via": {"channel": "web"},
            "created_at": "2024-05-01T10:00:00Z",
            "events": [
                {"type": "Change", "field_name": "status", "value": "open", "previous_value": "new"},
                {"type": "Comment", "body": "hello"},
                {"type": "Change", "field_name": "priority", "value": "high"}
            ]
        });
        let compact = RecordKind::Audit.project(&raw, Projection::Compact);
        assert_eq!(compact["event_types"], json!(["Change", "Comment"]));
        assert_eq!(compact["channel"], "web");

        let full = RecordKind::Audit.project(&raw, Projection::Full);
        assert_eq!(full["events"].as_array().unwrap().len(), 3);
        assert_eq!(full["events"][0]["previous_value"], "new");
    }

    #[test]
    fn record_id_renders_numbers_and_strings() {
        assert_eq!(record_id(&json!({"id": 17})).as_deref(), Some("17"));
        assert_eq!(record_id(&json!({"id": "abc"})).as_deref(), Some("abc"));
        assert_eq!(record_id(&json!({"id": null})), None);
        assert_eq!(record_id(&json!("bare")), None);
    }

    #[test]
    fn compact_flag_maps_to_projection() {
        assert_eq!(Projection::from_compact_flag(true), Projection::Compact);
        assert_eq!(Projection::from_compact_flag(false), Projection::Full);
        assert_eq!(RecordKind::User.collection_key(), "users");
    }
}

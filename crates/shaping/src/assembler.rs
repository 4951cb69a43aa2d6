use helpdesk_protocol::render_json;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::categorize::Categorizer;
use crate::config::ShapingConfig;
use crate::envelope::{PageParts, PaginatedResponse};
use crate::error::Result;
use crate::paginate::resume_after;
use crate::planner::plan_page_size;
use crate::project::record_id;
use crate::summary::SummaryBuilder;
use crate::truncate::truncate_text;

/// Payload handed to [`ResponseAssembler::shape`].
#[derive(Debug, Clone, Copy)]
pub enum ShapeInput<'a> {
    /// Already shaped; rendered as is.
    Envelope(&'a PaginatedResponse<Value>),
    Value(&'a Value),
}

impl<'a> From<&'a Value> for ShapeInput<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

impl<'a> From<&'a PaginatedResponse<Value>> for ShapeInput<'a> {
    fn from(envelope: &'a PaginatedResponse<Value>) -> Self {
        Self::Envelope(envelope)
    }
}

/// Outcome of the fallback ladder, one variant per tier.
#[derive(Debug, Clone, PartialEq)]
pub enum Shaped {
    PassThrough(String),
    Verbatim(String),
    Paginated(PaginatedResponse<Value>),
    Truncated { text: String, omitted_chars: usize },
}

impl Shaped {
    pub fn tier(&self) -> &'static str {
        match self {
            Self::PassThrough(_) => "pass_through",
            Self::Verbatim(_) => "verbatim",
            Self::Paginated(_) => "paginated",
            Self::Truncated { .. } => "truncated",
        }
    }

    pub fn envelope(&self) -> Option<&PaginatedResponse<Value>> {
        match self {
            Self::Paginated(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Final tool text.
    pub fn into_text(self) -> String {
        match self {
            Self::PassThrough(text) | Self::Verbatim(text) => text,
            Self::Paginated(envelope) => envelope.render(),
            Self::Truncated { text, .. } => text,
        }
    }
}

/// Where the list to paginate lives inside the payload.
enum Collection<'a> {
    Bare(&'a [Value]),
    Keyed {
        key: &'a str,
        items: &'a [Value],
        siblings: Map<String, Value>,
    },
}

impl<'a> Collection<'a> {
    fn items(&self) -> &'a [Value] {
        match self {
            Self::Bare(items) => *items,
            Self::Keyed { items, .. } => *items,
        }
    }
}

/// Fits arbitrary payloads into a response budget.
///
/// Tiers, first match wins:
/// 1. an existing [`PaginatedResponse`] is rendered unchanged;
/// 2. a payload whose rendering fits the budget is returned verbatim;
/// 3. a bare list, or a mapping with exactly one known collection key, is paginated with a
///    summary over every candidate;
/// 4. anything else is cut as text on a line boundary with an explicit suffix.
///
/// Budgets are bytes of the rendered text in every tier.
///
/// Shaping never mutates its input and is deterministic for a given input and budget.
#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler {
    config: ShapingConfig,
    categorizer: Option<Arc<Categorizer>>,
}

impl ResponseAssembler {
    pub fn new(config: ShapingConfig) -> Self {
        Self {
            config,
            categorizer: None,
        }
    }

    /// Summaries of paginated payloads also carry a `category_distribution`.
    #[must_use]
    pub fn with_categorizer(mut self, categorizer: Arc<Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    pub fn config(&self) -> &ShapingConfig {
        &self.config
    }

    /// Shape `input` under `max_length` (the configured default when `None`).
    pub fn shape<'a>(
        &self,
        input: impl Into<ShapeInput<'a>>,
        max_length: Option<usize>,
    ) -> Shaped {
        let max_length = max_length.unwrap_or(self.config.max_response_length);
        let value = match input.into() {
            ShapeInput::Envelope(envelope) => return Shaped::PassThrough(envelope.render()),
            ShapeInput::Value(value) => value,
        };

        let rendered = render_json(value).unwrap_or_else(|_| value.to_string());
        if rendered.len() <= max_length {
            return Shaped::Verbatim(rendered);
        }

        match self.find_collection(value) {
            Some(collection) if collection.items().is_empty() => {
                log::debug!("empty collection over budget; returned unchanged");
                Shaped::Verbatim(rendered)
            }
            Some(collection) => {
                let summary = self.summary_builder().summarize(collection.items());
                Shaped::Paginated(self.paginate(collection, summary, max_length))
            }
            None => {
                let text = match value {
                    Value::String(text) => text.as_str(),
                    _ => rendered.as_str(),
                };
                match truncate_text(text, max_length, &self.config) {
                    Some(cut) => {
                        log::debug!(
                            "opaque payload truncated: {} characters omitted",
                            cut.omitted_chars
                        );
                        Shaped::Truncated {
                            text: cut.text,
                            omitted_chars: cut.omitted_chars,
                        }
                    }
                    // Only a raw string can land here: its quoted rendering was over budget
                    // but the content itself fits.
                    None => Shaped::Verbatim(text.to_string()),
                }
            }
        }
    }

    /// Shape the page that follows `cursor`.
    ///
    /// The candidate set becomes the items after the cursor, so counts and summary describe what
    /// remains to be read. A payload without a paginable collection is shaped as is.
    pub fn shape_after(
        &self,
        data: &Value,
        cursor: &str,
        max_length: Option<usize>,
    ) -> Result<Shaped> {
        let narrowed = match self.find_collection(data) {
            Some(Collection::Bare(items)) => Value::Array(resume_after(items, cursor)?.to_vec()),
            Some(Collection::Keyed {
                key,
                items,
                mut siblings,
            }) => {
                let rest = resume_after(items, cursor)?;
                siblings.insert(key.to_string(), Value::Array(rest.to_vec()));
                Value::Object(siblings)
            }
            None => data.clone(),
        };
        Ok(self.shape(&narrowed, max_length))
    }

    fn summary_builder(&self) -> SummaryBuilder<'_> {
        match self.categorizer.as_deref() {
            Some(categorizer) => SummaryBuilder::with_categories(categorizer),
            None => SummaryBuilder::new(),
        }
    }

    fn find_collection<'v>(&self, value: &'v Value) -> Option<Collection<'v>> {
        match value {
            Value::Array(items) => Some(Collection::Bare(items)),
            Value::Object(map) => {
                let mut keys = map
                    .keys()
                    .filter(|key| self.config.is_collection_key(key));
                let key = keys.next()?;
                if keys.next().is_some() {
                    return None;
                }
                let items = map.get(key)?.as_array()?;
                let siblings = map
                    .iter()
                    .filter(|(other, _)| *other != key)
                    .map(|(other, value)| (other.clone(), value.clone()))
                    .collect();
                Some(Collection::Keyed {
                    key: key.as_str(),
                    items,
                    siblings,
                })
            }
            _ => None,
        }
    }

    fn paginate(
        &self,
        collection: Collection<'_>,
        summary: Map<String, Value>,
        max_length: usize,
    ) -> PaginatedResponse<Value> {
        let items = collection.items();
        let ceiling = max_length.saturating_add(self.config.truncation_reserve);
        let mut page_size = plan_page_size(items, max_length, &self.config);

        loop {
            let envelope = self.build_page(&collection, page_size, summary.clone());
            if envelope.estimated_size() <= ceiling || page_size <= 1 {
                log::debug!(
                    "paginated {} of {} items into {} bytes (budget {max_length})",
                    page_size,
                    items.len(),
                    envelope.estimated_size()
                );
                return envelope;
            }
            page_size -= 1;
        }
    }

    fn build_page(
        &self,
        collection: &Collection<'_>,
        page_size: usize,
        summary: Map<String, Value>,
    ) -> PaginatedResponse<Value> {
        let items = collection.items();
        let page = &items[..page_size.min(items.len())];
        let parts = PageParts {
            total_count: items.len(),
            page_size: page.len(),
            current_page: 1,
            last_item_id: page.last().and_then(record_id),
        };
        match collection {
            Collection::Bare(_) => {
                PaginatedResponse::new(Value::Array(page.to_vec()), parts, summary, Map::new())
            }
            Collection::Keyed { key, siblings, .. } => {
                let mut data = Map::new();
                data.insert((*key).to_string(), Value::Array(page.to_vec()));
                PaginatedResponse::new(Value::Object(data), parts, summary, siblings.clone())
            }
        }
    }
}

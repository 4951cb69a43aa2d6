use helpdesk_protocol::{estimate_size, render_json, BudgetTruncation, TruncationInfo};
use serde_json::{Map, Value};

use crate::config::ShapingConfig;
use crate::envelope::{PageParts, PaginatedResponse};
use crate::error::{Result, ShapingError};
use crate::project::record_id;
use crate::summary::summarize;

/// Items of page `page` (1-based) for a fixed `page_size`. Out-of-range pages are empty.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = page.max(1).saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Items after the one identified by `cursor`.
///
/// Surrounding whitespace is ignored on both the cursor and the record ids.
pub fn resume_after<'a>(items: &'a [Value], cursor: &str) -> Result<&'a [Value]> {
    let cursor = cursor.trim();
    items
        .iter()
        .position(|item| record_id(item).as_deref().map(str::trim) == Some(cursor))
        .map(|idx| &items[idx + 1..])
        .ok_or_else(|| ShapingError::CursorNotFound(cursor.to_string()))
}

/// Indentation an item picks up as an element of `data.<key>` in the rendered envelope.
const NESTED_INDENT: usize = 6;

/// Size of `item` once rendered inside the envelope, separator included.
fn nested_size(item: &Value) -> usize {
    match render_json(item) {
        Ok(raw) => raw.len() + (raw.matches('\n').count() + 1) * NESTED_INDENT + 2,
        Err(_) => estimate_size(item),
    }
}

pub(crate) fn truncation_metadata(info: &TruncationInfo) -> Value {
    serde_json::to_value(info).unwrap_or(Value::Null)
}

/// Parameters of a greedy truncation.
#[derive(Debug, Clone)]
pub struct TruncateRequest<'a> {
    pub items_key: &'a str,
    pub max_bytes: usize,
    pub page: usize,
    /// Size of the full candidate set when `items` is already a slice of it.
    pub known_total: Option<usize>,
    /// Summary over the full candidate set when `items` is already a slice of it.
    pub summary: Option<Map<String, Value>>,
}

impl<'a> TruncateRequest<'a> {
    pub fn new(items_key: &'a str, max_bytes: usize) -> Self {
        Self {
            items_key,
            max_bytes,
            page: 1,
            known_total: None,
            summary: None,
        }
    }

    #[must_use]
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn known_total(mut self, total: usize) -> Self {
        self.known_total = Some(total);
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: Map<String, Value>) -> Self {
        self.summary = Some(summary);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Paginator<'a> {
    config: &'a ShapingConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(config: &'a ShapingConfig) -> Self {
        Self { config }
    }

    /// First-fit truncation of the collection under `request.items_key`.
    ///
    /// Items are taken in order until the next one would overflow the budget left after the
    /// sibling keys and the scaffolding reserve; nothing is reordered to pack tighter. The first
    /// item is always included so the caller can move forward. Once built, the page is
    /// re-measured and trailing items are dropped (never below one) while it exceeds
    /// `max_bytes + truncation_reserve`. Returns `None` when there is no non-empty collection to
    /// truncate, in which case the caller keeps `response` as it is.
    pub fn truncate(
        &self,
        response: &Value,
        request: TruncateRequest<'_>,
    ) -> Option<PaginatedResponse<Value>> {
        let object = response.as_object()?;
        let items = object.get(request.items_key)?.as_array()?;
        if items.is_empty() {
            return None;
        }

        let base: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| key.as_str() != request.items_key)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let base_size = estimate_size(&base);
        let available = request
            .max_bytes
            .saturating_sub(base_size)
            .saturating_sub(self.config.truncation_reserve);

        let mut used = 0usize;
        let mut fit = 0usize;
        for item in items {
            let item_size = nested_size(item);
            if used.saturating_add(item_size) > available {
                break;
            }
            used += item_size;
            fit += 1;
        }
        if fit == 0 {
            log::debug!(
                "first '{}' item does not fit {available} bytes; including it anyway",
                request.items_key
            );
            fit = 1;
        }

        let summary = request.summary.unwrap_or_else(|| summarize(items));
        let total_count = request.known_total.unwrap_or(items.len());
        let source_size = estimate_size(response);
        let build = |fit: usize| {
            let included = &items[..fit];
            let reason = if fit < items.len() {
                Some(BudgetTruncation::MaxChars)
            } else if fit < total_count {
                Some(BudgetTruncation::MaxItems)
            } else {
                None
            };
            let mut metadata = base.clone();
            metadata.insert(
                "truncation_info".to_string(),
                truncation_metadata(&TruncationInfo {
                    truncated: reason.is_some(),
                    showing: fit,
                    total_found: total_count,
                    estimated_response_size: source_size,
                    max_allowed_size: request.max_bytes,
                    reason,
                }),
            );
            let parts = PageParts {
                total_count,
                page_size: fit,
                current_page: request.page,
                last_item_id: included.last().and_then(record_id),
            };
            let mut data = Map::new();
            data.insert(
                request.items_key.to_string(),
                Value::Array(included.to_vec()),
            );
            PaginatedResponse::new(Value::Object(data), parts, summary.clone(), metadata)
        };

        let ceiling = request
            .max_bytes
            .saturating_add(self.config.truncation_reserve);
        loop {
            let page = build(fit);
            if page.estimated_size() <= ceiling || fit <= 1 {
                log::debug!(
                    "greedy truncation of '{}': {fit} of {} items in {} bytes (budget {})",
                    request.items_key,
                    items.len(),
                    page.estimated_size(),
                    request.max_bytes
                );
                return Some(page);
            }
            fit -= 1;
        }
    }
}

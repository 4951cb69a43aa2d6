use helpdesk_protocol::{finalize_estimated_size, render_json, Pagination};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Counts a page is built from. `last_item_id` becomes `next_cursor` when another page exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParts {
    pub total_count: usize,
    pub page_size: usize,
    pub current_page: usize,
    pub last_item_id: Option<String>,
}

/// The response envelope handed to the tool caller.
///
/// Fields are private: once [`PaginatedResponse::new`] has derived `has_more`, `next_cursor` and
/// `estimated_size`, nothing can change them independently.
///
/// Wire shape:
///
/// ```text
/// { "data": ..., "pagination": {...}, "metadata": {"estimated_size": N, ...}, "summary": {...} }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedResponse<T> {
    data: T,
    pagination: Pagination,
    estimated_size: usize,
    summary: Map<String, Value>,
    metadata: Map<String, Value>,
}

#[derive(serde::Serialize)]
struct WireEnvelope<'a, T> {
    data: &'a T,
    pagination: &'a Pagination,
    metadata: Map<String, Value>,
    summary: &'a Map<String, Value>,
}

impl<T: Serialize> Serialize for PaginatedResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut metadata = self.metadata.clone();
        metadata.insert("estimated_size".to_string(), self.estimated_size.into());
        WireEnvelope {
            data: &self.data,
            pagination: &self.pagination,
            metadata,
            summary: &self.summary,
        }
        .serialize(serializer)
    }
}

impl<T: Serialize + fmt::Debug> PaginatedResponse<T> {
    pub fn new(
        data: T,
        parts: PageParts,
        summary: Map<String, Value>,
        metadata: Map<String, Value>,
    ) -> Self {
        let pagination = Pagination::derive(
            parts.total_count,
            parts.page_size,
            parts.current_page,
            parts.last_item_id,
        );
        let mut response = Self {
            data,
            pagination,
            estimated_size: 0,
            summary,
            metadata,
        };
        finalize_estimated_size(&mut response, |inner, size| inner.estimated_size = size);
        response
    }

    /// Rendered envelope in the transmission form.
    pub fn render(&self) -> String {
        render_json(self).unwrap_or_else(|err| {
            log::warn!("failed to render response envelope: {err}");
            format!("{self:?}")
        })
    }
}

impl<T> PaginatedResponse<T> {
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn total_count(&self) -> usize {
        self.pagination.total_count
    }

    pub fn page_size(&self) -> usize {
        self.pagination.page_size
    }

    pub fn current_page(&self) -> usize {
        self.pagination.current_page
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination.next_cursor.as_deref()
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn summary(&self) -> &Map<String, Value> {
        &self.summary
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(total: usize, page_size: usize) -> PaginatedResponse<Value> {
        let items: Vec<Value> = (1..=page_size).map(|i| json!({"id": i})).collect();
        let mut metadata = Map::new();
        metadata.insert("query".to_string(), json!("status:open"));
        let mut summary = Map::new();
        summary.insert("total_items".to_string(), json!(total));
        PaginatedResponse::new(
            json!({ "tickets": items }),
            PageParts {
                total_count: total,
                page_size,
                current_page: 1,
                last_item_id: (page_size > 0).then(|| page_size.to_string()),
            },
            summary,
            metadata,
        )
    }

    #[test]
    fn wire_shape_nests_pagination_and_size() {
        let response = envelope(25, 3);
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["pagination"]["total_count"], 25);
        assert_eq!(wire["pagination"]["page_size"], 3);
        assert_eq!(wire["pagination"]["has_more"], true);
        assert_eq!(wire["pagination"]["next_cursor"], "3");
        assert_eq!(wire["metadata"]["query"], "status:open");
        assert_eq!(
            wire["metadata"]["estimated_size"],
            json!(response.estimated_size())
        );
        assert_eq!(wire["summary"]["total_items"], 25);
        assert_eq!(wire["data"]["tickets"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn estimated_size_matches_rendered_length() {
        let response = envelope(25, 5);
        assert_eq!(response.render().len(), response.estimated_size());
    }

    #[test]
    fn complete_page_has_null_cursor() {
        let response = envelope(4, 4);
        assert!(!response.has_more());
        assert_eq!(response.next_cursor(), None);
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["pagination"]["next_cursor"], Value::Null);
    }

    #[test]
    fn caller_metadata_cannot_spoof_estimated_size() {
        let mut metadata = Map::new();
        metadata.insert("estimated_size".to_string(), json!(1));
        let response = PaginatedResponse::new(
            json!([]),
            PageParts {
                total_count: 0,
                page_size: 0,
                current_page: 1,
                last_item_id: None,
            },
            Map::new(),
            metadata,
        );
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire["metadata"]["estimated_size"],
            json!(response.estimated_size())
        );
        assert!(response.estimated_size() > 1);
    }
}

//! Wire primitives shared by the shaping engine and the helpdesk MCP server.
//!
//! Everything a budgeted tool response needs to agree on lives here: the pagination block, the
//! truncation report, and the size accounting used to stay under `max_response_size`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 2_000;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTruncation {
    MaxChars,
    MaxItems,
}

/// Pagination block of a response envelope.
///
/// Built through [`Pagination::derive`] so that `has_more` and `next_cursor` can never disagree
/// with the counts they are computed from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub total_count: usize,
    pub page_size: usize,
    pub current_page: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl Pagination {
    /// `last_item_id` is the identifier of the last included item, if any. It only becomes the
    /// cursor when another page exists and something was actually included.
    #[must_use]
    pub fn derive(
        total_count: usize,
        page_size: usize,
        current_page: usize,
        last_item_id: Option<String>,
    ) -> Self {
        let current_page = current_page.max(1);
        if total_count < page_size {
            log::debug!(
                "pagination total_count {total_count} is below page_size {page_size}; raising it"
            );
        }
        let total_count = total_count.max(page_size);
        let has_more = current_page.saturating_mul(page_size) < total_count;
        let next_cursor = if has_more && page_size > 0 {
            last_item_id
        } else {
            None
        };
        Self {
            total_count,
            page_size,
            current_page,
            has_more,
            next_cursor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TruncationInfo {
    pub truncated: bool,
    pub showing: usize,
    pub total_found: usize,
    pub estimated_response_size: usize,
    pub max_allowed_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BudgetTruncation>,
}

/// Canonical transmission form of every tool payload.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Byte length of `value` in its transmission form.
///
/// Falls back to the `Debug` rendering when serialization fails, so callers always get a number.
pub fn estimate_size<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> usize {
    match render_json(value) {
        Ok(raw) => raw.len(),
        Err(err) => {
            log::debug!("size estimate fell back to debug rendering: {err}");
            format!("{value:?}").len()
        }
    }
}

/// Converges a self-referential size field (a value that reports its own serialized size).
pub fn finalize_estimated_size<T: Serialize + fmt::Debug>(
    value: &mut T,
    mut set_size: impl FnMut(&mut T, usize),
) -> usize {
    let mut size = 0usize;
    for _ in 0..8 {
        set_size(value, size);
        let next = estimate_size(value);
        if next == size {
            return size;
        }
        size = next;
    }
    set_size(value, size);
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::ser::Error as _;

    #[derive(Debug)]
    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[derive(Debug, Serialize)]
    struct SelfReporting {
        label: String,
        size: usize,
    }

    #[test]
    fn has_more_follows_page_arithmetic() {
        let p = Pagination::derive(25, 10, 1, Some("10".to_string()));
        assert!(p.has_more);
        assert_eq!(p.next_cursor.as_deref(), Some("10"));

        let p = Pagination::derive(25, 5, 5, Some("25".to_string()));
        assert!(!p.has_more);
        assert_eq!(p.next_cursor, None);
    }

    #[test]
    fn empty_candidate_set_has_no_more_pages() {
        let p = Pagination::derive(0, 0, 1, None);
        assert_eq!(
            p,
            Pagination {
                total_count: 0,
                page_size: 0,
                current_page: 1,
                has_more: false,
                next_cursor: None,
            }
        );
    }

    #[test]
    fn cursor_requires_included_items() {
        let p = Pagination::derive(3, 0, 1, Some("ignored".to_string()));
        assert!(p.has_more);
        assert_eq!(p.next_cursor, None);
    }

    #[test]
    fn page_zero_is_clamped_and_total_never_below_page_size() {
        let p = Pagination::derive(2, 4, 0, None);
        assert_eq!(p.current_page, 1);
        assert_eq!(p.total_count, 4);
        assert!(!p.has_more);
    }

    #[test]
    fn estimate_matches_pretty_json_length() {
        let value = serde_json::json!({"id": 1, "subject": "Printer on fire"});
        let expected = serde_json::to_string_pretty(&value).unwrap().len();
        assert_eq!(estimate_size(&value), expected);
    }

    #[test]
    fn estimate_falls_back_to_debug_rendering() {
        assert_eq!(estimate_size(&Unserializable), "Unserializable".len());
    }

    #[test]
    fn finalize_converges_on_own_size() {
        let mut value = SelfReporting {
            label: "x".repeat(40),
            size: 0,
        };
        let size = finalize_estimated_size(&mut value, |v, n| v.size = n);
        assert_eq!(value.size, size);
        assert_eq!(estimate_size(&value), size);
    }

    #[test]
    fn truncation_reason_is_omitted_when_absent() {
        let info = TruncationInfo {
            truncated: false,
            showing: 3,
            total_found: 3,
            estimated_response_size: 120,
            max_allowed_size: 2_000,
            reason: None,
        };
        let raw = serde_json::to_value(&info).unwrap();
        assert!(raw.get("reason").is_none());
        assert_eq!(raw["showing"], 3);
    }
}

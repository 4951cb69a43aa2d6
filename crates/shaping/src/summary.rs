use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::categorize::Categorizer;

const UNKNOWN: &str = "unknown";

/// Aggregation strategy, picked from the shape of the first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordShape {
    Ticket,
    User,
    Rating,
    Generic,
}

impl RecordShape {
    fn detect(first: &Value) -> Option<Self> {
        let record = first.as_object()?;
        let shape = if record.contains_key("status") {
            Self::Ticket
        } else if record.contains_key("role") {
            Self::User
        } else if record.contains_key("score") {
            Self::Rating
        } else {
            Self::Generic
        };
        Some(shape)
    }
}

/// Aggregate statistics over a complete candidate set.
///
/// Always run on the full, unclipped list: the summary is what keeps the caller informed about
/// records that did not fit in the page.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryBuilder<'a> {
    categorizer: Option<&'a Categorizer>,
}

impl<'a> SummaryBuilder<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self { categorizer: None }
    }

    /// Adds a `category_distribution` computed with `categorizer`.
    #[must_use]
    pub fn with_categories(categorizer: &'a Categorizer) -> Self {
        Self {
            categorizer: Some(categorizer),
        }
    }

    pub fn summarize(&self, items: &[Value]) -> Map<String, Value> {
        let mut summary = Map::new();
        let Some(shape) = items.first().and_then(RecordShape::detect) else {
            return summary;
        };

        summary.insert("total_items".to_string(), items.len().into());
        match shape {
            RecordShape::Ticket => {
                summary.insert(
                    "status_distribution".to_string(),
                    distribution(items, "status"),
                );
                summary.insert(
                    "priority_distribution".to_string(),
                    distribution(items, "priority"),
                );
            }
            RecordShape::User => {
                summary.insert("role_distribution".to_string(), distribution(items, "role"));
            }
            RecordShape::Rating => {
                summary.insert(
                    "score_distribution".to_string(),
                    distribution(items, "score"),
                );
            }
            RecordShape::Generic => {}
        }

        if let Some(categorizer) = self.categorizer {
            let counts = categorizer.categorize_many(items);
            summary.insert(
                "category_distribution".to_string(),
                counts_to_value(counts),
            );
        }

        summary
    }
}

/// Summary with the default strategy and no categories.
pub fn summarize(items: &[Value]) -> Map<String, Value> {
    SummaryBuilder::new().summarize(items)
}

/// Counts by `field`; every item lands in exactly one bucket.
fn distribution(items: &[Value], field: &str) -> Value {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        let bucket = match item.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => UNKNOWN.to_string(),
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }
    counts_to_value(counts)
}

fn counts_to_value(counts: BTreeMap<String, usize>) -> Value {
    Value::Object(
        counts
            .into_iter()
            .map(|(key, count)| (key, Value::from(count)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bucket_sum(summary: &Map<String, Value>, key: &str) -> u64 {
        summary[key]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_u64().unwrap())
            .sum()
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn non_record_items_yield_empty_summary() {
        assert!(summarize(&[json!("a"), json!(1)]).is_empty());
    }

    #[test]
    fn ticket_shape_gets_status_and_priority() {
        let items = vec![
            json!({"id": 1, "status": "open", "priority": "high"}),
            json!({"id": 2, "status": "open", "priority": null}),
            json!({"id": 3, "status": "solved"}),
        ];
        let summary = summarize(&items);
        assert_eq!(summary["total_items"], 3);
        assert_eq!(summary["status_distribution"], json!({"open": 2, "solved": 1}));
        assert_eq!(
            summary["priority_distribution"],
            json!({"high": 1, "unknown": 2})
        );
        assert_eq!(bucket_sum(&summary, "priority_distribution"), 3);
    }

    #[test]
    fn user_shape_gets_role_distribution() {
        let items = vec![
            json!({"id": 1, "role": "agent"}),
            json!({"id": 2, "role": "end-user"}),
            json!({"id": 3, "role": "agent"}),
        ];
        let summary = summarize(&items);
        assert_eq!(summary["role_distribution"], json!({"agent": 2, "end-user": 1}));
        assert!(summary.get("status_distribution").is_none());
    }

    #[test]
    fn rating_shape_gets_score_distribution() {
        let items = vec![
            json!({"id": 1, "score": "good"}),
            json!({"id": 2, "score": "bad"}),
        ];
        let summary = summarize(&items);
        assert_eq!(summary["score_distribution"], json!({"bad": 1, "good": 1}));
    }

    #[test]
    fn unknown_record_shape_only_counts() {
        let summary = summarize(&[json!({"id": 1, "name": "Acme"})]);
        assert_eq!(Value::Object(summary), json!({"total_items": 1}));
    }

    #[test]
    fn category_distribution_is_opt_in() {
        let categorizer = Categorizer::default();
        let items = vec![
            json!({"id": 1, "status": "open", "subject": "Refund for invoice"}),
            json!({"id": 2, "status": "new", "subject": "Hello"}),
        ];
        let summary = SummaryBuilder::with_categories(&categorizer).summarize(&items);
        assert_eq!(
            summary["category_distribution"],
            json!({"billing": 1, "other": 1})
        );
    }
}

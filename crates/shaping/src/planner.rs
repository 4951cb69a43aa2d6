use helpdesk_protocol::estimate_size;
use serde::Serialize;
use std::fmt;

use crate::config::ShapingConfig;

/// How many items of `items` fit in `max_bytes`.
///
/// Uses the first item as the representative size instead of summing every item: planning
/// stays O(1) in the candidate count, and the assembler re-measures the built envelope anyway.
/// Never returns zero for a non-empty input, even if the first item alone is over budget.
pub fn plan_page_size<T: Serialize + fmt::Debug>(
    items: &[T],
    max_bytes: usize,
    config: &ShapingConfig,
) -> usize {
    let Some(first) = items.first() else {
        return config.default_limit;
    };

    let item_size = estimate_size(first).max(1);
    let available = max_bytes.saturating_sub(config.page_overhead);
    let fits = available / item_size;

    fits.min(items.len()).min(config.max_limit).max(1)
}

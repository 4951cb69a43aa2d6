use helpdesk_protocol::{DEFAULT_LIMIT, DEFAULT_MAX_RESPONSE_LENGTH, MAX_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapingError};

/// Collection keys the assembler knows how to paginate inside a mapping payload.
pub const DEFAULT_COLLECTION_KEYS: &[&str] = &[
    "tickets",
    "users",
    "organizations",
    "results",
    "comments",
    "audits",
    "ratings",
    "articles",
];

/// Configuration for response shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    /// Default response budget (bytes of the rendered payload)
    pub max_response_length: usize,

    /// Page size used when there is nothing to measure
    pub default_limit: usize,

    /// Hard ceiling on items per page
    pub max_limit: usize,

    /// Envelope allowance subtracted before dividing the budget by the item size
    pub page_overhead: usize,

    /// Allowance for pagination and summary scaffolding in greedy truncation;
    /// also the slack tolerated over the budget once an envelope is built
    pub truncation_reserve: usize,

    /// Room kept free for the suffix of a raw text truncation
    pub text_suffix_reserve: usize,

    /// A newline is an acceptable cut point if it sits at or after this percentage of the target
    pub newline_backoff_percent: usize,

    /// Mapping keys treated as the paginated collection of a payload
    pub collection_keys: Vec<String>,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            max_response_length: DEFAULT_MAX_RESPONSE_LENGTH,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            page_overhead: 200,
            truncation_reserve: 500,
            text_suffix_reserve: 200,
            newline_backoff_percent: 80,
            collection_keys: DEFAULT_COLLECTION_KEYS
                .iter()
                .map(|key| (*key).to_string())
                .collect(),
        }
    }
}

impl ShapingConfig {
    /// Copy of this config with a different default budget
    #[must_use]
    pub fn with_max_response_length(mut self, max_response_length: usize) -> Self {
        self.max_response_length = max_response_length;
        self
    }

    /// Copy of this config with different page limits
    #[must_use]
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    pub fn is_collection_key(&self, key: &str) -> bool {
        self.collection_keys.iter().any(|known| known == key)
    }

    /// Clamp a caller-requested page size into `1..=max_limit`.
    #[must_use]
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            return Err(ShapingError::invalid_config("max_limit must be > 0"));
        }

        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ShapingError::invalid_config(format!(
                "default_limit ({}) must be within 1..={}",
                self.default_limit, self.max_limit
            )));
        }

        if self.max_response_length == 0 {
            return Err(ShapingError::invalid_config(
                "max_response_length must be > 0",
            ));
        }

        if self.newline_backoff_percent > 100 {
            return Err(ShapingError::invalid_config(format!(
                "newline_backoff_percent ({}) cannot exceed 100",
                self.newline_backoff_percent
            )));
        }

        if self.collection_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(ShapingError::invalid_config(
                "collection_keys must not contain empty keys",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let config = ShapingConfig::default();
        assert_eq!(config.max_response_length, 2_000);
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_limit, 20);
        assert!(config.validate().is_ok());
        assert!(config.is_collection_key("tickets"));
        assert!(!config.is_collection_key("query"));
    }

    #[test]
    fn rejects_default_above_ceiling() {
        let config = ShapingConfig::default().with_limits(30, 20);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn clamp_limit_respects_ceiling_and_floor() {
        let config = ShapingConfig::default();
        assert_eq!(config.clamp_limit(None), 10);
        assert_eq!(config.clamp_limit(Some(0)), 1);
        assert_eq!(config.clamp_limit(Some(500)), 20);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: ShapingConfig =
            serde_json::from_str(r#"{"max_response_length": 4000}"#).unwrap();
        assert_eq!(config.max_response_length, 4_000);
        assert_eq!(config.max_limit, 20);
        assert_eq!(config.truncation_reserve, 500);
    }
}

//! Keyword-table categorization of ticket-like records.
//!
//! Rules are data: an ordered list of categories with keyword lists, plus auxiliary tags that are
//! assigned independently of the primary score. The built-in table ships in
//! `rules/categories.json`; deployments can load their own with [`CategoryRules::from_file`].
//!
//! Ties are intentionally not broken. When several categories share the top score, all of them
//! are reported (in table order), so a record can legitimately land in more than one category
//! and [`Categorizer::categorize_many`] counts can add up to more than the number of records.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ShapingError};
use crate::project::{first_text, string_list};

const BUILTIN_RULES: &str = include_str!("../rules/categories.json");
const RULES_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuxiliaryRule {
    pub tag: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Tag the record when its combined text is at least this long.
    #[serde(default)]
    pub min_text_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawRules {
    schema_version: Option<u32>,
    fallback: Option<String>,
    categories: Vec<CategoryRule>,
    #[serde(default)]
    auxiliary: Vec<AuxiliaryRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    categories: Vec<CategoryRule>,
    auxiliary: Vec<AuxiliaryRule>,
    fallback: String,
}

impl CategoryRules {
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_RULES).unwrap_or_else(|err| {
            log::error!("built-in category rules are invalid: {err}");
            Self {
                categories: Vec::new(),
                auxiliary: Vec::new(),
                fallback: "other".to_string(),
            }
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let raw: RawRules =
            serde_json::from_str(raw).map_err(|err| ShapingError::invalid_rules(err.to_string()))?;

        if let Some(version) = raw.schema_version {
            if version != RULES_SCHEMA_VERSION {
                return Err(ShapingError::invalid_rules(format!(
                    "schema_version {version} is not supported (expected {RULES_SCHEMA_VERSION})"
                )));
            }
        }

        let rules = Self {
            categories: raw
                .categories
                .into_iter()
                .map(|rule| CategoryRule {
                    category: rule.category.trim().to_string(),
                    keywords: normalize_keywords(rule.keywords),
                })
                .collect(),
            auxiliary: raw
                .auxiliary
                .into_iter()
                .map(|rule| AuxiliaryRule {
                    tag: rule.tag.trim().to_string(),
                    keywords: normalize_keywords(rule.keywords),
                    min_text_chars: rule.min_text_chars,
                })
                .collect(),
            fallback: raw
                .fallback
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| "other".to_string()),
        };
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = Vec::new();
        for rule in &self.categories {
            if rule.category.is_empty() {
                return Err(ShapingError::invalid_rules("category name must not be empty"));
            }
            if rule.keywords.is_empty() {
                return Err(ShapingError::invalid_rules(format!(
                    "category '{}' has no keywords",
                    rule.category
                )));
            }
            if seen.contains(&rule.category.as_str()) {
                return Err(ShapingError::invalid_rules(format!(
                    "category '{}' is declared twice",
                    rule.category
                )));
            }
            seen.push(rule.category.as_str());
        }
        if seen.contains(&self.fallback.as_str()) {
            return Err(ShapingError::invalid_rules(format!(
                "fallback '{}' collides with a scored category",
                self.fallback
            )));
        }
        for rule in &self.auxiliary {
            if rule.tag.is_empty() {
                return Err(ShapingError::invalid_rules("auxiliary tag must not be empty"));
            }
            if rule.keywords.is_empty() && rule.min_text_chars.is_none() {
                return Err(ShapingError::invalid_rules(format!(
                    "auxiliary tag '{}' has no trigger",
                    rule.tag
                )));
            }
        }
        Ok(())
    }

    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Scores lower-cased record text against one keyword list.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, text: &str, keywords: &[String]) -> usize;
}

/// Counts how many distinct keywords occur anywhere in the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistinctKeywordHits;

impl ScoringStrategy for DistinctKeywordHits {
    fn score(&self, text: &str, keywords: &[String]) -> usize {
        keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Categorization {
    /// Top-scoring categories in rule order, or the fallback alone.
    pub categories: Vec<String>,
    pub auxiliary_tags: Vec<String>,
}

impl Categorization {
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .chain(self.auxiliary_tags.iter())
            .map(String::as_str)
    }
}

pub struct Categorizer {
    rules: CategoryRules,
    scorer: Box<dyn ScoringStrategy>,
}

impl std::fmt::Debug for Categorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Categorizer")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(CategoryRules::builtin())
    }
}

impl Categorizer {
    #[must_use]
    pub fn new(rules: CategoryRules) -> Self {
        Self::with_scorer(rules, Box::new(DistinctKeywordHits))
    }

    #[must_use]
    pub fn with_scorer(rules: CategoryRules, scorer: Box<dyn ScoringStrategy>) -> Self {
        Self { rules, scorer }
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn categorize(&self, record: &Value) -> Categorization {
        let text = searchable_text(record);

        let scores: Vec<(&str, usize)> = self
            .rules
            .categories
            .iter()
            .map(|rule| (rule.category.as_str(), self.scorer.score(&text, &rule.keywords)))
            .collect();
        let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);

        let categories = if best == 0 {
            vec![self.rules.fallback.clone()]
        } else {
            scores
                .iter()
                .filter(|(_, score)| *score == best)
                .map(|(category, _)| (*category).to_string())
                .collect()
        };

        let text_chars = text.chars().count();
        let auxiliary_tags = self
            .rules
            .auxiliary
            .iter()
            .filter(|rule| {
                let by_length = rule.min_text_chars.is_some_and(|min| text_chars >= min);
                let by_keyword = !rule.keywords.is_empty()
                    && self.scorer.score(&text, &rule.keywords) > 0;
                by_length || by_keyword
            })
            .map(|rule| rule.tag.clone())
            .collect();

        Categorization {
            categories,
            auxiliary_tags,
        }
    }

    /// Primary category counts across `records`. Tied records count once per category.
    pub fn categorize_many(&self, records: &[Value]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in records {
            for category in self.categorize(record).categories {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Title, body and tags of a record joined into one lower-cased string.
fn searchable_text(record: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = first_text(record, &["subject", "title"]) {
        parts.push(title.to_string());
    }
    if let Some(body) = first_text(record, &["description", "body"]) {
        parts.push(body.to_string());
    }
    let tags = string_list(record, "tags");
    if !tags.is_empty() {
        parts.push(tags.join(" "));
    }
    parts.join(" ").to_lowercase()
}

use helpdesk_shaping::{Categorizer, CategoryRules, ShapingConfig};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_KB_TTL: Duration = Duration::from_secs(3_600);

/// Server settings resolved from `HELPDESK_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub shaping: ShapingConfig,
    pub category_rules: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub kb_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shaping: ShapingConfig::default(),
            category_rules: None,
            snapshot_path: None,
            kb_ttl: DEFAULT_KB_TTL,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Invalid values are logged and replaced by defaults; startup never fails on configuration.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| {
            let raw = read(key)?;
            match raw.parse::<usize>() {
                Ok(value) if value > 0 => Some(value),
                _ => {
                    log::warn!("Ignoring {key}={raw:?}: expected a positive integer");
                    None
                }
            }
        };

        let defaults = ShapingConfig::default();
        let mut shaping = defaults.clone();
        if let Some(value) = number("HELPDESK_MAX_RESPONSE_LENGTH") {
            shaping.max_response_length = value;
        }
        if let Some(value) = number("HELPDESK_DEFAULT_LIMIT") {
            shaping.default_limit = value;
        }
        if let Some(value) = number("HELPDESK_MAX_LIMIT") {
            shaping.max_limit = value;
        }
        if let Err(err) = shaping.validate() {
            log::warn!("{err}; falling back to default shaping limits");
            shaping = defaults;
        }

        let kb_ttl = number("HELPDESK_KB_TTL_SECS")
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(DEFAULT_KB_TTL);

        Self {
            shaping,
            category_rules: read("HELPDESK_CATEGORY_RULES").map(PathBuf::from),
            snapshot_path: read("HELPDESK_SNAPSHOT_PATH").map(PathBuf::from),
            kb_ttl,
        }
    }

    pub fn categorizer(&self) -> Categorizer {
        let Some(path) = &self.category_rules else {
            return Categorizer::default();
        };
        match CategoryRules::from_file(path) {
            Ok(rules) => Categorizer::new(rules),
            Err(err) => {
                log::warn!(
                    "Failed to load category rules from {}: {err}; falling back to builtin rules",
                    path.display()
                );
                Categorizer::default()
            }
        }
    }
}

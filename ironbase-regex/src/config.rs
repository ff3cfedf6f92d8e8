// ironbase-regex/src/config.rs
// Engine limits and cache sizing

use crate::error::{RegexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default step budget, same as PCRE2's built-in match limit
pub const DEFAULT_MATCH_LIMIT: u64 = 10_000_000;
pub const DEFAULT_NEST_LIMIT: u32 = 250;
pub const DEFAULT_MAX_PROGRAM_LEN: usize = 1_000_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Configuration for pattern compilation, matching and caching
///
/// Every field is optional in the JSON form; missing fields take their defaults.
///
/// ```
/// use ironbase_regex::RegexConfig;
///
/// let config = RegexConfig::from_json_str(r#"{"match_limit": 5000}"#).unwrap();
/// assert_eq!(config.match_limit, 5000);
/// assert_eq!(config.cache_capacity, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexConfig {
    /// Upper bound on match work per search. A `(*LIMIT_MATCH=n)` directive can
    /// only lower it.
    pub match_limit: u64,

    /// Maximum nesting depth accepted by the pattern parser
    pub nest_limit: u32,

    /// Maximum number of compiled instructions for one pattern
    pub max_program_len: usize,

    /// Number of compiled patterns kept by a [`PatternCache`](crate::PatternCache)
    pub cache_capacity: usize,
}

impl Default for RegexConfig {
    fn default() -> Self {
        RegexConfig {
            match_limit: DEFAULT_MATCH_LIMIT,
            nest_limit: DEFAULT_NEST_LIMIT,
            max_program_len: DEFAULT_MAX_PROGRAM_LEN,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl RegexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match_limit(mut self, match_limit: u64) -> Self {
        self.match_limit = match_limit;
        self
    }

    pub fn with_nest_limit(mut self, nest_limit: u32) -> Self {
        self.nest_limit = nest_limit;
        self
    }

    pub fn with_max_program_len(mut self, max_program_len: usize) -> Self {
        self.max_program_len = max_program_len;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RegexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Defaults overridden by `IRONBASE_REGEX_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RegexConfig::default();
        if let Some(v) = lookup("IRONBASE_REGEX_MATCH_LIMIT") {
            config.match_limit = parse_number("IRONBASE_REGEX_MATCH_LIMIT", &v)?;
        }
        if let Some(v) = lookup("IRONBASE_REGEX_NEST_LIMIT") {
            config.nest_limit = parse_number("IRONBASE_REGEX_NEST_LIMIT", &v)?;
        }
        if let Some(v) = lookup("IRONBASE_REGEX_MAX_PROGRAM") {
            config.max_program_len = parse_number("IRONBASE_REGEX_MAX_PROGRAM", &v)?;
        }
        if let Some(v) = lookup("IRONBASE_REGEX_CACHE_CAPACITY") {
            config.cache_capacity = parse_number("IRONBASE_REGEX_CACHE_CAPACITY", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.match_limit == 0 {
            return Err(RegexError::Config("match_limit must be at least 1".to_string()));
        }
        if self.nest_limit == 0 {
            return Err(RegexError::Config("nest_limit must be at least 1".to_string()));
        }
        if self.max_program_len == 0 {
            return Err(RegexError::Config(
                "max_program_len must be at least 1".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(RegexError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RegexError::Config(format!("{} is not a valid number: '{}'", key, value)))
}

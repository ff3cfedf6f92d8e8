// ironbase-regex/src/lib.rs
// $regexFind / $regexFindAll / $regexMatch with PCRE-style start options

pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod logging;
pub mod pattern_cache;
pub mod result;
pub mod validate;
pub mod value_utils;

// Public exports
pub use config::RegexConfig;
pub use engine::{Captures, FlagSet, MatchError, Newline, Pattern, StartOptions};
pub use error::{ErrorKind, RegexError, Result};
pub use expression::{evaluate_expression, Operand, RegexExpression, RegexOperator};
pub use logging::{get_log_level, init_from_env, set_log_level, LogLevel};
pub use pattern_cache::{global_cache, CacheStats, PatternCache};
pub use result::{project, MatchResult};
pub use validate::{validate, RegexSource, ValidatedSpec};

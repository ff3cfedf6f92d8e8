// ironbase-regex/src/error.rs
// Error types for regex expression parsing, validation and compilation

use thiserror::Error;

/// Operator name used for errors raised below the expression layer
/// (e.g. by `Pattern::new` called directly).
pub const ENGINE_OP: &str = "$regex";

/// Programmatic classification of a [`RegexError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgumentType,
    UnknownArgument,
    UnknownOperator,
    InputMustBeString,
    InvalidRegexType,
    OptionsMustBeString,
    OptionsConflict,
    InvalidOptionFlag,
    EmbeddedNulInPattern,
    EmbeddedNulInOptions,
    FailedToParseRegex,
    Config,
    Io,
    Serialization,
}

#[derive(Error, Debug)]
pub enum RegexError {
    #[error("{op} expects an object of named arguments but found: {found}")]
    InvalidArgumentType { op: &'static str, found: &'static str },

    #[error("{op} found an unknown argument: {name}")]
    UnknownArgument { op: &'static str, name: String },

    #[error("Unknown regex expression operator: {0}")]
    UnknownOperator(String),

    #[error("{op} needs 'input' to be of type string, found: {found}")]
    InputMustBeString { op: &'static str, found: &'static str },

    #[error("{op} needs 'regex' to be of type string or regex, found: {found}")]
    InvalidRegexType { op: &'static str, found: &'static str },

    #[error("{op} needs 'options' to be of type string, found: {found}")]
    OptionsMustBeString { op: &'static str, found: &'static str },

    #[error("{op}: found regex option(s) specified in both 'regex' and 'options' fields")]
    OptionsConflict { op: &'static str },

    #[error("{op}: invalid flag in regex options: {flag}")]
    InvalidOptionFlag { op: &'static str, flag: char },

    #[error("{op}: regular expression cannot contain an embedded null byte")]
    EmbeddedNulInPattern { op: &'static str },

    #[error("{op}: regular expression options cannot contain an embedded null byte")]
    EmbeddedNulInOptions { op: &'static str },

    #[error("{op}: invalid regular expression: {reason}")]
    FailedToParseRegex { op: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegexError::InvalidArgumentType { .. } => ErrorKind::InvalidArgumentType,
            RegexError::UnknownArgument { .. } => ErrorKind::UnknownArgument,
            RegexError::UnknownOperator(_) => ErrorKind::UnknownOperator,
            RegexError::InputMustBeString { .. } => ErrorKind::InputMustBeString,
            RegexError::InvalidRegexType { .. } => ErrorKind::InvalidRegexType,
            RegexError::OptionsMustBeString { .. } => ErrorKind::OptionsMustBeString,
            RegexError::OptionsConflict { .. } => ErrorKind::OptionsConflict,
            RegexError::InvalidOptionFlag { .. } => ErrorKind::InvalidOptionFlag,
            RegexError::EmbeddedNulInPattern { .. } => ErrorKind::EmbeddedNulInPattern,
            RegexError::EmbeddedNulInOptions { .. } => ErrorKind::EmbeddedNulInOptions,
            RegexError::FailedToParseRegex { .. } => ErrorKind::FailedToParseRegex,
            RegexError::Config(_) => ErrorKind::Config,
            RegexError::Io(_) => ErrorKind::Io,
            RegexError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Stable numeric code, matching the server's assertion codes where one exists
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::InvalidArgumentType => 51103,
            ErrorKind::UnknownArgument => 31024,
            ErrorKind::UnknownOperator => 168,
            ErrorKind::InputMustBeString => 51104,
            ErrorKind::InvalidRegexType => 51105,
            ErrorKind::OptionsMustBeString => 51106,
            ErrorKind::OptionsConflict => 51107,
            ErrorKind::InvalidOptionFlag => 51108,
            ErrorKind::EmbeddedNulInPattern => 51109,
            ErrorKind::EmbeddedNulInOptions => 51110,
            ErrorKind::FailedToParseRegex => 51111,
            ErrorKind::Config => 2,
            ErrorKind::Io => 1,
            ErrorKind::Serialization => 9,
        }
    }

    /// Re-tag an error raised by the engine with the operator that triggered it
    pub fn in_operator(self, name: &'static str) -> Self {
        match self {
            RegexError::InvalidArgumentType { found, .. } => {
                RegexError::InvalidArgumentType { op: name, found }
            }
            RegexError::UnknownArgument { name: arg, .. } => {
                RegexError::UnknownArgument { op: name, name: arg }
            }
            RegexError::InputMustBeString { found, .. } => {
                RegexError::InputMustBeString { op: name, found }
            }
            RegexError::InvalidRegexType { found, .. } => {
                RegexError::InvalidRegexType { op: name, found }
            }
            RegexError::OptionsMustBeString { found, .. } => {
                RegexError::OptionsMustBeString { op: name, found }
            }
            RegexError::OptionsConflict { .. } => RegexError::OptionsConflict { op: name },
            RegexError::InvalidOptionFlag { flag, .. } => {
                RegexError::InvalidOptionFlag { op: name, flag }
            }
            RegexError::EmbeddedNulInPattern { .. } => RegexError::EmbeddedNulInPattern { op: name },
            RegexError::EmbeddedNulInOptions { .. } => RegexError::EmbeddedNulInOptions { op: name },
            RegexError::FailedToParseRegex { reason, .. } => {
                RegexError::FailedToParseRegex { op: name, reason }
            }
            other => other,
        }
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        RegexError::FailedToParseRegex {
            op: ENGINE_OP,
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RegexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_validation_kinds() {
        let errors = vec![
            RegexError::InputMustBeString { op: "$regexFind", found: "int" },
            RegexError::InvalidRegexType { op: "$regexFind", found: "int" },
            RegexError::OptionsMustBeString { op: "$regexFind", found: "int" },
            RegexError::OptionsConflict { op: "$regexFind" },
            RegexError::InvalidOptionFlag { op: "$regexFind", flag: 'I' },
            RegexError::EmbeddedNulInPattern { op: "$regexFind" },
            RegexError::EmbeddedNulInOptions { op: "$regexFind" },
            RegexError::parse("bad"),
        ];
        let mut codes: Vec<u32> = errors.iter().map(RegexError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_in_operator_retags_message() {
        let err = RegexError::parse("unclosed group").in_operator("$regexMatch");
        assert_eq!(err.kind(), ErrorKind::FailedToParseRegex);
        assert!(err.to_string().starts_with("$regexMatch:"));
    }

    #[test]
    fn test_in_operator_keeps_ambient_errors() {
        let err = RegexError::Config("zero".to_string()).in_operator("$regexFind");
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

// ironbase-regex/src/validate.rs
// Shape checks on resolved {input, regex, options} values, run before compiling

use crate::config::RegexConfig;
use crate::engine::{check_embedded_nul, resolve_flags, Pattern};
use crate::error::{RegexError, Result};
use crate::value_utils::type_name;
use serde_json::Value;

/// Argument names accepted by every regex operator
pub const ARGUMENTS: [&str; 3] = ["input", "regex", "options"];

/// Where a pattern came from: a regex literal carries its own flags, a plain
/// string does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexSource<'a> {
    Literal { pattern: &'a str, flags: &'a str },
    Pattern(&'a str),
}

impl<'a> RegexSource<'a> {
    pub fn pattern(&self) -> &'a str {
        match self {
            RegexSource::Literal { pattern, .. } | RegexSource::Pattern(pattern) => *pattern,
        }
    }

    /// Flags embedded in a literal; `None` for a plain string
    pub fn literal_flags(&self) -> Option<&'a str> {
        match self {
            RegexSource::Literal { flags, .. } => Some(*flags),
            RegexSource::Pattern(_) => None,
        }
    }
}

/// Recognise an Extended JSON regex literal:
/// `{"$regularExpression": {"pattern": P, "options": F}}` or
/// `{"$regex": P, "$options": F}` with `$options` optional.
pub fn parse_regex_literal(value: &Value) -> Option<RegexSource<'_>> {
    let map = value.as_object()?;

    if let Some(inner) = map.get("$regularExpression") {
        if map.len() != 1 {
            return None;
        }
        let inner = inner.as_object()?;
        let pattern = inner.get("pattern")?.as_str()?;
        let flags = match inner.get("options") {
            Some(options) => options.as_str()?,
            None => "",
        };
        if inner.keys().any(|k| k != "pattern" && k != "options") {
            return None;
        }
        return Some(RegexSource::Literal { pattern, flags });
    }

    let pattern = map.get("$regex")?.as_str()?;
    let flags = match map.get("$options") {
        Some(options) => options.as_str()?,
        None => "",
    };
    if map.keys().any(|k| k != "$regex" && k != "$options") {
        return None;
    }
    Some(RegexSource::Literal { pattern, flags })
}

/// A pattern and the options text it compiles with, after conflict and NUL
/// checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRegex<'a> {
    pub pattern: &'a str,
    pub options: &'a str,
}

impl ResolvedRegex<'_> {
    pub fn compile(&self, op: &'static str, config: &RegexConfig) -> Result<Pattern> {
        Pattern::with_config(self.pattern, self.options, config).map_err(|e| e.in_operator(op))
    }
}

/// Outcome of validating one `{input, regex, options}` triple. A `None`
/// field means there is nothing to match, which yields the null result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSpec<'a> {
    pub input: Option<&'a str>,
    pub regex: Option<ResolvedRegex<'a>>,
}

impl ValidatedSpec<'_> {
    pub fn is_null(&self) -> bool {
        self.input.is_none() || self.regex.is_none()
    }
}

/// `input` must be a string; missing or null means no match
pub fn check_input<'a>(op: &'static str, input: Option<&'a Value>) -> Result<Option<&'a str>> {
    match input {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(RegexError::InputMustBeString {
            op,
            found: type_name(other),
        }),
    }
}

/// `regex` must be a string or regex literal; missing or null means no match
pub fn check_regex<'a>(op: &'static str, regex: Option<&'a Value>) -> Result<Option<RegexSource<'a>>> {
    match regex {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(RegexSource::Pattern(s.as_str()))),
        Some(other) => parse_regex_literal(other)
            .map(Some)
            .ok_or_else(|| RegexError::InvalidRegexType {
                op,
                found: type_name(other),
            }),
    }
}

/// `options` must be a string. An explicit null counts as supplied (`""`),
/// so it still conflicts with literal flags.
pub fn check_options<'a>(op: &'static str, options: Option<&'a Value>) -> Result<Option<&'a str>> {
    match options {
        None => Ok(None),
        Some(Value::Null) => Ok(Some("")),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(RegexError::OptionsMustBeString {
            op,
            found: type_name(other),
        }),
    }
}

/// Regex and options checks in error-code order: regex type, options type,
/// flag conflict, NUL in pattern, NUL in options. Flag characters and pattern
/// syntax are checked when compiling.
pub fn resolve_regex<'a>(
    op: &'static str,
    regex: Option<&'a Value>,
    options: Option<&'a Value>,
) -> Result<Option<ResolvedRegex<'a>>> {
    let source = check_regex(op, regex)?;
    let options = check_options(op, options)?;
    let Some(source) = source else {
        return Ok(None);
    };

    let options = resolve_flags(source.literal_flags(), options).map_err(|e| e.in_operator(op))?;
    let pattern = source.pattern();
    check_embedded_nul(pattern, options).map_err(|e| e.in_operator(op))?;
    Ok(Some(ResolvedRegex { pattern, options }))
}

/// Validate already-resolved argument values
pub fn validate_values<'a>(
    op: &'static str,
    input: Option<&'a Value>,
    regex: Option<&'a Value>,
    options: Option<&'a Value>,
) -> Result<ValidatedSpec<'a>> {
    let input = check_input(op, input)?;
    let regex = resolve_regex(op, regex, options)?;
    Ok(ValidatedSpec { input, regex })
}

/// Validate a whole argument object whose values are already resolved
pub fn validate<'a>(op: &'static str, spec: &'a Value) -> Result<ValidatedSpec<'a>> {
    let map = check_spec_shape(op, spec)?;
    validate_values(op, map.get("input"), map.get("regex"), map.get("options"))
}

/// The argument object must be an object with only known argument names
pub fn check_spec_shape<'a>(
    op: &'static str,
    spec: &'a Value,
) -> Result<&'a serde_json::Map<String, Value>> {
    let map = spec.as_object().ok_or_else(|| RegexError::InvalidArgumentType {
        op,
        found: type_name(spec),
    })?;
    if let Some(name) = map.keys().find(|k| !ARGUMENTS.contains(&k.as_str())) {
        return Err(RegexError::UnknownArgument {
            op,
            name: name.clone(),
        });
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const OP: &str = "$regexFind";

    fn kind(spec: Value) -> ErrorKind {
        validate(OP, &spec).unwrap_err().kind()
    }

    #[test]
    fn test_literal_forms() {
        let canonical = json!({"$regularExpression": {"pattern": "a", "options": "i"}});
        let legacy = json!({"$regex": "a", "$options": "i"});
        let bare = json!({"$regex": "a"});
        let expected = RegexSource::Literal { pattern: "a", flags: "i" };
        assert_eq!(parse_regex_literal(&canonical), Some(expected.clone()));
        assert_eq!(parse_regex_literal(&legacy), Some(expected));
        assert_eq!(
            parse_regex_literal(&bare),
            Some(RegexSource::Literal { pattern: "a", flags: "" })
        );
        assert_eq!(parse_regex_literal(&json!({"$regex": 1})), None);
        assert_eq!(parse_regex_literal(&json!({"$regex": "a", "x": 1})), None);
    }

    #[test]
    fn test_spec_must_be_object() {
        assert_eq!(kind(json!("abc")), ErrorKind::InvalidArgumentType);
        assert_eq!(kind(json!({"input": "a", "flags": "i"})), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_missing_pieces_are_null() {
        assert!(validate(OP, &json!({"input": "a"})).unwrap().is_null());
        assert!(validate(OP, &json!({"regex": "a"})).unwrap().is_null());
        assert!(validate(OP, &json!({"input": null, "regex": null})).unwrap().is_null());
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(kind(json!({"input": 1, "regex": "a"})), ErrorKind::InputMustBeString);
        assert_eq!(kind(json!({"input": "a", "regex": 1})), ErrorKind::InvalidRegexType);
        assert_eq!(
            kind(json!({"input": "a", "regex": "a", "options": 1})),
            ErrorKind::OptionsMustBeString
        );
        // Options type is checked even without a regex
        assert_eq!(kind(json!({"input": "a", "options": 1})), ErrorKind::OptionsMustBeString);
    }

    #[test]
    fn test_conflict_even_with_empty_or_null_options() {
        for options in [json!(""), json!(null), json!("i")] {
            let spec = json!({"input": "a", "regex": {"$regex": "a", "$options": "m"}, "options": options});
            assert_eq!(kind(spec), ErrorKind::OptionsConflict);
        }
        let spec = json!({"input": "a", "regex": {"$regex": "a", "$options": ""}, "options": "i"});
        assert_eq!(validate(OP, &spec).unwrap().regex.unwrap().options, "i");
    }

    #[test]
    fn test_error_precedence() {
        // Conflict wins over NUL, NUL in pattern wins over NUL in options
        let spec = json!({"regex": {"$regex": "a\u{0}", "$options": "i"}, "options": "\u{0}"});
        assert_eq!(kind(spec), ErrorKind::OptionsConflict);
        let spec = json!({"regex": "a\u{0}", "options": "\u{0}"});
        assert_eq!(kind(spec), ErrorKind::EmbeddedNulInPattern);
        let spec = json!({"regex": "a", "options": "i\u{0}"});
        assert_eq!(kind(spec), ErrorKind::EmbeddedNulInOptions);
    }

    #[test]
    fn test_error_carries_operator() {
        let err = validate("$regexMatch", &json!({"regex": "a\u{0}b"})).unwrap_err();
        assert!(err.to_string().starts_with("$regexMatch"));
    }

    #[test]
    fn test_compile_resolved() {
        let spec = json!({"input": "a", "regex": "(", "options": ""});
        let validated = validate(OP, &spec).unwrap();
        let err = validated.regex.unwrap().compile(OP, &RegexConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedToParseRegex);
    }
}

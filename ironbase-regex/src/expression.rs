// ironbase-regex/src/expression.rs
//! `$regexFind`, `$regexFindAll` and `$regexMatch` expressions
//!
//! Each operator is a strategy object implementing [`RegexOperator`]; the
//! operators only differ in how a compiled pattern is applied to the input
//! and in their null result. Everything else (argument parsing, operand
//! resolution, validation, compilation) is shared by [`RegexExpression`].
//!
//! ```text
//! {"$regexFind": {"input": "$text", "regex": "(m(p))"}}
//!        │
//!        ▼
//! RegexExpression::from_json ──► OPERATOR_REGISTRY["$regexFind"]
//!        │
//!        ▼  per document
//! resolve operands ─► validate ─► Pattern (precompiled or cached) ─► apply
//! ```

use crate::engine::Pattern;
use crate::error::{RegexError, Result, ENGINE_OP};
use crate::pattern_cache::{global_cache, PatternCache};
use crate::result::{project, MatchResult};
use crate::validate::{check_input, check_spec_shape, resolve_regex};
use crate::value_utils::{get_nested_value, type_name};
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An operator argument: a field path (`"$a.b"`) or a constant
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Constant(Value),
}

impl Operand {
    /// Strings starting with `$` are field paths; `{"$literal": v}` is the
    /// constant `v`
    pub fn parse(value: &Value) -> Operand {
        match value {
            Value::String(s) if s.starts_with('$') => Operand::Field(s[1..].to_string()),
            Value::Object(map) if map.len() == 1 && map.contains_key("$literal") => {
                Operand::Constant(map["$literal"].clone())
            }
            other => Operand::Constant(other.clone()),
        }
    }

    pub fn resolve<'a>(&'a self, doc: &'a Value) -> Option<&'a Value> {
        match self {
            Operand::Field(path) => get_nested_value(doc, path),
            Operand::Constant(value) => Some(value),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }
}

/// Strategy for applying a compiled pattern to an input string
pub trait RegexOperator: Send + Sync + std::fmt::Debug {
    /// Operator name, e.g. `"$regexFind"`
    fn name(&self) -> &'static str;

    /// Result when there is nothing to match (missing input or regex)
    fn null_result(&self) -> Value;

    fn apply(&self, pattern: &Pattern, input: &str) -> Value;
}

/// `$regexFind`: first match or null
#[derive(Debug)]
pub struct FindOperator;

impl RegexOperator for FindOperator {
    fn name(&self) -> &'static str {
        "$regexFind"
    }

    fn null_result(&self) -> Value {
        Value::Null
    }

    fn apply(&self, pattern: &Pattern, input: &str) -> Value {
        project(MatchResult::find(pattern, input).as_ref())
    }
}

/// `$regexFindAll`: every non-overlapping match
#[derive(Debug)]
pub struct FindAllOperator;

impl RegexOperator for FindAllOperator {
    fn name(&self) -> &'static str {
        "$regexFindAll"
    }

    fn null_result(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn apply(&self, pattern: &Pattern, input: &str) -> Value {
        Value::Array(
            MatchResult::find_all(pattern, input)
                .iter()
                .map(MatchResult::to_value)
                .collect(),
        )
    }
}

/// `$regexMatch`: whether any match exists
#[derive(Debug)]
pub struct MatchOperator;

impl RegexOperator for MatchOperator {
    fn name(&self) -> &'static str {
        "$regexMatch"
    }

    fn null_result(&self) -> Value {
        Value::Bool(false)
    }

    fn apply(&self, pattern: &Pattern, input: &str) -> Value {
        Value::Bool(pattern.is_match(input))
    }
}

lazy_static! {
    /// Global registry of regex expression operators, keyed by name
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn RegexOperator>> = {
        let mut registry: HashMap<&'static str, Box<dyn RegexOperator>> = HashMap::new();
        for operator in [
            Box::new(FindOperator) as Box<dyn RegexOperator>,
            Box::new(FindAllOperator),
            Box::new(MatchOperator),
        ] {
            registry.insert(operator.name(), operator);
        }
        registry
    };
}

#[derive(Debug, Clone)]
enum Compiled {
    /// Regex or options come from the document
    Dynamic,
    /// Constant regex that is absent or null
    Null,
    Constant(Arc<Pattern>),
}

/// A parsed regex expression, ready to evaluate against documents
#[derive(Debug, Clone)]
pub struct RegexExpression {
    operator: &'static dyn RegexOperator,
    input: Option<Operand>,
    regex: Option<Operand>,
    options: Option<Operand>,
    compiled: Compiled,
    cache: Arc<PatternCache>,
}

impl RegexExpression {
    /// Parse the wrapped form `{"$regexFind": {...}}`
    pub fn from_json(expr: &Value) -> Result<Self> {
        Self::from_json_with_cache(expr, global_cache())
    }

    pub fn from_json_with_cache(expr: &Value, cache: Arc<PatternCache>) -> Result<Self> {
        match expr.as_object() {
            Some(map) if map.len() == 1 => {
                let (op, spec) = map.iter().next().ok_or_else(|| {
                    RegexError::UnknownOperator(String::new())
                })?;
                Self::parse_with_cache(op, spec, cache)
            }
            _ => Err(RegexError::InvalidArgumentType {
                op: ENGINE_OP,
                found: type_name(expr),
            }),
        }
    }

    /// Parse the named-argument object of operator `op`
    pub fn parse(op: &str, spec: &Value) -> Result<Self> {
        Self::parse_with_cache(op, spec, global_cache())
    }

    /// Constant regex and options are validated and compiled here, once.
    pub fn parse_with_cache(op: &str, spec: &Value, cache: Arc<PatternCache>) -> Result<Self> {
        let operator = OPERATOR_REGISTRY
            .get(op)
            .ok_or_else(|| RegexError::UnknownOperator(op.to_string()))?
            .as_ref();
        let name = operator.name();
        let map = check_spec_shape(name, spec)?;

        let input = map.get("input").map(Operand::parse);
        let regex = map.get("regex").map(Operand::parse);
        let options = map.get("options").map(Operand::parse);

        let no_document = Value::Null;
        let constant = |operand: &Option<Operand>| operand.as_ref().map_or(true, Operand::is_constant);
        let compiled = if constant(&regex) && constant(&options) {
            let resolved = resolve_regex(
                name,
                regex.as_ref().and_then(|r| r.resolve(&no_document)),
                options.as_ref().and_then(|o| o.resolve(&no_document)),
            )?;
            match resolved {
                Some(resolved) => Compiled::Constant(
                    cache
                        .get_or_compile(resolved.pattern, resolved.options)
                        .map_err(|e| e.in_operator(name))?,
                ),
                None => Compiled::Null,
            }
        } else {
            Compiled::Dynamic
        };

        Ok(RegexExpression {
            operator,
            input,
            regex,
            options,
            compiled,
            cache,
        })
    }

    pub fn operator_name(&self) -> &'static str {
        self.operator.name()
    }

    /// The pattern compiled at parse time, if regex and options were constant
    pub fn precompiled(&self) -> Option<&Pattern> {
        match &self.compiled {
            Compiled::Constant(pattern) => Some(pattern.as_ref()),
            _ => None,
        }
    }

    /// Evaluate against one document
    pub fn evaluate(&self, doc: &Value) -> Result<Value> {
        let name = self.operator.name();
        let input = check_input(name, self.input.as_ref().and_then(|i| i.resolve(doc)))?;

        let pattern = match &self.compiled {
            Compiled::Constant(pattern) => Arc::clone(pattern),
            Compiled::Null => return Ok(self.operator.null_result()),
            Compiled::Dynamic => {
                let resolved = resolve_regex(
                    name,
                    self.regex.as_ref().and_then(|r| r.resolve(doc)),
                    self.options.as_ref().and_then(|o| o.resolve(doc)),
                )?;
                let Some(resolved) = resolved else {
                    return Ok(self.operator.null_result());
                };
                self.cache
                    .get_or_compile(resolved.pattern, resolved.options)
                    .map_err(|e| e.in_operator(name))?
            }
        };

        match input {
            Some(input) => Ok(self.operator.apply(&pattern, input)),
            None => Ok(self.operator.null_result()),
        }
    }
}

/// Parse `expr` and evaluate it against a single document
pub fn evaluate_expression(expr: &Value, doc: &Value) -> Result<Value> {
    RegexExpression::from_json(expr)?.evaluate(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn eval(expr: Value, doc: Value) -> Result<Value> {
        evaluate_expression(&expr, &doc)
    }

    #[test]
    fn test_operand_parse() {
        assert_eq!(Operand::parse(&json!("$a.b")), Operand::Field("a.b".to_string()));
        assert_eq!(Operand::parse(&json!("abc")), Operand::Constant(json!("abc")));
        assert_eq!(
            Operand::parse(&json!({"$literal": "$notAField"})),
            Operand::Constant(json!("$notAField"))
        );
    }

    #[test]
    fn test_registry_contains_all_operators() {
        for name in ["$regexFind", "$regexFindAll", "$regexMatch"] {
            assert_eq!(OPERATOR_REGISTRY[name].name(), name);
        }
    }

    #[test]
    fn test_find_on_field() {
        let result = eval(
            json!({"$regexFind": {"input": "$text", "regex": "(m(p))"}}),
            json!({"text": "Simple Example"}),
        )
        .unwrap();
        assert_eq!(result, json!({"match": "mp", "idx": 2, "captures": ["mp", "p"]}));
    }

    #[test]
    fn test_null_results_per_operator() {
        let doc = json!({});
        assert_eq!(eval(json!({"$regexFind": {"input": "$x", "regex": "a"}}), doc.clone()).unwrap(), Value::Null);
        assert_eq!(eval(json!({"$regexFindAll": {"input": "$x", "regex": "a"}}), doc.clone()).unwrap(), json!([]));
        assert_eq!(eval(json!({"$regexMatch": {"input": "a", "regex": null}}), doc).unwrap(), json!(false));
    }

    #[test]
    fn test_constant_regex_precompiled() {
        let expr = RegexExpression::parse("$regexMatch", &json!({"input": "$t", "regex": "a+"})).unwrap();
        assert!(expr.precompiled().is_some());
        let expr = RegexExpression::parse("$regexMatch", &json!({"input": "$t", "regex": "$r"})).unwrap();
        assert!(expr.precompiled().is_none());
    }

    #[test]
    fn test_constant_errors_raised_at_parse() {
        let err = RegexExpression::parse("$regexFind", &json!({"input": "$t", "regex": "(", "options": ""}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedToParseRegex);
        assert!(err.to_string().starts_with("$regexFind"));
    }

    #[test]
    fn test_dynamic_regex_from_document() {
        let expr = json!({"$regexMatch": {"input": "$t", "regex": "$r", "options": "$o"}});
        assert_eq!(eval(expr.clone(), json!({"t": "Camel", "r": "camel", "o": "i"})).unwrap(), json!(true));
        assert_eq!(eval(expr.clone(), json!({"t": "Camel", "r": "camel"})).unwrap(), json!(false));
        let err = eval(expr, json!({"t": "Camel", "r": "camel", "o": "I"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptionFlag);
    }

    #[test]
    fn test_input_type_error() {
        let err = eval(json!({"$regexFind": {"input": "$n", "regex": "a"}}), json!({"n": 5})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMustBeString);
        assert_eq!(err.code(), 51104);
    }

    #[test]
    fn test_unknown_operator_and_argument() {
        let err = eval(json!({"$regexReplace": {}}), json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperator);
        let err = eval(json!({"$regexFind": {"input": "a", "pattern": "a"}}), json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        let err = eval(json!({"$regexFind": ["a"]}), json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
    }

    #[test]
    fn test_find_all_shapes() {
        let result = eval(
            json!({"$regexFindAll": {"input": "a1b22", "regex": "([a-z])(\\d+)"}}),
            json!({}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!([
                {"match": "a1", "idx": 0, "captures": ["a", "1"]},
                {"match": "b22", "idx": 2, "captures": ["b", "22"]}
            ])
        );
    }
}

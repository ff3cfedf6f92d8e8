// ironbase-regex/src/result.rs
// Projection of raw captures into the {match, idx, captures} document shape

use crate::engine::{Captures, Pattern};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One match, with `idx` counted in codepoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "match")]
    pub matched: String,
    pub idx: usize,
    /// One entry per capturing group in pattern order, `None` when the group
    /// did not participate
    pub captures: Vec<Option<String>>,
}

impl MatchResult {
    /// Build from captures whose overall match starts at codepoint `idx`
    pub fn from_captures(caps: &Captures<'_>, idx: usize) -> Self {
        MatchResult {
            matched: caps.as_str(0).unwrap_or_default().to_string(),
            idx,
            captures: caps.groups().map(|g| g.map(str::to_string)).collect(),
        }
    }

    /// First match of `pattern` in `input`
    pub fn find(pattern: &Pattern, input: &str) -> Option<Self> {
        let caps = pattern.find(input)?;
        let idx = codepoint_offset(input, caps.start());
        Some(Self::from_captures(&caps, idx))
    }

    /// All non-overlapping matches. Codepoint offsets are counted
    /// incrementally so the input is walked once.
    pub fn find_all(pattern: &Pattern, input: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let (mut byte_pos, mut char_pos) = (0, 0);
        for caps in pattern.find_iter(input) {
            char_pos += input[byte_pos..caps.start()].chars().count();
            byte_pos = caps.start();
            results.push(Self::from_captures(&caps, char_pos));
        }
        results
    }

    pub fn to_value(&self) -> Value {
        json!({
            "match": self.matched,
            "idx": self.idx,
            "captures": self.captures,
        })
    }
}

/// `{match, idx, captures}` for a match, `null` otherwise
pub fn project(result: Option<&MatchResult>) -> Value {
    result.map_or(Value::Null, MatchResult::to_value)
}

/// Number of codepoints before byte offset `byte` of `haystack`
pub fn codepoint_offset(haystack: &str, byte: usize) -> usize {
    haystack[..byte].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_match() {
        let pattern = Pattern::new("(m(p))", "").unwrap();
        let result = MatchResult::find(&pattern, "Simple Example");
        assert_eq!(
            project(result.as_ref()),
            json!({"match": "mp", "idx": 2, "captures": ["mp", "p"]})
        );
    }

    #[test]
    fn test_project_no_match_is_null() {
        let pattern = Pattern::new("camel", "").unwrap();
        assert_eq!(project(MatchResult::find(&pattern, "Camel").as_ref()), Value::Null);
    }

    #[test]
    fn test_unmatched_group_is_null() {
        let pattern = Pattern::new("(a)|(b)", "").unwrap();
        let result = MatchResult::find(&pattern, "b").unwrap();
        assert_eq!(result.captures, vec![None, Some("b".to_string())]);
        assert_eq!(result.to_value()["captures"], json!([null, "b"]));
    }

    #[test]
    fn test_codepoint_idx() {
        let pattern = Pattern::new("té", "").unwrap();
        assert_eq!(MatchResult::find(&pattern, "cafétéria").unwrap().idx, 4);
    }

    #[test]
    fn test_find_all_idx_is_cumulative() {
        let pattern = Pattern::new("é.", "").unwrap();
        let idx: Vec<usize> = MatchResult::find_all(&pattern, "cafétéria")
            .iter()
            .map(|r| r.idx)
            .collect();
        assert_eq!(idx, vec![3, 5]);
    }

    #[test]
    fn test_serde_shape_matches_to_value() {
        let result = MatchResult {
            matched: "Foo".to_string(),
            idx: 0,
            captures: vec![],
        };
        assert_eq!(serde_json::to_value(&result).unwrap(), result.to_value());
    }
}

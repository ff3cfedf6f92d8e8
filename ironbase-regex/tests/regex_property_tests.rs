// regex_property_tests.rs
// Property tests: capture counts, codepoint indexes, repeatability

use ironbase_regex::{project, MatchResult, Pattern};
use proptest::prelude::*;

/// Text mixing ASCII with multi-byte scripts
fn mixed_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just('a'),
            Just('b'),
            Just(' '),
            Just('é'),
            Just('ज'),
            Just('한'),
            Just('日'),
            Just('\0'),
        ],
        0..24,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_capture_count_matches_group_count(text in mixed_text(), groups in 0usize..5) {
        // (a)?(a)?... always matches, possibly with every group unset
        let source = "(a)?".repeat(groups);
        let pattern = Pattern::new(&source, "").unwrap();
        let result = MatchResult::find(&pattern, &text).unwrap();
        prop_assert_eq!(result.captures.len(), groups);
    }

    #[test]
    fn prop_idx_is_codepoint_offset(text in mixed_text()) {
        let pattern = Pattern::new("한|日", "").unwrap();
        if let Some(result) = MatchResult::find(&pattern, &text) {
            let chars: Vec<char> = text.chars().collect();
            let found: String = chars[result.idx..].iter().take(1).collect();
            prop_assert_eq!(found, result.matched);
        } else {
            prop_assert!(!text.contains('한') && !text.contains('日'));
        }
    }

    #[test]
    fn prop_find_all_idx_strictly_increases(text in mixed_text()) {
        let pattern = Pattern::new("[^ ]+", "").unwrap();
        let results = MatchResult::find_all(&pattern, &text);
        for pair in results.windows(2) {
            prop_assert!(pair[0].idx < pair[1].idx);
        }
        let joined: Vec<String> = results.iter().map(|r| r.matched.clone()).collect();
        let expected: Vec<String> = text.split(' ').filter(|w| !w.is_empty()).map(str::to_string).collect();
        prop_assert_eq!(joined, expected);
    }

    #[test]
    fn prop_projection_is_repeatable(text in mixed_text()) {
        let pattern = Pattern::new("(é)|(\\0)", "").unwrap();
        let first = project(MatchResult::find(&pattern, &text).as_ref());
        let second = project(MatchResult::find(&pattern, &text).as_ref());
        prop_assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn prop_invalid_flags_rejected(flag in "[a-zA-Z]") {
        let result = Pattern::new("a", &flag);
        let valid = matches!(flag.as_str(), "i" | "m" | "s" | "x");
        prop_assert_eq!(result.is_ok(), valid);
    }
}

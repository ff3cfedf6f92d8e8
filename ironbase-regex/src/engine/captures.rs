//! Byte-offset capture spans produced by a successful search.

use std::ops::Range;

/// The spans of one match: group 0 is the overall match, groups `1..len()`
/// follow the order of their opening parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures<'h> {
    haystack: &'h str,
    slots: Vec<Option<usize>>,
}

#[allow(clippy::len_without_is_empty)]
impl<'h> Captures<'h> {
    pub(crate) fn new(haystack: &'h str, slots: Vec<Option<usize>>) -> Self {
        Captures { haystack, slots }
    }

    /// Number of groups including group 0
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    /// Byte range of group `index`, `None` when the group did not take part
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        let start = (*self.slots.get(2 * index)?)?;
        let end = (*self.slots.get(2 * index + 1)?)?;
        Some(start..end)
    }

    pub fn as_str(&self, index: usize) -> Option<&'h str> {
        self.get(index).map(|span| &self.haystack[span])
    }

    /// Byte offset where the overall match starts
    pub fn start(&self) -> usize {
        self.get(0).map_or(0, |span| span.start)
    }

    /// Byte offset where the overall match ends
    pub fn end(&self) -> usize {
        self.get(0).map_or(0, |span| span.end)
    }

    pub fn haystack(&self) -> &'h str {
        self.haystack
    }

    /// Texts of the explicit groups, `None` for groups that did not participate
    pub fn groups(&self) -> impl Iterator<Item = Option<&'h str>> + '_ {
        (1..self.len()).map(move |index| self.as_str(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let caps = Captures::new("Simple", vec![Some(2), Some(4), Some(3), Some(4), None, None]);
        assert_eq!(caps.len(), 3);
        assert_eq!(caps.as_str(0), Some("mp"));
        assert_eq!(caps.get(1), Some(3..4));
        assert_eq!(caps.as_str(2), None);
        assert_eq!(caps.as_str(7), None);
        assert_eq!((caps.start(), caps.end()), (2, 4));
        assert_eq!(caps.groups().collect::<Vec<_>>(), vec![Some("p"), None]);
    }
}

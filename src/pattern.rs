//! # Topic pattern matching.
//!
//! Topics are dot-segmented strings (`orders.eu.created`). Patterns have the same
//! shape and may use `*` as a whole-segment wildcard.
//!
//! ## Rules (in priority order)
//! ```text
//! "*" or "#"          → matches every topic (including "")
//! pattern == topic    → matches
//! no '*' in pattern   → no match
//! otherwise           → same segment count, '*' matches one non-empty segment,
//!                       every other segment must be equal
//! ```
//!
//! A `*` never spans several segments: `user.*` does not match `user.profile.updated`.

const SEPARATOR: char = '.';
const WILDCARD: &str = "*";
const CATCH_ALL: &str = "#";

/// Returns `true` if `topic` matches `pattern`.
///
/// ```
/// use topicbus::pattern::matches;
///
/// assert!(matches("user.*", "user.created"));
/// assert!(!matches("user.*", "order.created"));
/// assert!(!matches("user.*", "user.profile.updated"));
/// assert!(matches("#", ""));
/// ```
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == WILDCARD || pattern == CATCH_ALL {
        return true;
    }
    if pattern == topic {
        return true;
    }
    if !pattern.contains(WILDCARD) {
        return false;
    }

    let mut pattern_parts = pattern.split(SEPARATOR);
    let mut topic_parts = topic.split(SEPARATOR);
    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (None, None) => return true,
            (Some(p), Some(t)) => {
                let ok = if p == WILDCARD { !t.is_empty() } else { p == t };
                if !ok {
                    return false;
                }
            }
            // segment counts differ
            _ => return false,
        }
    }
}

/// Returns every pattern from `patterns` that matches `topic`, in input order.
///
/// Mainly useful for diagnostics ("which of my subscriptions would see this topic?").
pub fn match_multiple<'a, I>(patterns: I, topic: &str) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    patterns
        .into_iter()
        .filter(|p| matches(p, topic))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_all_matches_everything() {
        for topic in ["", "a", "a.b", "user.profile.updated"] {
            assert!(matches("*", topic), "* should match {topic:?}");
            assert!(matches("#", topic), "# should match {topic:?}");
        }
    }

    #[test]
    fn exact_match() {
        assert!(matches("user.created", "user.created"));
        assert!(!matches("user.created", "user.updated"));
        assert!(!matches("user", "user.created"));
    }

    #[test]
    fn literal_pattern_never_matches_other_topics() {
        assert!(!matches("orders", ""));
        assert!(!matches("a.b", "a.b.c"));
        assert!(!matches("", "a"));
    }

    #[test]
    fn single_segment_wildcards() {
        assert!(matches("user.*", "user.created"));
        assert!(!matches("user.*", "order.created"));
        assert!(!matches("user.*", "user.profile.updated"));
        assert!(matches("*.created", "order.created"));
        assert!(matches("a.*.c", "a.b.c"));
        assert!(!matches("a.*.c", "a.b.d"));
        assert!(matches("*.*", "x.y"));
    }

    #[test]
    fn wildcard_requires_non_empty_segment() {
        assert!(!matches("user.*", "user."));
        assert!(!matches("*.created", ".created"));
    }

    #[test]
    fn wildcard_inside_a_segment_is_literal() {
        assert!(!matches("user.cre*", "user.created"));
        assert!(matches("user.cre*", "user.cre*"));
    }

    #[test]
    fn match_multiple_keeps_input_order() {
        let patterns = ["order.*", "user.*", "*", "user.created", "*.deleted"];
        let hits = match_multiple(patterns, "user.created");
        assert_eq!(hits, vec!["user.*", "*", "user.created"]);
        assert!(match_multiple(["a", "b"], "c").is_empty());
    }
}

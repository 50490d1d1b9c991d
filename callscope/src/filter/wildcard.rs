//! Wildcard name matching.
//!
//! Patterns support `*` (any run of characters, including empty) and `?`
//! (exactly one character). Matching is case-insensitive over ASCII; frame
//! names come from runtime metadata and casing there is not trustworthy.

/// True if `name` matches the glob `pattern`.
#[must_use]
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let name: Vec<char> = name.chars().map(|c| c.to_ascii_lowercase()).collect();
    matches_at(&pattern, &name)
}

/// True if `name` matches any of the patterns. An empty list matches
/// nothing.
#[must_use]
pub fn any_match(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pattern| matches(pattern, name))
}

/// True if the pattern can only ever match everything.
#[must_use]
pub fn is_match_all(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.chars().all(|c| c == '*')
}

/// True if every pattern in the list is a match-all pattern.
#[must_use]
pub fn all_match_all(patterns: &[String]) -> bool {
    !patterns.is_empty() && patterns.iter().all(|pattern| is_match_all(pattern))
}

// Iterative with single-star backtracking; patterns are short and names are
// method names, so no memo table is warranted.
fn matches_at(pattern: &[char], name: &[char]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            // Let the last star absorb one more character and retry.
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_star() {
        assert!(matches("Program.Main", "Program.Main"));
        assert!(matches("*second*", "Test.second"));
        assert!(matches("*second*", "secondary"));
        assert!(!matches("*second*", "Test.first"));
        assert!(matches("*", ""));
        assert!(matches("*", "anything"));
    }

    #[test]
    fn question_mark_is_exactly_one() {
        assert!(matches("f?o", "foo"));
        assert!(!matches("f?o", "fo"));
        assert!(!matches("f?o", "fooo"));
    }

    #[test]
    fn case_insensitive() {
        assert!(matches("program.main", "Program.Main"));
        assert!(matches("*MAIN*", "Program.main"));
    }

    #[test]
    fn star_backtracking() {
        assert!(matches("*a*b", "xaxbxb"));
        assert!(!matches("*a*b", "xaxbx"));
        assert!(matches("a**b", "ab"));
    }

    #[test]
    fn empty_pattern_matches_only_empty() {
        assert!(matches("", ""));
        assert!(!matches("", "x"));
    }

    #[test]
    fn match_all_detection() {
        assert!(is_match_all("*"));
        assert!(is_match_all("***"));
        assert!(!is_match_all(""));
        assert!(!is_match_all("*a*"));
        assert!(all_match_all(&["*".to_string(), "**".to_string()]));
        assert!(!all_match_all(&[]));
        assert!(!all_match_all(&["*".to_string(), "x".to_string()]));
    }

    #[test]
    fn empty_list_matches_nothing() {
        assert!(!any_match(&[], "anything"));
    }
}

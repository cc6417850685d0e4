//! Positional placeholder substitution.
//!
//! Markers are `%1` through `%99` (optionally written `%L1`), replaced by
//! `args[index - 1]` wherever they appear, so translations may reorder them.
//! `%n` (or `%Ln`) is replaced by the plural count when one is supplied.
//! Substitution is a single pass: inserted values are never scanned for
//! markers.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::error::LookupError;

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%(?:L?([1-9][0-9]?)|L?n)").unwrap());

/// Substitute markers, failing on the first marker without an argument.
pub fn try_substitute(
    template: &str,
    args: &[&dyn ToString],
    count: Option<u64>,
) -> Result<String, LookupError> {
    let (text, missing) = expand(template, args, count);
    match missing.first() {
        Some(&index) => Err(LookupError::MissingArgument {
            index,
            supplied: args.len(),
        }),
        None => Ok(text),
    }
}

/// Substitute markers, leaving markers without an argument in place.
pub fn substitute(template: &str, args: &[&dyn ToString], count: Option<u64>) -> String {
    let (text, missing) = expand(template, args, count);
    for index in missing {
        let err = LookupError::MissingArgument {
            index,
            supplied: args.len(),
        };
        warn!(template, "{err}");
    }
    text
}

/// Highest marker index used in `template`, if any.
pub fn highest_marker(template: &str) -> Option<usize> {
    MARKER_RE
        .captures_iter(template)
        .filter_map(|caps| marker_index(&caps))
        .max()
}

fn expand(template: &str, args: &[&dyn ToString], count: Option<u64>) -> (String, Vec<usize>) {
    if !template.contains('%') {
        return (template.to_string(), Vec::new());
    }

    let mut missing = Vec::new();
    let text = MARKER_RE.replace_all(template, |caps: &Captures<'_>| {
        let literal = caps[0].to_string();
        match marker_index(caps) {
            Some(index) => match args.get(index - 1) {
                Some(arg) => arg.to_string(),
                None => {
                    if !missing.contains(&index) {
                        missing.push(index);
                    }
                    literal
                }
            },
            // %n
            None => count.map_or(literal, |n| n.to_string()),
        }
    });
    (text.into_owned(), missing)
}

fn marker_index(caps: &Captures<'_>) -> Option<usize> {
    caps.get(1).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_by_index_not_position() {
        assert_eq!(
            substitute("%2 z %1", &[&"first", &"second"], None),
            "second z first"
        );
    }

    #[test]
    fn repeated_marker() {
        assert_eq!(substitute("%1 a %1", &[&7], None), "7 a 7");
    }

    #[test]
    fn locale_marker_form() {
        assert_eq!(substitute("Velikost: %L1", &[&1024], None), "Velikost: 1024");
        assert_eq!(substitute("%Ln soubory", &[], Some(3)), "3 soubory");
    }

    #[test]
    fn missing_argument_leaves_marker() {
        assert_eq!(substitute("%1 a %3", &[&"x"], None), "x a %3");
        assert_eq!(
            try_substitute("%1 a %3", &[&"x"], None),
            Err(LookupError::MissingArgument {
                index: 3,
                supplied: 1
            })
        );
    }

    #[test]
    fn lone_percent_passes_through() {
        assert_eq!(substitute("100 % hotovo", &[], None), "100 % hotovo");
        assert_eq!(substitute("%", &[], None), "%");
        assert_eq!(substitute("%x %0", &[&"a"], None), "%x %0");
        assert_eq!(try_substitute("50%", &[], None), Ok("50%".to_string()));
    }

    #[test]
    fn count_marker() {
        assert_eq!(substitute("%n záznamů", &[], Some(12)), "12 záznamů");
        assert_eq!(substitute("%n záznamů", &[], None), "%n záznamů");
    }

    #[test]
    fn values_are_not_rescanned() {
        assert_eq!(substitute("%1 %2", &[&"%2", &"b"], None), "%2 b");
    }

    #[test]
    fn two_digit_markers() {
        let args: Vec<String> = (1..=10).map(|i| format!("a{i}")).collect();
        let refs: Vec<&dyn ToString> = args.iter().map(|a| a as &dyn ToString).collect();
        assert_eq!(substitute("%10-%1", &refs, None), "a10-a1");
        assert_eq!(highest_marker("%10-%1"), Some(10));
        assert_eq!(highest_marker("nothing"), None);
    }
}

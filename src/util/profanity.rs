//! Blocklist check for user supplied names (players, locations, accounts).

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

const BLOCKED_WORDS: &[&str] = &[
    "ass",
    "asshole",
    "bastard",
    "bitch",
    "bollocks",
    "bullshit",
    "cock",
    "crap",
    "cunt",
    "damn",
    "dick",
    "dildo",
    "douche",
    "fag",
    "fuck",
    "jackass",
    "jerkoff",
    "motherfucker",
    "nigger",
    "piss",
    "prick",
    "pussy",
    "retard",
    "shit",
    "slut",
    "twat",
    "wank",
    "whore",
];

lazy_static! {
    static ref BLOCKED_PATTERN: Regex = RegexBuilder::new(&blocked_pattern())
        .case_insensitive(true)
        .build()
        .expect("blocked word pattern compiles");
}

/// Whether `text` contains a blocked word anywhere, including inside longer words
/// and with common look-alike characters substituted.
pub fn contains_blocked_word(text: &str) -> bool {
    BLOCKED_PATTERN.is_match(text)
}

fn blocked_pattern() -> String {
    BLOCKED_WORDS
        .iter()
        .map(|word| word.chars().map(letter_class).collect::<String>())
        .collect::<Vec<_>>()
        .join("|")
}

fn letter_class(letter: char) -> String {
    match letter {
        'a' => "[a4@]".to_owned(),
        'e' => "[e3]".to_owned(),
        'i' => "[i1!]".to_owned(),
        'o' => "[o0]".to_owned(),
        's' => "[s5$]".to_owned(),
        't' => "[t7+]".to_owned(),
        'l' => "[l1|]".to_owned(),
        'c' => "[c(]".to_owned(),
        'b' => "[b8]".to_owned(),
        'g' => "[g9]".to_owned(),
        other => regex::escape(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_substitutions_are_caught() {
        assert!(contains_blocked_word("h3llo a55"));
        assert!(contains_blocked_word("5h17"));
        assert!(contains_blocked_word("B!TCH"));
    }

    #[test]
    fn friendly_text_passes() {
        assert!(!contains_blocked_word("hello friend"));
        assert!(!contains_blocked_word("Windmill Hole 7"));
        assert!(!contains_blocked_word(""));
    }

    #[test]
    fn match_is_substring_based() {
        assert!(contains_blocked_word("grassland"));
        assert!(contains_blocked_word("xXcr4pXx"));
    }

    #[test]
    fn pattern_uses_letter_classes() {
        assert_eq!(letter_class('a'), "[a4@]");
        assert_eq!(letter_class('k'), "k");
        assert!(blocked_pattern().starts_with("[a4@][s5$][s5$]|"));
    }
}

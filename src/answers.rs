//! Free-text answer parsing for questionnaire stages
//!
//! Answers are rated on a small integer scale (1..=5 by default). The
//! first number in the reply decides; decimals and out-of-range values
//! are rejected. Number words are accepted when no digits are present.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(zero|one|two|three|four|five|six|seven|eight|nine|ten)\b").unwrap()
});

const WORDS: [&str; 11] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

/// Rating in `min..=max` from free text, or `None`
pub fn parse_answer(text: &str, min: u8, max: u8) -> Option<u8> {
    let value = match NUMBER_RE.find(text) {
        Some(m) => {
            let token = m.as_str();
            if token.contains(['.', ',']) {
                return None;
            }
            token.parse::<u32>().ok()?
        }
        None => {
            let word = WORD_RE.find(text)?.as_str().to_lowercase();
            WORDS.iter().position(|w| *w == word)? as u32
        }
    };

    if value < u32::from(min) || value > u32::from(max) {
        return None;
    }
    u8::try_from(value).ok()
}

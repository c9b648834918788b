// src/tokenizer.rs
//! Shared text utilities: stopword-filtered word tokens, token counts and
//! digit-run extraction.
//!
//! Tokenization is ASCII-only: lowercase, word characters
//! between word boundaries. Non-ASCII letters act as separators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\b\w+\b").expect("word regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\d+").expect("digit regex"));

/// Function words dropped before any overlap arithmetic.
pub const STOPWORDS: &[&str] = &[
    "the", "is", "are", "a", "an", "to", "of", "and", "in", "for", "on", "with", "that", "this",
    "it", "as", "at", "by", "from", "or", "be",
];

#[inline]
fn is_stopword(tok: &str) -> bool {
    STOPWORDS.contains(&tok)
}

/// Lowercased word tokens with stopwords removed, in input order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Multiset view of a token sequence.
pub fn token_counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut out: HashMap<&str, usize> = HashMap::with_capacity(tokens.len());
    for t in tokens {
        *out.entry(t.as_str()).or_insert(0) += 1;
    }
    out
}

/// Non-negative integer literal of any length, kept as canonical decimal
/// digits (no leading zeros, `"0"` for zero).
///
/// Ordering is numeric: shorter digit strings are smaller, equal lengths
/// compare lexicographically. Serializes as a JSON integer when it fits
/// `u64`, otherwise as a digit string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NumberLiteral(String);

impl NumberLiteral {
    /// `None` unless `digits` is a non-empty ASCII digit run.
    pub fn parse(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        let canonical = if trimmed.is_empty() { "0" } else { trimmed };
        Some(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for NumberLiteral {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl Ord for NumberLiteral {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NumberLiteral {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NumberLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Debug prints the bare digits so `{:?}` on a list reads `[30, 120]`.
impl fmt::Debug for NumberLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NumberLiteral {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_u64() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for NumberLiteral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Digits(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Int(n) => Ok(n.into()),
            Repr::Digits(s) => NumberLiteral::parse(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("not a digit run: {s:?}"))),
        }
    }
}

/// All digit runs in order of appearance, at full precision.
pub fn extract_numbers(text: &str) -> Vec<NumberLiteral> {
    DIGITS_RE
        .find_iter(text)
        .filter_map(|m| NumberLiteral::parse(m.as_str()))
        .collect()
}

/// Join context passages the way every engine sees them.
pub fn join_context(context: &[String]) -> String {
    context.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_lowercases() {
        let toks = tokenize("The Refund is allowed within 30 days.");
        assert_eq!(toks, vec!["refund", "allowed", "within", "30", "days"]);
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ,,,").is_empty());
        assert!(tokenize("the a an").is_empty());
    }

    #[test]
    fn underscores_are_word_chars() {
        assert_eq!(tokenize("snake_case value"), vec!["snake_case", "value"]);
    }

    #[test]
    fn counts_repeated_tokens() {
        let toks = tokenize("days days policy");
        let c = token_counts(&toks);
        assert_eq!(c.get("days"), Some(&2));
        assert_eq!(c.get("policy"), Some(&1));
    }

    fn nums(values: &[u64]) -> Vec<NumberLiteral> {
        values.iter().copied().map(NumberLiteral::from).collect()
    }

    #[test]
    fn extracts_digit_runs_in_order() {
        assert_eq!(
            extract_numbers("up to 120 days, then 30 and 007"),
            nums(&[120, 30, 7])
        );
        assert!(extract_numbers("no numbers here").is_empty());
        assert_eq!(extract_numbers("000"), nums(&[0]));
    }

    #[test]
    fn long_digit_runs_keep_full_precision() {
        let got = extract_numbers("99999999999999999999999 vs 99999999999999999999998");
        assert_eq!(got[0].as_str(), "99999999999999999999999");
        assert_eq!(got[1].as_str(), "99999999999999999999998");
        assert_ne!(got[0], got[1]);
        assert!(got[1] < got[0]);
        assert!(got[0].to_u64().is_none());
    }

    #[test]
    fn literals_order_numerically() {
        let small = NumberLiteral::parse("0009").unwrap();
        let big = NumberLiteral::parse("10").unwrap();
        assert!(small < big);
        assert_eq!(small, NumberLiteral::from(9));
        assert_eq!(format!("{:?}", nums(&[45, 7])), "[45, 7]");
    }

    #[test]
    fn literals_serialize_as_ints_when_they_fit() {
        let v = serde_json::to_value(extract_numbers("30 and 99999999999999999999999")).unwrap();
        assert_eq!(v, serde_json::json!([30, "99999999999999999999999"]));
        let back: Vec<NumberLiteral> = serde_json::from_value(v).unwrap();
        assert_eq!(back[1].as_str(), "99999999999999999999999");
    }
}

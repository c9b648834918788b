//! Numeric contradiction detector.
//!
//! Rules are evaluated in a fixed order and are not mutually exclusive:
//! 1. a response number missing from the context is a `new_numeric_claim` (MEDIUM);
//! 2. with exactly one number on each side, a larger response value is a
//!    `range_expansion` (HIGH) and a smaller one a `range_reduction` (LOW).
//!
//! Rule 2 overwrites the type and severity set by rule 1. Both rules append a
//! detail line, so the explanation list can mention both while the
//! type/severity fields only keep the last rule that fired.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Severity;
use crate::tokenizer::{extract_numbers, join_context, NumberLiteral};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    NewNumericClaim,
    RangeExpansion,
    RangeReduction,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::NewNumericClaim => "new_numeric_claim",
            ConflictType::RangeExpansion => "range_expansion",
            ConflictType::RangeReduction => "range_reduction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberConflictReport {
    pub conflict: bool,
    pub severity: Severity,
    pub conflict_type: Option<ConflictType>,
    /// Numbers in order of appearance.
    pub context_numbers: Vec<NumberLiteral>,
    pub response_numbers: Vec<NumberLiteral>,
    pub details: Vec<String>,
}

impl NumberConflictReport {
    fn clean(context_numbers: Vec<NumberLiteral>, response_numbers: Vec<NumberLiteral>) -> Self {
        Self {
            conflict: false,
            severity: Severity::None,
            conflict_type: None,
            context_numbers,
            response_numbers,
            details: Vec::new(),
        }
    }

    pub fn context_set(&self) -> BTreeSet<NumberLiteral> {
        self.context_numbers.iter().cloned().collect()
    }

    pub fn response_set(&self) -> BTreeSet<NumberLiteral> {
        self.response_numbers.iter().cloned().collect()
    }

    fn flag(&mut self, kind: ConflictType, severity: Severity, detail: String) {
        self.conflict = true;
        self.conflict_type = Some(kind);
        self.severity = severity;
        self.details.push(detail);
    }
}

/// Compare the integer literals of the joined context against the response.
pub fn detect(context: &[String], response: &str) -> NumberConflictReport {
    let context_numbers = extract_numbers(&join_context(context));
    let response_numbers = extract_numbers(response);

    let mut report = NumberConflictReport::clean(context_numbers, response_numbers);
    if report.context_numbers.is_empty() || report.response_numbers.is_empty() {
        return report;
    }

    let context_set = report.context_set();
    let new_numbers: Vec<NumberLiteral> = report
        .response_set()
        .difference(&context_set)
        .cloned()
        .collect();

    // Rule 1
    if !new_numbers.is_empty() {
        report.flag(
            ConflictType::NewNumericClaim,
            Severity::Medium,
            format!("Response introduces new numbers: {:?}", new_numbers),
        );
    }

    // Rule 2 (overrides rule 1's type/severity)
    if let ([ctx], [resp]) = (
        report.context_numbers.as_slice(),
        report.response_numbers.as_slice(),
    ) {
        let (ctx, resp) = (ctx.clone(), resp.clone());
        if resp > ctx {
            report.flag(
                ConflictType::RangeExpansion,
                Severity::High,
                format!("Response value {resp} exceeds context value {ctx}"),
            );
        } else if resp < ctx {
            report.flag(
                ConflictType::RangeReduction,
                Severity::Low,
                format!("Response value {resp} reduces context value {ctx}"),
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    fn set(values: &[u64]) -> BTreeSet<NumberLiteral> {
        values.iter().copied().map(NumberLiteral::from).collect()
    }

    #[test]
    fn refund_window_expansion_is_high() {
        let r = detect(
            &ctx("Refunds are allowed within 30 days."),
            "Yes, refunds are allowed up to 120 days.",
        );
        assert!(r.conflict);
        assert_eq!(r.conflict_type, Some(ConflictType::RangeExpansion));
        assert_eq!(r.severity, Severity::High);
        assert_eq!(r.context_set(), set(&[30]));
        assert_eq!(r.response_set(), set(&[120]));
        // rule 1 fired first and left its detail behind
        assert_eq!(r.details.len(), 2);
        assert!(r.details[0].contains("new numbers"));
    }

    #[test]
    fn reduction_downgrades_new_claim_to_low() {
        let r = detect(&ctx("Shipping takes 10 days."), "Shipping takes 5 days.");
        assert!(r.conflict);
        assert_eq!(r.conflict_type, Some(ConflictType::RangeReduction));
        assert_eq!(r.severity, Severity::Low);
    }

    #[test]
    fn equal_single_pair_is_clean() {
        let r = detect(&ctx("Refunds within 30 days."), "You have 30 days.");
        assert!(!r.conflict);
        assert_eq!(r.severity, Severity::None);
        assert!(r.conflict_type.is_none());
        assert!(r.details.is_empty());
    }

    #[test]
    fn new_claim_with_multiple_numbers_is_medium() {
        let r = detect(
            &ctx("Plans cost 10 or 20 dollars."),
            "Plans cost 10, 20 or 45 dollars.",
        );
        assert!(r.conflict);
        assert_eq!(r.conflict_type, Some(ConflictType::NewNumericClaim));
        assert_eq!(r.severity, Severity::Medium);
        assert_eq!(r.details, vec!["Response introduces new numbers: [45]".to_string()]);
    }

    #[test]
    fn subset_of_context_numbers_is_clean() {
        let r = detect(&ctx("Options: 1, 2, 3."), "Pick 2.");
        assert!(!r.conflict);
    }

    #[test]
    fn one_side_without_numbers_keeps_sets() {
        let r = detect(&ctx("Refunds within 30 days."), "Refunds are allowed.");
        assert!(!r.conflict);
        assert_eq!(r.context_numbers, vec![NumberLiteral::from(30)]);
        assert!(r.response_numbers.is_empty());

        let r = detect(&[], "Call 555 now");
        assert!(!r.conflict);
        assert_eq!(r.response_numbers, vec![NumberLiteral::from(555)]);
    }

    #[test]
    fn numbers_span_joined_context() {
        let context = vec!["Limit is 3".to_string(), "per day".to_string()];
        let r = detect(&context, "Limit is 3 per day");
        assert!(!r.conflict);
        assert_eq!(r.context_numbers, vec![NumberLiteral::from(3)]);
    }

    #[test]
    fn huge_literals_still_compare() {
        let r = detect(
            &ctx("Limit 99999999999999999999999"),
            "Limit 99999999999999999999998",
        );
        assert!(r.conflict);
        assert_eq!(r.conflict_type, Some(ConflictType::RangeReduction));
        assert_eq!(r.severity, Severity::Low);
        assert_eq!(
            r.details[0],
            "Response introduces new numbers: [99999999999999999999998]"
        );

        let r = detect(
            &ctx("Cap 18446744073709551616"),
            "Cap 18446744073709551617",
        );
        assert_eq!(r.conflict_type, Some(ConflictType::RangeExpansion));
    }

    #[test]
    fn leading_zeros_are_the_same_number() {
        let r = detect(&ctx("Code 007"), "Code 7");
        assert!(!r.conflict);
    }
}

//! Intent Classifier
//!
//! Keyword classification of a turn:
//! - Account status: "내 계좌", "계좌 잔액", ... (checked on the question, short-circuits)
//! - Recommendation: "추천", "recommend", ... (checked on the question)
//! - Interest calculation kinds: checked on the retrieved context, not the question

use crate::models::{CalcKinds, IntentFlags};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerCategory {
    AccountStatus,
    Recommendation,
    SimpleInterest,
    CompoundInterest,
    PeriodTieredRate,
    FlexibleSavings,
}

/// Static keyword lists
const ACCOUNT_STATUS_MARKERS: &[&str] = &[
    "내 계좌", "계좌 상태", "계좌 잔액", "잔액 알려줘", "내 계좌상태 알려줘",
    "계좌 현황", "계좌정보", "계좌 정보",
];

const RECOMMENDATION_MARKERS: &[&str] = &[
    "추천", "recommend", "추천해", "추천해줘", "추천해 주세요", "추천 해줘",
];

const SIMPLE_INTEREST_MARKERS: &[&str] = &["단리"];

// Subsumes 연복리 and 월복리; the prompt composer disambiguates.
const COMPOUND_INTEREST_MARKERS: &[&str] = &["복리", "연복리", "월복리"];

const PERIOD_TIERED_MARKERS: &[&str] = &["가입기간별 기본이자율"];

const FLEXIBLE_SAVINGS_MARKERS: &[&str] = &["자유적금", "자유 적금", "자유적립"];

/// Lookup of marker strings per category.
/// Implementations must be pure: same text, same answer.
pub trait MarkerTable: Send + Sync {
    fn markers(&self, category: MarkerCategory) -> &[String];

    fn matches(&self, category: MarkerCategory, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.markers(category)
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }
}

/// Ordered marker lists keyed by category, seeded from the built-in tables
#[derive(Debug, Clone)]
pub struct KeywordTable {
    table: HashMap<MarkerCategory, Vec<String>>,
}

impl KeywordTable {
    pub fn new() -> Self {
        let seed = |list: &[&str]| list.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();

        let mut table = HashMap::new();
        table.insert(MarkerCategory::AccountStatus, seed(ACCOUNT_STATUS_MARKERS));
        table.insert(MarkerCategory::Recommendation, seed(RECOMMENDATION_MARKERS));
        table.insert(MarkerCategory::SimpleInterest, seed(SIMPLE_INTEREST_MARKERS));
        table.insert(MarkerCategory::CompoundInterest, seed(COMPOUND_INTEREST_MARKERS));
        table.insert(MarkerCategory::PeriodTieredRate, seed(PERIOD_TIERED_MARKERS));
        table.insert(MarkerCategory::FlexibleSavings, seed(FLEXIBLE_SAVINGS_MARKERS));

        Self { table }
    }

    /// Append extra markers to a category
    pub fn extend<I, S>(mut self, category: MarkerCategory, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.table.entry(category).or_default();
        entry.extend(markers.into_iter().map(|m| m.into().to_lowercase()));
        self
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerTable for KeywordTable {
    fn markers(&self, category: MarkerCategory) -> &[String] {
        self.table
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Intent classifier
pub struct IntentClassifier {
    markers: Box<dyn MarkerTable>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::with_markers(Box::new(KeywordTable::new()))
    }

    pub fn with_markers(markers: Box<dyn MarkerTable>) -> Self {
        Self { markers }
    }

    pub fn is_account_status(&self, question: &str) -> bool {
        self.markers.matches(MarkerCategory::AccountStatus, question)
    }

    pub fn is_recommendation(&self, question: &str) -> bool {
        self.markers.matches(MarkerCategory::Recommendation, question)
    }

    /// Interest kinds are read from the context, never the question
    pub fn calc_kinds(&self, context: &str) -> CalcKinds {
        CalcKinds {
            simple: self.markers.matches(MarkerCategory::SimpleInterest, context),
            compound: self.markers.matches(MarkerCategory::CompoundInterest, context),
            period_tiered: self.markers.matches(MarkerCategory::PeriodTieredRate, context),
            flexible: self.markers.matches(MarkerCategory::FlexibleSavings, context),
        }
    }

    /// Full classification. Account status wins: when it is set the other
    /// flags are left empty because that turn never reaches generation.
    pub fn classify(&self, question: &str, context: &str) -> IntentFlags {
        if self.is_account_status(question) {
            return IntentFlags {
                is_account_status: true,
                ..IntentFlags::default()
            };
        }

        IntentFlags {
            is_account_status: false,
            is_recommendation: self.is_recommendation(question),
            calc_kinds: self.calc_kinds(context),
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_status_short_circuits() {
        let classifier = IntentClassifier::new();
        let flags = classifier.classify("내 계좌 정보 알려주고 추천해줘", "단리 상품");

        assert!(flags.is_account_status);
        assert!(!flags.is_recommendation);
        assert!(!flags.calc_kinds.any());
    }

    #[test]
    fn test_recommendation_questions() {
        let classifier = IntentClassifier::new();
        let cases = vec!["추천해줘 예금", "군인 적금 추천 해줘", "Please RECOMMEND a deposit"];

        for c in cases {
            assert!(classifier.classify(c, "").is_recommendation, "{}", c);
        }
    }

    #[test]
    fn test_calc_kinds_come_from_context_only() {
        let classifier = IntentClassifier::new();

        let flags = classifier.classify("단리가 뭐야?", "예금자 보호 제도 안내");
        assert!(!flags.calc_kinds.any());

        let flags = classifier.classify("이 상품 알려줘", "월복리 적용, 가입기간별 기본이자율 표");
        assert!(flags.calc_kinds.compound);
        assert!(flags.calc_kinds.period_tiered);
        assert!(!flags.calc_kinds.simple);
    }

    #[test]
    fn test_faq_question_has_no_flags() {
        let classifier = IntentClassifier::new();
        let flags = classifier.classify("예금자보호법이 뭐야?", "예금자보호법은 ...");
        assert_eq!(flags, IntentFlags::default());
    }

    #[test]
    fn test_extended_table() {
        let table = KeywordTable::new().extend(MarkerCategory::Recommendation, ["골라줘"]);
        let classifier = IntentClassifier::with_markers(Box::new(table));

        assert!(classifier.is_recommendation("적금 하나 골라줘"));
        assert!(classifier.is_recommendation("추천해줘"));
    }
}

//! Whitelist verification for generated answers
//!
//! Institution and product names in a response must belong to a closed,
//! pre-approved vocabulary. Deterministic, fail-fast enforcement.

use lazy_static::lazy_static;
use std::collections::HashSet;
use tracing::{debug, info};

/// Label introducing an institution name on a response line
pub const INSTITUTION_LABEL: &str = "은행명";
/// Label introducing a product name on a response line
pub const PRODUCT_LABEL: &str = "상품명";

const LABEL_SEPARATOR: char = ':';

/// Words dropped during normalization
const STOPWORDS: &[&str] = &["정기"];

const DEFAULT_INSTITUTIONS: &[&str] = &[
    "NH농협은행", "하나은행", "우리은행", "KB국민은행", "토스은행", "신한은행",
    "카카오뱅크", "SBI저축은행", "K뱅크",
];

const DEFAULT_PRODUCTS: &[&str] = &[
    "행복 knowhow 연금예금", "트래블로그 여행 적금", "정기예금", "급여하나 월복리 적금",
    "NH직장인월복리적금", "NH장병내일준비적금", "NH올원e예금", "NH더하고나눔정기예금",
    "NH내가Green초록세상예금", "WON플러스 예금", "WON 적금", "N일 적금(31일)",
    "우리 SUPER주거래 적금", "우리 첫거래우대 정기예금", "KB 국민 UP 정기예금",
    "KB 내맘대로적금", "KB 스타적금", "KB 장병내일준비적금", "직장인우대적금",
    "KB Star 정기예금", "토스뱅크 굴비 적금", "토스뱅크 먼저 이자 받는 정기예금",
    "토스뱅크 자유 적금", "토스뱅크 키워봐요 적금", "Tops CD연동정기예금", "쏠편한 정기예금",
    "신한 My플러스 정기예금", "미래설계 장기플랜 연금예금", "미래설계 크레바스 연금예금",
    "카카오뱅크 정기예금", "희망정기적금", "적립식예금", "회전정기예금", "정기적금",
    "자유적립예금", "자유적금", "손주사랑정기적금", "거치식예금", "코드K정기예금",
    "코드K 자유적금", "주거래우대자유적금",
];

lazy_static! {
    /// Process-wide approved vocabulary, normalized once
    pub static ref DEFAULT_WHITELIST: Whitelist =
        Whitelist::new(DEFAULT_INSTITUTIONS.iter().copied(), DEFAULT_PRODUCTS.iter().copied());
}

/// Strip all whitespace, then remove stopwords
pub fn normalize(text: &str) -> String {
    let mut cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for word in STOPWORDS {
        cleaned = cleaned.replace(word, "");
    }
    cleaned
}

/// Closed vocabulary of institution and product names, stored normalized
#[derive(Debug, Clone)]
pub struct Whitelist {
    institutions: HashSet<String>,
    products: HashSet<String>,
}

impl Whitelist {
    pub fn new<I, P, S, T>(institutions: I, products: P) -> Self
    where
        I: IntoIterator<Item = S>,
        P: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            institutions: institutions.into_iter().map(|s| normalize(s.as_ref())).collect(),
            products: products.into_iter().map(|s| normalize(s.as_ref())).collect(),
        }
    }

    pub fn contains_institution(&self, raw: &str) -> bool {
        self.institutions.contains(&normalize(raw))
    }

    pub fn contains_product(&self, raw: &str) -> bool {
        self.products.contains(&normalize(raw))
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        DEFAULT_WHITELIST.clone()
    }
}

/// First violation found in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UnknownInstitution(String),
    UnknownProduct(String),
}

/// Value of a `label: value` line, taken between the first separator and
/// the next one. `None` when the line carries the label but no separator.
fn labeled_value(line: &str) -> Option<&str> {
    line.split(LABEL_SEPARATOR).nth(1).map(str::trim)
}

/// Checks labeled lines of a response against the whitelist
pub struct WhitelistValidator {
    whitelist: Whitelist,
}

impl WhitelistValidator {
    pub fn new(whitelist: Whitelist) -> Self {
        Self { whitelist }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Scan line by line and stop at the first unknown name.
    /// Lines after a violation are never inspected.
    pub fn first_violation(&self, response: &str) -> Option<Violation> {
        for line in response.lines() {
            if line.contains(INSTITUTION_LABEL) {
                if let Some(bank) = labeled_value(line) {
                    debug!(bank = %bank, "Institution found in response");
                    if !self.whitelist.contains_institution(bank) {
                        return Some(Violation::UnknownInstitution(normalize(bank)));
                    }
                }
            }

            if line.contains(PRODUCT_LABEL) {
                if let Some(product) = labeled_value(line) {
                    debug!(product = %product, "Product found in response");
                    if !self.whitelist.contains_product(product) {
                        return Some(Violation::UnknownProduct(normalize(product)));
                    }
                }
            }
        }

        None
    }

    /// A response without labeled lines passes trivially
    pub fn is_valid(&self, response: &str) -> bool {
        match self.first_violation(response) {
            None => true,
            Some(violation) => {
                info!(?violation, "Whitelist validation failed");
                false
            }
        }
    }
}

impl Default for WhitelistValidator {
    fn default() -> Self {
        Self::new(Whitelist::default())
    }
}

//
// ================= Tests =================
//

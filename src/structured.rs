//! Structured recommendation parsing
//!
//! Best-effort: a JSON object in the output (fenced or bare) must match
//! [`BankProductDetail`]; text without any JSON object is passed through as
//! unstructured.

use crate::verification::{INSTITUTION_LABEL, PRODUCT_LABEL};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankProductDetail {
    pub bank_name: String,
    pub product_name: String,
    /// Months
    #[serde(default)]
    pub subscription_period: Option<u32>,
    /// KRW
    #[serde(default)]
    pub amount: Option<i64>,
    /// Percent
    #[serde(default)]
    pub base_interest_rate: Option<f64>,
    #[serde(default)]
    pub bonus_interest_rate: Option<f64>,
    #[serde(default)]
    pub amount_with_base_interest: Option<i64>,
    #[serde(default)]
    pub amount_with_bonus_interest: Option<i64>,
    #[serde(default)]
    pub requirements_1: Option<String>,
    #[serde(default)]
    pub requirements_2: Option<String>,
    #[serde(default)]
    pub requirements_3: Option<String>,
}

impl BankProductDetail {
    /// Labeled bullet lines, in the same shape the whitelist validator reads
    pub fn render(&self) -> String {
        let won = |v: Option<i64>| {
            v.map(|a| format!("{}원", crate::interest::format_won(a as f64)))
                .unwrap_or_else(|| "-".to_string())
        };
        let pct = |v: Option<f64>| v.map(|r| format!("{}%", r)).unwrap_or_else(|| "-".to_string());

        let mut lines = vec![
            format!("- {}: {}", INSTITUTION_LABEL, self.bank_name),
            format!("- {}: {}", PRODUCT_LABEL, self.product_name),
            format!(
                "- 희망 가입 기간: {}",
                self.subscription_period
                    .map(|m| format!("{}개월", m))
                    .unwrap_or_else(|| "-".to_string())
            ),
            format!("- 가입 금액: {}", won(self.amount)),
            format!("- 상품 기본 금리: {}", pct(self.base_interest_rate)),
            format!("- 우대 금리: {}", pct(self.bonus_interest_rate)),
            format!("- 기본 금리 만기 금액: {}", won(self.amount_with_base_interest)),
            format!("- 우대 금리 만기 금액: {}", won(self.amount_with_bonus_interest)),
        ];

        for (i, req) in [&self.requirements_1, &self.requirements_2, &self.requirements_3]
            .iter()
            .enumerate()
        {
            if let Some(req) = req.as_deref().filter(|r| !r.trim().is_empty()) {
                lines.push(format!("- 우대 조건 ({}): {}", i + 1, req));
            }
        }

        lines.join("\n")
    }
}

/// Tagged result of parsing one generation output
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutcome {
    Structured(BankProductDetail),
    Unstructured(String),
    ParseFault(String),
}

/// Locate a JSON object: a ```json fence first, then the outermost braces
fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim());
        }
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}

pub fn parse_recommendation(output: &str) -> StructuredOutcome {
    let Some(json) = extract_json_object(output) else {
        return StructuredOutcome::Unstructured(output.to_string());
    };

    match serde_json::from_str::<BankProductDetail>(json) {
        Ok(detail) => StructuredOutcome::Structured(detail),
        Err(e) => {
            warn!(
                error = %e,
                output = %output.chars().take(200).collect::<String>(),
                "Could not parse structured recommendation"
            );
            StructuredOutcome::ParseFault(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_is_structured() {
        let output = "추천 상품입니다.\n```json\n{\"bank_name\": \"하나은행\", \"product_name\": \"급여하나 월복리 적금\", \"base_interest_rate\": 3.5, \"requirements_1\": \"급여 이체\"}\n```";

        match parse_recommendation(output) {
            StructuredOutcome::Structured(detail) => {
                assert_eq!(detail.bank_name, "하나은행");
                assert_eq!(detail.base_interest_rate, Some(3.5));
                let rendered = detail.render();
                assert!(rendered.contains("- 은행명: 하나은행"));
                assert!(rendered.contains("- 우대 조건 (1): 급여 이체"));
                assert!(!rendered.contains("우대 조건 (2)"));
            }
            other => panic!("expected structured, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_is_unstructured() {
        let output = "- 은행명 : 하나은행\n- 상품명 : 급여하나 월복리 적금";
        assert_eq!(
            parse_recommendation(output),
            StructuredOutcome::Unstructured(output.to_string())
        );
    }

    #[test]
    fn test_malformed_json_is_parse_fault() {
        let output = "{\"bank_name\": \"하나은행\"";
        // no closing brace: treated as text
        assert!(matches!(parse_recommendation(output), StructuredOutcome::Unstructured(_)));

        let output = "{\"bank_name\": 42}";
        assert!(matches!(parse_recommendation(output), StructuredOutcome::ParseFault(_)));
    }
}

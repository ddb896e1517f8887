//! Prompt Composer
//!
//! Builds the system instruction for one turn as a list of typed sections
//! (instructions, profile, rules, context, calculation guidance, examples,
//! closing directive) and renders them to text last. Rendering is a pure
//! function of the sections, so identical inputs give byte-identical prompts.

pub mod templates;

use crate::models::{CalcKinds, ProductCategory, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::json;
use templates::*;

/// Which compound-interest worked examples to include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundPolicy {
    /// Pick from 월복리 / 연복리 sub-markers in the context; both when ambiguous
    #[default]
    Automatic,
    /// Always include both variants
    Both,
}

impl CompoundPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "automatic" | "auto" => Some(CompoundPolicy::Automatic),
            "both" => Some(CompoundPolicy::Both),
            _ => None,
        }
    }

    /// (monthly, annual)
    pub fn variants(&self, context: &str) -> (bool, bool) {
        match self {
            CompoundPolicy::Both => (true, true),
            CompoundPolicy::Automatic => {
                let monthly = context.contains("월복리");
                let annual = context.contains("연복리");
                match (monthly, annual) {
                    (true, false) => (true, false),
                    (false, true) => (false, true),
                    _ => (true, true),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Instructions,
    Profile,
    Rules,
    Context,
    Calculation,
    Examples,
    Regrounding,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub body: String,
}

/// Accumulates typed sections; only `render` produces text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptBuilder {
    sections: Vec<Section>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: SectionKind, body: impl Into<String>) -> &mut Self {
        self.sections.push(Section {
            kind,
            body: body.into(),
        });
        self
    }

    pub fn has(&self, kind: SectionKind) -> bool {
        self.sections.iter().any(|s| s.kind == kind)
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Append the re-grounding nudge once; later calls are no-ops
    pub fn push_regrounding(&mut self) -> bool {
        if self.has(SectionKind::Regrounding) {
            return false;
        }
        self.push(SectionKind::Regrounding, REGROUNDING_DIRECTIVE);
        true
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&section.body);
        }
        out
    }
}

/// Single-pass `{name}` substitution. Text inserted into a slot is never
/// scanned again, so braces in the context cannot reach other slots.
pub fn fill_slots(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let filled = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (close, *value))
        });

        match filled {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Holdings as a JSON array. Only ever inserted through `fill_slots`, so
/// its braces are never read back as slots and reach the model verbatim.
pub fn balances_json(profile: &UserProfile) -> String {
    let rows: Vec<_> = profile
        .balances()
        .iter()
        .map(|(bank, balance)| json!({ "Bank Name": bank, "Balance": balance }))
        .collect();

    serde_json::Value::Array(rows).to_string()
}

/// Composes prompts from the fixed templates
#[derive(Debug, Clone)]
pub struct PromptComposer {
    template: String,
    compound_policy: CompoundPolicy,
    structured_format: bool,
}

impl PromptComposer {
    pub fn new(compound_policy: CompoundPolicy, structured_format: bool) -> Self {
        Self {
            template: QA_SYSTEM_TEMPLATE.to_string(),
            compound_policy,
            structured_format,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn format_instructions(&self) -> &'static str {
        if self.structured_format {
            STRUCTURED_FORMAT_INSTRUCTIONS
        } else {
            BULLET_FORMAT_INSTRUCTIONS
        }
    }

    pub fn compose(
        &self,
        context: &str,
        question: &str,
        profile: Option<&UserProfile>,
        category: ProductCategory,
        calc_kinds: CalcKinds,
    ) -> PromptBuilder {
        let mut builder = PromptBuilder::new();

        // 1. Base template
        builder.push(
            SectionKind::Instructions,
            fill_slots(
                &self.template,
                &[("format", self.format_instructions()), ("context", context)],
            ),
        );

        // 2. Profile facts and advisory rules
        if let Some(profile) = profile {
            let over_limit = profile.over_limit_institutions();
            let active = profile.active_institutions();

            builder.push(
                SectionKind::Profile,
                fill_slots(PROFILE_TEMPLATE, &[("balances", &balances_json(profile))]),
            );

            let rules = [
                protection_rule(&over_limit),
                SINGLE_PRODUCT_RULE.to_string(),
                prioritized_banks_rule(&active),
                JUSTIFICATION_RULE.to_string(),
                missing_information_rule(),
            ];
            builder.push(SectionKind::Rules, format!("\nRules:\n{}\n", rules.join("\n")));
        }

        // 3. Raw context for direct grounding
        builder.push(SectionKind::Context, format!("\nContext:\n{}\n", context));

        // 4. Calculation guidance
        if calc_kinds.any() {
            builder.push(SectionKind::Calculation, format!("\n{}\n", CALCULATION_DIRECTIVE));
            builder.push(SectionKind::Examples, self.example_library(context));
        }

        // 5. Closing directive
        builder.push(
            SectionKind::Closing,
            format!("\n질문: {} 특히 {}을 선호해\n응답:", question, category.label()),
        );

        builder
    }

    fn example_library(&self, context: &str) -> String {
        let (monthly, annual) = self.compound_policy.variants(context);

        let mut examples = vec![simple_interest_example()];
        if monthly {
            examples.push(monthly_compound_example());
        }
        if annual {
            examples.push(annual_compound_example());
        }
        examples.push(period_tiered_example());
        examples.push(flexible_savings_example());
        examples.push(TAX_NOTE.to_string());

        format!(
            "\nYou are to calculate different types of interest accurately.\n\n{}\n",
            examples.join("\n\n")
        )
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(CompoundPolicy::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Holding;

    fn user_1() -> UserProfile {
        UserProfile::from_holdings(
            "user_1",
            vec![
                Holding { institution: "BankA".into(), balance: 60_000_000 },
                Holding { institution: "BankB".into(), balance: 1_200_000 },
            ],
        )
    }

    fn compound() -> CalcKinds {
        CalcKinds { compound: true, ..CalcKinds::default() }
    }

    #[test]
    fn test_protection_disclosure_scenario() {
        let composer = PromptComposer::default();
        let prompt = composer
            .compose("예금 상품 안내", "추천해줘 예금", Some(&user_1()), ProductCategory::Deposit, CalcKinds::default())
            .render();

        assert!(prompt.contains("예금자 보호법에 따라 BankA 은행 외의 상품을 추천드립니다."));
        assert!(!prompt.contains("None of the user's banks"));
        assert!(prompt.ends_with("질문: 추천해줘 예금 특히 예금을 선호해\n응답:"));
    }

    #[test]
    fn test_compose_is_idempotent() {
        let composer = PromptComposer::default();
        let profile = user_1();
        let a = composer.compose("월복리 적금", "q", Some(&profile), ProductCategory::Both, compound());
        let b = composer.compose("월복리 적금", "q", Some(&profile), ProductCategory::Both, compound());

        assert_eq!(a, b);
        assert_eq!(a.render().as_bytes(), b.render().as_bytes());
    }

    #[test]
    fn test_guest_prompt_keeps_context_without_rules() {
        let composer = PromptComposer::default();
        let builder = composer.compose(
            "희망정기적금 금리 3.0%",
            "금리 알려줘",
            None,
            ProductCategory::Unspecified,
            CalcKinds::default(),
        );

        assert!(!builder.has(SectionKind::Profile));
        assert!(!builder.has(SectionKind::Rules));
        assert!(!builder.has(SectionKind::Examples));
        assert!(builder.section(SectionKind::Instructions).map_or(false, |s| s.body.contains("희망정기적금 금리 3.0%")));
        assert!(builder.section(SectionKind::Context).map_or(false, |s| s.body.contains("희망정기적금 금리 3.0%")));
    }

    #[test]
    fn test_rules_precedence_order() {
        let composer = PromptComposer::default();
        let builder = composer.compose("", "q", Some(&user_1()), ProductCategory::Deposit, CalcKinds::default());
        let rules = &builder.section(SectionKind::Rules).map(|s| s.body.clone()).unwrap_or_default();

        let protection = rules.find("예금자 보호법").unwrap_or(usize::MAX);
        let single = rules.find("one best fitting product").unwrap_or(usize::MAX);
        let prioritized = rules.find("[BankA, BankB]").unwrap_or(usize::MAX);
        let justification = rules.find("objective and persuasive").unwrap_or(usize::MAX);
        let missing = rules.find(MISSING_INFORMATION_NOTICE).unwrap_or(usize::MAX);

        assert!(protection < single);
        assert!(single < prioritized);
        assert!(prioritized < justification);
        assert!(justification < missing);
        assert!(missing < usize::MAX);
    }

    #[test]
    fn test_profile_json_reaches_prompt_verbatim() {
        let profile = UserProfile::from_holdings(
            "user_1",
            vec![Holding { institution: "BankA".into(), balance: 60_000_000 }],
        );
        let prompt = PromptComposer::default()
            .compose("ctx", "추천해줘 예금", Some(&profile), ProductCategory::Deposit, CalcKinds::default())
            .render();

        assert!(prompt.contains(r#"User's Banks and Balance is [{"Balance":60000000,"Bank Name":"BankA"}]"#));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_profile_braces_do_not_reach_slots() {
        let profile = UserProfile::from_holdings(
            "user_3",
            vec![Holding { institution: "{context}".into(), balance: 1 }],
        );
        let filled = fill_slots(PROFILE_TEMPLATE, &[("balances", &balances_json(&profile))]);
        assert!(filled.contains(r#""Bank Name":"{context}""#));
    }

    #[test]
    fn test_context_braces_do_not_corrupt_template() {
        let filled = fill_slots("A {format} B {context} C", &[("format", "F"), ("context", "{format} x")]);
        assert_eq!(filled, "A F B {format} x C");

        let untouched = fill_slots("keep {unknown} and {", &[("format", "F")]);
        assert_eq!(untouched, "keep {unknown} and {");
    }

    #[test]
    fn test_examples_only_with_calc_kinds() {
        let composer = PromptComposer::default();
        let prompt = composer
            .compose("단리 상품", "q", None, ProductCategory::Deposit, CalcKinds { simple: true, ..CalcKinds::default() })
            .render();

        assert!(prompt.contains(CALCULATION_DIRECTIVE));
        assert!(prompt.contains("1,100,000"));
        assert!(prompt.contains("6,897"));
    }

    #[test]
    fn test_compound_policy_automatic() {
        let composer = PromptComposer::new(CompoundPolicy::Automatic, false);
        let monthly_only = composer.compose("월복리 적금", "q", None, ProductCategory::InstallmentSavings, compound()).render();
        assert!(monthly_only.contains("Monthly Compound Interest"));
        assert!(!monthly_only.contains("Annual Compound Interest"));

        let ambiguous = composer.compose("복리 상품", "q", None, ProductCategory::Both, compound()).render();
        assert!(ambiguous.contains("Monthly Compound Interest"));
        assert!(ambiguous.contains("Annual Compound Interest"));
    }

    #[test]
    fn test_compound_policy_both() {
        let composer = PromptComposer::new(CompoundPolicy::Both, false);
        let prompt = composer.compose("연복리 예금", "q", None, ProductCategory::Deposit, compound()).render();
        assert!(prompt.contains("Monthly Compound Interest"));
        assert!(prompt.contains("5,000,000 × (1 + 0.035)^2"));
    }

    #[test]
    fn test_regrounding_is_appended_once() {
        let composer = PromptComposer::default();
        let mut builder = composer.compose("ctx", "q", None, ProductCategory::Deposit, CalcKinds::default());

        assert!(builder.push_regrounding());
        assert!(!builder.push_regrounding());
        assert_eq!(builder.render().matches(REGROUNDING_DIRECTIVE).count(), 1);
        assert_eq!(builder.sections().last().map(|s| s.kind), Some(SectionKind::Regrounding));
    }
}

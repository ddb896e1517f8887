//! Fixed prompt text: the base system template, output-format blocks,
//! advisory rules and the worked-example library.

use crate::interest::{
    annual_compound_maturity, flexible_interest, format_won, monthly_compound_maturity,
    simple_maturity,
};
use crate::models::PROTECTION_THRESHOLD;

/// Base system template. `{format}` and `{context}` are slots.
pub const QA_SYSTEM_TEMPLATE: &str = r#"You are a bank chatbot, where you answer questions about products & services.
You will also recommend the best products for the user.

You will only generate answers based on the following context.

Your answers should be in Korean.
You are kind and nice, and if you are not sure of the question, ask the user to rephrase the question.
Your answers should be refined into bullet points.

When a user asks about "예금" (deposit accounts), only refer to documents related to 예금.
When a user asks about "적금" (installment savings), only refer to documents related to 적금.
If the question is general or unclear, refer to both types of documents to provide the most relevant information.

If the user does not have a specific amount per month, apply the maximum amount available for the product.
If a user mentions a specific product name, you must only refer to the document containing information about that product.

{format}

---
Context: {context}
"#;

/// Labeled bullet format; the 은행명 / 상품명 labels are what the
/// whitelist validator reads back.
pub const BULLET_FORMAT_INSTRUCTIONS: &str = r#"When recommending a product, use the bullet-point format below:
    - 은행명 : (bank name)
    - 상품명: (product name)
    - 희망 가입 기간: (desired subscription period)
    - 가입 금액 : (amount per month)
    - 상품 기본 금리: (base interest rate)
    - 우대 금리: (bonus interest rate)
    - 기본 금리 만기 금액: (amount at maturity with base interest rate)
    - 우대 금리 만기 금액: (amount at maturity with maximum bonus interest rate)
    - 우대 조건 (1) : bonus interest rate requirements
    - 우대 조건 (2) : bonus interest rate requirements
    - 우대 조건 (3) : bonus interest rate requirements"#;

/// JSON format used when structured recommendations are enabled
pub const STRUCTURED_FORMAT_INSTRUCTIONS: &str = r#"When recommending a product, answer with a single JSON object inside a ```json fence with these keys:
    "bank_name" (string, 은행명), "product_name" (string, 상품명),
    "subscription_period" (integer months or null), "amount" (integer KRW or null),
    "base_interest_rate" (number % or null), "bonus_interest_rate" (number % or null),
    "amount_with_base_interest" (integer KRW or null), "amount_with_bonus_interest" (integer KRW or null),
    "requirements_1", "requirements_2", "requirements_3" (strings, bonus-rate conditions)"#;

pub const CALCULATION_DIRECTIVE: &str = "Please provide a step-by-step reasoning for calculating the interest based on the identified type (단리, 복리, 기간별 이자, 자유 적금). Apply the appropriate formula and provide the maturity amount.";

/// Profile facts block; `{balances}` is a slot
pub const PROFILE_TEMPLATE: &str = "\nUser's Banks and Balance is {balances}\n";

pub const REGROUNDING_DIRECTIVE: &str = "Please make sure your response is based on the provided context.";

pub const MISSING_INFORMATION_NOTICE: &str =
    "해당 정보가 제공된 문서에 포함되어 있지 않습니다. 추가 정보가 필요합니다.";

//
// ================= Advisory Rules =================
//

/// Rule (a): deposit-protection disclosure
pub fn protection_rule(over_limit: &[&str]) -> String {
    if over_limit.is_empty() {
        return format!(
            "- None of the user's banks hold {} KRW or more, so no deposit-protection disclosure is required.",
            format_won(PROTECTION_THRESHOLD as f64)
        );
    }

    let banks = over_limit.join(", ");
    format!(
        "- If the recommended product is from a bank where the user's balance is {} KRW or more, \
         that is any of [{}],\n  **Inform** the user with: '예금자 보호법에 따라 {} 은행 외의 상품을 추천드립니다.'\n  \
         Provide an alternative product from another bank, if applicable.",
        format_won(PROTECTION_THRESHOLD as f64),
        banks,
        banks
    )
}

/// Rule (b): one product, chosen objectively
pub const SINGLE_PRODUCT_RULE: &str = "- **Compare all available products objectively** and choose **one best fitting product** based on interest rates, bonuses, or other key features. Recommend only **one** product.";

/// Rule (c): prefer the user's own banks when competitive
pub fn prioritized_banks_rule(active: &[&str]) -> String {
    format!(
        "- If a product from one of the user's banks ([{}]) is a good fit, recommend it. \
         If not, explain why another bank's product is a better choice, but still recommend **one** product.",
        active.join(", ")
    )
}

/// Rule (d): objective justification
pub const JUSTIFICATION_RULE: &str = "- Provide an **objective and persuasive explanation** when suggesting a product, especially if it's not from the user's bank.";

/// Rule (e): never fabricate
pub fn missing_information_rule() -> String {
    format!(
        "- If any required information is missing from the context, say: '{}'",
        MISSING_INFORMATION_NOTICE
    )
}

//
// ================= Worked Examples =================
//

pub fn simple_interest_example() -> String {
    let maturity = simple_maturity(1_000_000.0, 0.05, 2.0);
    format!(
        r#"### Calculating Simple Interest (단리)
- Simple interest is calculated only on the principal amount, not on the accumulated interest.
- Formula: Maturity Amount = P × (1 + r × t), where P is the principal, r the annual interest rate, t the time in years.
- Example: a 2-year deposit of 1,000,000 KRW at an annual rate of 5%.
    - Interest = 1,000,000 × 0.05 × 2 = {} KRW.
    - Maturity amount = 1,000,000 × (1 + 0.05 × 2) = {} KRW."#,
        format_won(maturity - 1_000_000.0),
        format_won(maturity)
    )
}

pub fn monthly_compound_example() -> String {
    let maturity = monthly_compound_maturity(200_000.0, 0.0455, 24);
    format!(
        r#"### Calculating Monthly Compound Interest (월복리)
- Each monthly deposit accumulates interest, compounded monthly, for the months remaining until maturity.
- Formula: Maturity Amount = Σ_{{m=1}}^{{M}} Monthly Deposit × (1 + Monthly Rate)^(M − m), where M is the total number of months, m the month of each deposit, Monthly Rate = Annual Interest Rate / 12.
- Example: 200,000 KRW deposited every month for 24 months at an annual compound rate of 4.55%.
    - Monthly rate = 0.0455 / 12 ≈ 0.003792.
    - The deposit of month 1 compounds for 23 months: 200,000 × (1 + 0.003792)^23.
    - The deposit of month 2 compounds for 22 months: 200,000 × (1 + 0.003792)^22.
    - Continue until the last deposit, which compounds for 0 months.
    - Sum of all accumulated deposits ≈ {} KRW."#,
        format_won(maturity)
    )
}

pub fn annual_compound_example() -> String {
    let maturity = annual_compound_maturity(5_000_000.0, 0.035, 2);
    format!(
        r#"### Calculating Annual Compound Interest (연복리)
- Interest is compounded once a year on the principal and all interest accumulated so far.
- Formula: Maturity Amount = P × (1 + r)^t, where P is the principal, r the annual interest rate, t the number of years.
- Example: a 2-year deposit of 5,000,000 KRW at an annual compound rate of 3.5%.
    - Maturity amount = 5,000,000 × (1 + 0.035)^2 = 5,000,000 × 1.071225 = {} KRW."#,
        format_won(maturity)
    )
}

pub fn period_tiered_example() -> String {
    let maturity = simple_maturity(10_000_000.0, 0.032, 2.0);
    format!(
        r#"### Calculating Period-Tiered Rates (가입기간별 기본이자율)
- The base rate depends on the subscription period; pick the tier that matches the requested period, then apply the product's interest formula with that rate.
- Example: a rate table lists 3.0% for 12 months and 3.2% for 24 months; a 24-month simple-interest deposit of 10,000,000 KRW.
    - Applicable tier: 24 months → 3.2%.
    - Maturity amount = 10,000,000 × (1 + 0.032 × 2) = {} KRW."#,
        format_won(maturity)
    )
}

pub fn flexible_savings_example() -> String {
    let first = flexible_interest(200_000.0, 0.041, 307);
    let second = flexible_interest(500_000.0, 0.041, 235);
    format!(
        r#"### Calculating Flexible Savings Interest (자유 적금, 자유 적립)
- Interest accrues daily on each deposit from its deposit date until maturity.
- Formula: Maturity Amount = Deposit Amount × (1 + Annual Interest Rate / 365 × Number of Days), so Interest = Deposit Amount × Annual Interest Rate / 365 × Number of Days.
- Example:
    - First deposit: 200,000 KRW at 4.1%, 307 days to maturity → interest ≈ {} KRW.
    - Second deposit: 500,000 KRW at 4.1%, 235 days to maturity → interest ≈ {} KRW.
    - Total interest is the sum over all deposits."#,
        format_won(first),
        format_won(second)
    )
}

pub const TAX_NOTE: &str = r#"### Tax Considerations for Savings Products
- Standard taxation: a withholding tax of 15.4% is applied to interest income.
- Tax-preferred savings (세금우대): eligible individuals pay a reduced 9.5% rate, subject to enrolment limits and a minimum one-year term.
- Tax-free comprehensive savings (비과세종합저축): interest on up to 50,000,000 KRW is exempt for eligible individuals.
- Tax rules change; actual products may accrue interest daily, so figures can differ slightly from these examples."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_computations_appear_verbatim() {
        assert!(simple_interest_example().contains("= 1,100,000 KRW"));
        assert!(annual_compound_example().contains("5,000,000 × (1 + 0.035)^2"));
        assert!(annual_compound_example().contains("5,356,125"));
        assert!(flexible_savings_example().contains("≈ 6,897 KRW"));
    }

    #[test]
    fn test_protection_rule_names_banks() {
        let rule = protection_rule(&["BankA", "BankB"]);
        assert!(rule.contains("예금자 보호법에 따라 BankA, BankB 은행 외의 상품을 추천드립니다."));
        assert!(protection_rule(&[]).starts_with("- None of the user's banks"));
    }
}

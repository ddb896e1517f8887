//! Core data models for the deposit advisor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Balance at or above which deposit-protection disclosure applies (KRW).
pub const PROTECTION_THRESHOLD: i64 = 50_000_000;

//
// ================= Product Category =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    Unspecified,
    Deposit,
    InstallmentSavings,
    Both,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 4] = [
        ProductCategory::Unspecified,
        ProductCategory::Deposit,
        ProductCategory::InstallmentSavings,
        ProductCategory::Both,
    ];

    /// Korean label as shown to the user and used in the closing directive
    pub fn label(&self) -> &'static str {
        match self {
            ProductCategory::Unspecified => "적용안함",
            ProductCategory::Deposit => "예금",
            ProductCategory::InstallmentSavings => "적금",
            ProductCategory::Both => "예금 & 적금",
        }
    }

    /// Lenient parse of either the English key or the Korean label.
    /// Unknown values fall back to `Unspecified`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "deposit" | "예금" => ProductCategory::Deposit,
            "installment_savings" | "installment-savings" | "savings" | "적금" => {
                ProductCategory::InstallmentSavings
            }
            "both" | "예금 & 적금" | "예금&적금" => ProductCategory::Both,
            _ => ProductCategory::Unspecified,
        }
    }
}

/// Strict parse for command-line input: unknown values are rejected
impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "unspecified" | "none" | "적용안함" => Ok(ProductCategory::Unspecified),
            _ => match ProductCategory::parse(raw) {
                ProductCategory::Unspecified => Err(format!(
                    "unknown category '{}' (expected 예금, 적금, both or unspecified)",
                    raw.trim()
                )),
                category => Ok(category),
            },
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

//
// ================= User Profile =================
//

/// One ledger row: a balance held at an institution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Holding {
    pub institution: String,
    pub balance: i64,
}

/// Per-request snapshot of a user's holdings, aggregated by institution.
/// Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    balances: BTreeMap<String, i64>,
}

impl UserProfile {
    pub fn from_holdings<I>(user_id: impl Into<String>, holdings: I) -> Self
    where
        I: IntoIterator<Item = Holding>,
    {
        let mut balances = BTreeMap::new();
        for h in holdings {
            *balances.entry(h.institution).or_insert(0) += h.balance;
        }

        Self {
            user_id: user_id.into(),
            balances,
        }
    }

    /// Aggregated balances, ordered by institution name
    pub fn balances(&self) -> &BTreeMap<String, i64> {
        &self.balances
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Institutions whose aggregated balance reaches the protection threshold
    pub fn over_limit_institutions(&self) -> Vec<&str> {
        self.balances
            .iter()
            .filter(|(_, balance)| **balance >= PROTECTION_THRESHOLD)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every institution the ledger lists for this user
    pub fn active_institutions(&self) -> Vec<&str> {
        self.balances.keys().map(|s| s.as_str()).collect()
    }
}

//
// ================= Retrieval =================
//

/// Passages returned by one retrieval call, most relevant first.
/// Empty means "no evidence".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    passages: Vec<String>,
    text: String,
}

impl RetrievedContext {
    pub fn from_passages(passages: Vec<String>) -> Self {
        let text = passages.join("\n");
        Self { passages, text }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn passages(&self) -> &[String] {
        &self.passages
    }

    /// Passages joined with newlines
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

//
// ================= Intent =================
//

/// Interest-calculation signals found in the retrieved context.
/// Several may hold at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalcKinds {
    pub simple: bool,
    /// Covers both monthly and annual compounding; the prompt composer
    /// picks the variant.
    pub compound: bool,
    pub period_tiered: bool,
    pub flexible: bool,
}

impl CalcKinds {
    pub fn any(&self) -> bool {
        self.simple || self.compound || self.period_tiered || self.flexible
    }
}

impl fmt::Display for CalcKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = Vec::new();
        if self.simple {
            kinds.push("simple");
        }
        if self.compound {
            kinds.push("compound");
        }
        if self.period_tiered {
            kinds.push("period_tiered");
        }
        if self.flexible {
            kinds.push("flexible");
        }
        if kinds.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", kinds.join("+"))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFlags {
    pub is_account_status: bool,
    pub is_recommendation: bool,
    pub calc_kinds: CalcKinds,
}

//
// ================= Groundedness =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundednessVerdict {
    Grounded,
    NotGrounded,
    Other(String),
}

impl GroundednessVerdict {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "grounded" => GroundednessVerdict::Grounded,
            "notGrounded" => GroundednessVerdict::NotGrounded,
            other => GroundednessVerdict::Other(other.to_string()),
        }
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self, GroundednessVerdict::Grounded)
    }
}

//
// ================= Turn Outcome =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Deterministic holdings summary, no generation
    AccountStatus,
    /// Account-status query without a user id
    MissingIdentifier,
    /// General FAQ answer, returned without gating
    Answered,
    /// Recommendation/calculation answer that passed the gates
    Accepted,
    /// Retry budget exhausted
    Fallback,
    /// Structured recommendation output could not be parsed
    ProcessingError,
    /// Provider unavailable on the single-shot FAQ path
    Unavailable,
}

/// What the controller hands back for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub response: String,
    pub kind: OutcomeKind,
    pub intent: IntentFlags,
    /// Generation invocations made for this turn
    pub attempts: u32,
    /// Last prompt sent to the generator, if any
    #[serde(skip)]
    pub prompt: Option<String>,
}

impl TurnOutcome {
    pub fn deterministic(response: String, kind: OutcomeKind, intent: IntentFlags) -> Self {
        Self {
            response,
            kind,
            intent,
            attempts: 0,
            prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_aggregates_by_institution() {
        let profile = UserProfile::from_holdings(
            "user_1",
            vec![
                Holding { institution: "BankA".into(), balance: 30_000_000 },
                Holding { institution: "BankB".into(), balance: 1_000 },
                Holding { institution: "BankA".into(), balance: 20_000_000 },
            ],
        );

        assert_eq!(profile.balances()["BankA"], 50_000_000);
        assert_eq!(profile.over_limit_institutions(), vec!["BankA"]);
        assert_eq!(profile.active_institutions(), vec!["BankA", "BankB"]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let below = UserProfile::from_holdings(
            "u",
            vec![Holding { institution: "BankA".into(), balance: 49_999_999 }],
        );
        assert!(below.over_limit_institutions().is_empty());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(ProductCategory::parse("예금"), ProductCategory::Deposit);
        assert_eq!(ProductCategory::parse("적금"), ProductCategory::InstallmentSavings);
        assert_eq!(ProductCategory::parse("예금 & 적금"), ProductCategory::Both);
        assert_eq!(ProductCategory::parse("whatever"), ProductCategory::Unspecified);
    }

    #[test]
    fn test_category_from_str_rejects_unknown() {
        assert_eq!("적금".parse::<ProductCategory>(), Ok(ProductCategory::InstallmentSavings));
        assert_eq!("both".parse::<ProductCategory>(), Ok(ProductCategory::Both));
        assert_eq!("적용안함".parse::<ProductCategory>(), Ok(ProductCategory::Unspecified));
        assert!("whatever".parse::<ProductCategory>().is_err());
        assert!("".parse::<ProductCategory>().is_err());
    }

    #[test]
    fn test_verdict_parse() {
        assert!(GroundednessVerdict::parse("grounded").is_grounded());
        assert_eq!(GroundednessVerdict::parse("notGrounded"), GroundednessVerdict::NotGrounded);
        assert_eq!(
            GroundednessVerdict::parse("notSure"),
            GroundednessVerdict::Other("notSure".to_string())
        );
    }

    #[test]
    fn test_context_joins_passages() {
        let ctx = RetrievedContext::from_passages(vec!["a".into(), "b".into()]);
        assert_eq!(ctx.text(), "a\nb");
        assert!(RetrievedContext::empty().is_empty());
    }
}

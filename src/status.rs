//! Account-Status Formatter
//!
//! Deterministic holdings summary. Never calls a provider.

use crate::interest::format_won;
use crate::models::{UserProfile, PROTECTION_THRESHOLD};

/// Holdings, over-threshold institutions and institutions in use
pub fn format_status(profile: &UserProfile) -> String {
    let balances = profile
        .balances()
        .iter()
        .map(|(institution, balance)| format!("{} : {}원", institution, format_won(*balance as f64)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "다음은 사용자의 계좌 상태입니다:\n\n\
         **은행 및 잔액:**\n{}\n\n\
         - 잔액이 {}원 이상인 은행: {}\n\
         - 현재 이용 중인 은행: {}\n\n\
         **주의:** 예금자 보호 한도를 초과한 은행에 주의하세요.",
        if balances.is_empty() { "보유 중인 계좌가 없습니다.".to_string() } else { balances },
        format_won(PROTECTION_THRESHOLD as f64),
        name_list(&profile.over_limit_institutions()),
        name_list(&profile.active_institutions()),
    )
}

fn name_list(names: &[&str]) -> String {
    if names.is_empty() {
        "없음".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Holding;

    #[test]
    fn test_status_lists_balances_and_threshold() {
        let profile = UserProfile::from_holdings(
            "user_1",
            vec![
                Holding { institution: "BankA".into(), balance: 60_000_000 },
                Holding { institution: "BankB".into(), balance: 1_200_000 },
            ],
        );

        let status = format_status(&profile);
        assert!(status.contains("BankA : 60,000,000원"));
        assert!(status.contains("BankB : 1,200,000원"));
        assert!(status.contains("잔액이 50,000,000원 이상인 은행: BankA\n"));
        assert!(status.contains("현재 이용 중인 은행: BankA, BankB"));
    }

    #[test]
    fn test_status_is_pure() {
        let profile = UserProfile::from_holdings(
            "user_2",
            vec![Holding { institution: "하나은행".into(), balance: 10 }],
        );
        assert_eq!(format_status(&profile), format_status(&profile));
        assert!(format_status(&profile).contains("이상인 은행: 없음"));
    }

    #[test]
    fn test_empty_profile() {
        let status = format_status(&UserProfile::from_holdings("nobody", Vec::<Holding>::new()));
        assert!(status.contains("보유 중인 계좌가 없습니다."));
    }
}

//! Deterministic interest calculators
//!
//! Rates are annual and fractional (5% = 0.05). Results are in KRW, unrounded;
//! use [`format_won`] for display.

/// P × (1 + r × t)
pub fn simple_maturity(principal: f64, annual_rate: f64, years: f64) -> f64 {
    principal * (1.0 + annual_rate * years)
}

/// P × (1 + r)^t
pub fn annual_compound_maturity(principal: f64, annual_rate: f64, years: i32) -> f64 {
    principal * (1.0 + annual_rate).powi(years)
}

/// Σ_{m=1}^{M} deposit × (1 + r/12)^(M − m)
pub fn monthly_compound_maturity(monthly_deposit: f64, annual_rate: f64, months: u32) -> f64 {
    let monthly_rate = annual_rate / 12.0;
    (1..=months)
        .map(|m| monthly_deposit * (1.0 + monthly_rate).powi((months - m) as i32))
        .sum()
}

/// amount × r / 365 × days
pub fn flexible_interest(amount: f64, annual_rate: f64, days: u32) -> f64 {
    amount * annual_rate / 365.0 * f64::from(days)
}

/// Round to the nearest won and group thousands: 1100000.0 → "1,100,000"
pub fn format_won(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_interest_seed() {
        let maturity = simple_maturity(1_000_000.0, 0.05, 2.0);
        assert!((maturity - 1_100_000.0).abs() < 1e-6);
        assert_eq!(format_won(maturity), "1,100,000");
    }

    #[test]
    fn test_annual_compound_seed() {
        let maturity = annual_compound_maturity(5_000_000.0, 0.035, 2);
        assert!((maturity - 5_000_000.0 * 1.035 * 1.035).abs() < 1e-6);
        assert_eq!(format_won(maturity), "5,356,125");
    }

    #[test]
    fn test_flexible_seed() {
        let interest = flexible_interest(200_000.0, 0.041, 307);
        assert_eq!(format_won(interest), "6,897");
    }

    #[test]
    fn test_monthly_compound_last_deposit_earns_nothing() {
        let one_month = monthly_compound_maturity(200_000.0, 0.0455, 1);
        assert!((one_month - 200_000.0).abs() < 1e-9);

        let two_years = monthly_compound_maturity(200_000.0, 0.0455, 24);
        assert!(two_years > 24.0 * 200_000.0);
    }

    #[test]
    fn test_format_won() {
        assert_eq!(format_won(0.0), "0");
        assert_eq!(format_won(999.4), "999");
        assert_eq!(format_won(1000.0), "1,000");
        assert_eq!(format_won(-60_000_000.0), "-60,000,000");
    }
}

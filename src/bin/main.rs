//! One-shot advisor turn from the command line

use clap::Parser;
use deposit_advisor::{
    config::AdvisorConfig,
    models::ProductCategory,
    session::{Advisor, Session},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "advisor")]
#[command(about = "Ask the deposit advisor a single question", long_about = None)]
struct Cli {
    /// Ledger user id; omit for guest mode
    #[arg(long)]
    user: Option<String>,

    /// Product category: 예금, 적금, both or unspecified
    #[arg(long, default_value = "unspecified")]
    category: ProductCategory,

    /// Question text
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    question: Vec<String>,
}

impl Cli {
    fn question(&self) -> String {
        self.question.join(" ")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let question = cli.question();
    let config = AdvisorConfig::from_env()?;
    let advisor = Advisor::from_config(&config)?;
    let mut session = Session::new(cli.user, cli.category);

    info!(session_id = %session.session_id, category = %cli.category, "Running advisor turn");

    let report = advisor.handle_turn(&mut session, &question).await;

    for notice in &report.notices {
        eprintln!("[notice] {}", notice.message());
    }

    println!("\n=== ADVISOR RESPONSE ===");
    println!("{}", report.outcome.response);
    println!("\nOutcome: {:?}", report.outcome.kind);
    println!("Attempts: {}", report.outcome.attempts);
    println!("Audit ID: {}", report.audit_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_and_question() {
        let cli = Cli::try_parse_from(["advisor", "--user", "user_1", "--category", "적금", "추천해", "줘"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("user_1"));
        assert_eq!(cli.category, ProductCategory::InstallmentSavings);
        assert_eq!(cli.question(), "추천해 줘");
    }

    #[test]
    fn test_defaults_to_guest_and_unspecified() {
        let cli = Cli::try_parse_from(["advisor", "예금자보호법", "알려줘"]).unwrap();
        assert!(cli.user.is_none());
        assert_eq!(cli.category, ProductCategory::Unspecified);
    }

    #[test]
    fn test_flag_without_value_is_rejected() {
        assert!(Cli::try_parse_from(["advisor", "--user"]).is_err());
        assert!(Cli::try_parse_from(["advisor", "--category", "연금", "질문"]).is_err());
    }

    #[test]
    fn test_missing_question_is_rejected() {
        assert!(Cli::try_parse_from(["advisor", "--user", "user_1"]).is_err());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["advisor", "--verbose", "질문"]).is_err());
    }
}
